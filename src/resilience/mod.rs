//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Prepared request:
//!     → retries.rs (replay through the transport until a terminal outcome)
//!     → backoff.rs (exponential wait with jitter between attempts)
//!     → Call context checked before each attempt and during each wait
//! ```
//!
//! # Design Decisions
//! - Per-attempt read timeouts live in the transport, not here
//! - Retry exhaustion is reported separately from a terminal failure

pub mod backoff;
pub mod retries;

pub use retries::{DispatchError, Retry, RetryPolicy};
