//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! client, retries, config loading:
//!     → tracing events (debug-level attempt and retry detail)
//!     → metrics.rs (call counters, latency histogram, retry counter)
//!
//! Consumers:
//!     → logging.rs subscriber, installed by the binary
//!     → Any `metrics` recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - The client never logs failures on the caller's behalf; errors are returned
//! - No exporter is bundled with the library

pub mod logging;
pub mod metrics;
