//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → ApiClient::new builds endpoint, transport and credentials from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a client is built once per command
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ClientConfig;
pub use schema::HttpSettingsConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::RetryConfig;
