//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) and/or CLI flags
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared with the server and transport at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; SIGHUP reloads credential *contents*
//!   from the configured paths, never the configuration itself
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, ProxyConfig, SshConfig, TimeoutConfig};
