//! # estate-core
//!
//! Shared foundation for the estate migration tooling: environment driven
//! configuration and structured logging setup.

pub mod config;
pub mod logging;

pub use config::{AppConfigTrait, ConfigError, ConfigSource, Environment, MigrateConfig};
pub use logging::{init_logging, LogFormat, LoggingConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
