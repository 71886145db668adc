use estate_core::ConfigError;
use estate_docstore::StoreError;
use estate_migrate::MigrationError;
use thiserror::Error;

/// Anything that makes a command exit with status 1
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Failed to open database: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}
