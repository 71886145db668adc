use crate::config::{ConfigError, ConfigSource};
use crate::logging::{LogFormat, LoggingConfig};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_VAR: &str = "ESTATE_ENV";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MIGRATIONS_DIR_VAR: &str = "MIGRATIONS_DIR";
pub const MIGRATION_COLLECTION_VAR: &str = "MIGRATION_COLLECTION";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";
pub const LOG_LOCATION_VAR: &str = "LOG_LOCATION";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://estate.db?mode=rwc";
pub const DEFAULT_MIGRATIONS_DIR: &str = "crates/cli/src/versions";
pub const DEFAULT_MIGRATION_COLLECTION: &str = "migration_versions";

/// Configuration trait for application configuration
pub trait AppConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, testing, or production",
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

/// Migration runner configuration.
///
/// Values come from the process environment, optionally seeded from a `.env`
/// file via [`load_dotenv`], and can be overridden by command line flags
/// through the `with_*` methods.
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub environment: Environment,
    pub database_url: String,
    pub migrations_dir: PathBuf,
    pub collection: String,
    pub logging: LoggingConfig,
    sources: HashMap<String, ConfigSource>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        let mut sources = HashMap::new();
        sources.insert(
            "environment".to_string(),
            ConfigSource::Default(Environment::default().to_string()),
        );
        sources.insert(
            "database_url".to_string(),
            ConfigSource::Default(DEFAULT_DATABASE_URL.to_string()),
        );
        sources.insert(
            "migrations_dir".to_string(),
            ConfigSource::Default(DEFAULT_MIGRATIONS_DIR.to_string()),
        );
        sources.insert(
            "collection".to_string(),
            ConfigSource::Default(DEFAULT_MIGRATION_COLLECTION.to_string()),
        );
        sources.insert("logging".to_string(), ConfigSource::Nested);

        Self {
            environment: Environment::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            collection: DEFAULT_MIGRATION_COLLECTION.to_string(),
            logging: LoggingConfig::default(),
            sources,
        }
    }
}

impl MigrateConfig {
    /// Override the database URL (e.g. from `--database-url`)
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self.sources.insert(
            "database_url".to_string(),
            ConfigSource::CommandLine("--database-url".to_string()),
        );
        self
    }

    /// Override the migration versions directory
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self.sources.insert(
            "migrations_dir".to_string(),
            ConfigSource::CommandLine("--migrations-dir".to_string()),
        );
        self
    }

    /// Override the control collection name
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self.sources.insert(
            "collection".to_string(),
            ConfigSource::CommandLine("--collection".to_string()),
        );
        self
    }

    /// Override the log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }
}

impl AppConfigTrait for MigrateConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut sources = HashMap::new();

        let environment = read_env(ENV_VAR, "environment", "development", &mut sources);
        let environment = Environment::from_str(&environment)?;

        let database_url = read_env(
            DATABASE_URL_VAR,
            "database_url",
            DEFAULT_DATABASE_URL,
            &mut sources,
        );
        let migrations_dir = read_env(
            MIGRATIONS_DIR_VAR,
            "migrations_dir",
            DEFAULT_MIGRATIONS_DIR,
            &mut sources,
        );
        let collection = read_env(
            MIGRATION_COLLECTION_VAR,
            "collection",
            DEFAULT_MIGRATION_COLLECTION,
            &mut sources,
        );

        let logging = LoggingConfig::from_env()?;
        sources.insert("logging".to_string(), ConfigSource::Nested);

        Ok(MigrateConfig {
            environment,
            database_url,
            migrations_dir: PathBuf::from(migrations_dir),
            collection,
            logging,
            sources,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::validation_failed(
                "database_url",
                "Database URL cannot be empty",
            ));
        }

        if self.migrations_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation_failed(
                "migrations_dir",
                "Migrations directory cannot be empty",
            ));
        }

        if self.collection.trim().is_empty() {
            return Err(ConfigError::validation_failed(
                "collection",
                "Control collection name cannot be empty",
            ));
        }

        if self.collection.contains('/') {
            return Err(ConfigError::invalid_value(
                "collection",
                &self.collection,
                "a collection name without '/'",
            ));
        }

        self.logging.validate()?;

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        self.sources.clone()
    }
}

impl AppConfigTrait for LoggingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let level = get_env_or_default(LOG_LEVEL_VAR, "info");
        let format = get_env_or_default(LOG_FORMAT_VAR, "compact");
        let format = LogFormat::from_str(&format)?;
        let include_location = get_env_or_default(LOG_LOCATION_VAR, "false");
        let include_location = parse_flag("include_location", &include_location)?;

        Ok(LoggingConfig {
            level,
            format,
            include_location,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "level",
                &self.level,
                "trace, debug, info, warn, or error",
            ));
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert(
            "level".to_string(),
            ConfigSource::EnvVar(LOG_LEVEL_VAR.to_string()),
        );
        sources.insert(
            "format".to_string(),
            ConfigSource::EnvVar(LOG_FORMAT_VAR.to_string()),
        );
        sources.insert(
            "include_location".to_string(),
            ConfigSource::EnvVar(LOG_LOCATION_VAR.to_string()),
        );
        sources
    }
}

/// Seed the process environment from a `.env` file in the working directory.
///
/// A missing file is not an error; a malformed one is.
pub fn load_dotenv() -> Result<Option<PathBuf>, ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(ConfigError::EnvironmentFile {
            message: err.to_string(),
        }),
    }
}

// Helper functions for environment variable handling
fn read_env(
    key: &str,
    field: &str,
    default: &str,
    sources: &mut HashMap<String, ConfigSource>,
) -> String {
    match env::var(key) {
        Ok(value) => {
            sources.insert(field.to_string(), ConfigSource::EnvVar(key.to_string()));
            value
        }
        Err(_) => {
            sources.insert(field.to_string(), ConfigSource::Default(default.to_string()));
            default.to_string()
        }
    }
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, value, "true or false")),
    }
}
