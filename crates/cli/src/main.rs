mod commands;
mod error;
mod versions;

use clap::{Parser, Subcommand};
use estate_core::config::load_dotenv;
use estate_core::{init_logging, AppConfigTrait, MigrateConfig};
use estate_docstore::MemoryStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use commands::migrate;
use error::CliError;

#[derive(Parser)]
#[command(name = "estate-migrate")]
#[command(about = "Versioned data migrations for the estate document store")]
#[command(version = estate_core::VERSION)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Directory holding the NNN_name.rs migration files (overrides MIGRATIONS_DIR)
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Control collection for version bookkeeping (overrides MIGRATION_COLLECTION)
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Commands {
    /// Run all pending migrations
    Migrate,

    /// Roll back to a specific version (defaults to previous version)
    Rollback {
        /// Target version
        #[arg(allow_negative_numbers = true)]
        version: Option<i64>,
    },

    /// Show current migration status
    Status,

    /// Create a new migration file
    Create {
        /// Migration name, e.g. "add user roles"
        name: Vec<String>,
    },

    /// Show this help message
    Help,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let command = cli.command.clone().unwrap_or(Commands::Help);
    if command == Commands::Help {
        migrate::help();
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_logging(&config.logging).map_err(|e| CliError::Logging(e.to_string()))?;
    tracing::debug!(
        environment = %config.environment,
        database_url = %config.database_url,
        collection = %config.collection,
        "Loaded configuration"
    );

    match command {
        Commands::Migrate => {
            let migrator = migrate::connect(&config).await?;
            migrate::run(&migrator).await?;
        }
        Commands::Rollback { version } => {
            let migrator = migrate::connect(&config).await?;
            migrate::rollback(&migrator, version).await?;
        }
        Commands::Status => {
            let migrator = migrate::connect(&config).await?;
            migrate::status(&migrator).await?;
        }
        Commands::Create { name } => {
            // Only the filesystem is touched; no database connection needed.
            let migrator = migrate::migrator(Arc::new(MemoryStore::new()), &config)?;
            let name = name.join(" ");
            migrate::create(&migrator, Some(name.as_str()).filter(|n| !n.trim().is_empty()))?;
        }
        Commands::Help => migrate::help(),
    }

    Ok(())
}

/// `.env`, then the environment, then command line flags
fn load_config(cli: &Cli) -> Result<MigrateConfig, CliError> {
    load_dotenv()?;

    let mut config = MigrateConfig::from_env()?;
    if let Some(url) = &cli.database_url {
        config = config.with_database_url(url);
    }
    if let Some(dir) = &cli.migrations_dir {
        config = config.with_migrations_dir(dir);
    }
    if let Some(collection) = &cli.collection {
        config = config.with_collection(collection);
    }
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_no_command_defaults_to_help() {
        assert_eq!(parse(&["estate-migrate"]).command, None);
        assert_eq!(parse(&["estate-migrate", "help"]).command, Some(Commands::Help));
    }

    #[test]
    fn test_rollback_accepts_optional_and_negative_versions() {
        assert_eq!(
            parse(&["estate-migrate", "rollback"]).command,
            Some(Commands::Rollback { version: None })
        );
        assert_eq!(
            parse(&["estate-migrate", "rollback", "5"]).command,
            Some(Commands::Rollback { version: Some(5) })
        );
        assert_eq!(
            parse(&["estate-migrate", "rollback", "-1"]).command,
            Some(Commands::Rollback { version: Some(-1) })
        );
    }

    #[test]
    fn test_create_collects_words() {
        assert_eq!(
            parse(&["estate-migrate", "create", "add user roles"]).command,
            Some(Commands::Create {
                name: vec!["add user roles".to_string()]
            })
        );
        assert_eq!(
            parse(&["estate-migrate", "create", "add", "user", "roles"]).command,
            Some(Commands::Create {
                name: vec!["add".into(), "user".into(), "roles".into()]
            })
        );
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["estate-migrate", "seed"]).is_err());
    }

    #[test]
    #[serial]
    fn test_flags_override_environment() {
        std::env::set_var("DATABASE_URL", "sqlite://from-env.db");
        std::env::set_var("MIGRATION_COLLECTION", "env_versions");

        let cli = parse(&[
            "estate-migrate",
            "status",
            "--database-url",
            "sqlite::memory:",
        ]);
        let config = load_config(&cli).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.collection, "env_versions");

        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("MIGRATION_COLLECTION");
    }

    #[tokio::test]
    #[serial]
    async fn test_create_writes_into_migrations_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dir = temp_dir.path().to_str().unwrap();
        let cli = parse(&[
            "estate-migrate",
            "create",
            "add",
            "guide",
            "regions",
            "--migrations-dir",
            dir,
        ]);

        run(cli).await.unwrap();

        assert!(temp_dir.path().join("002_add_guide_regions.rs").exists());
    }
}
