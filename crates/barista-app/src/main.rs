//! Barista server binary - composition root.
//!
//! 1. Resolve configuration (file, environment, flags)
//! 2. Open SQLite and load product/outlet seed files
//! 3. Index the catalog and wire the chat executor
//! 4. Start the session sweeper and the axum API server

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use barista_api::{start_server, AppState};
use barista_chat::spawn_sweeper;
use barista_core::config::BaristaConfig;
use barista_core::error::BaristaError;
use barista_storage::{Database, OutletRepository, ProductRepository};

use cli::CliArgs;

fn resolve_config(args: &CliArgs) -> Result<BaristaConfig, BaristaError> {
    let mut config = match args.explicit_config_path() {
        Some(path) if !path.exists() => {
            return Err(BaristaError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }
        Some(path) => BaristaConfig::load(&path)?,
        None => {
            let path = args.resolve_config_path();
            if path.exists() {
                BaristaConfig::load(&path)?
            } else {
                BaristaConfig::default()
            }
        }
    };
    config.apply_env_overrides()?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn seed_database(db: &Arc<Database>, config: &BaristaConfig) -> Result<(), BaristaError> {
    if let Some(ref path) = config.storage.products_seed {
        ProductRepository::new(Arc::clone(db)).load_seed(Path::new(path))?;
    }
    if let Some(ref path) = config.storage.outlets_seed {
        OutletRepository::new(Arc::clone(db)).load_seed(Path::new(path))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config = resolve_config(&args)?;

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Barista v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %args.resolve_config_path().display(), "Configuration resolved");

    let db = Arc::new(Database::open(&config.storage.database_path)?);
    tracing::info!(path = %config.storage.database_path, "SQLite database opened");
    seed_database(&db, &config)?;

    let sweep_interval = Duration::from_secs(config.session.sweep_interval_secs);
    let state = AppState::initialize(config, db).await?;

    let _sweeper = spawn_sweeper(Arc::clone(state.sessions()), sweep_interval);
    tracing::info!(interval_secs = sweep_interval.as_secs(), "Session sweeper started");

    start_server(state).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_file(name: &str) -> String {
        format!("{}/../../data/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn test_bundled_seed_files_load() {
        let db = Arc::new(Database::in_memory().unwrap());
        let mut config = BaristaConfig::default();
        config.storage.products_seed = Some(repo_file("products.json"));
        config.storage.outlets_seed = Some(repo_file("outlets.json"));

        seed_database(&db, &config).unwrap();
        assert!(ProductRepository::new(Arc::clone(&db)).count().unwrap() > 0);
        assert!(OutletRepository::new(Arc::clone(&db)).count().unwrap() > 0);

        // Reseeding leaves both tables as they were.
        let before = OutletRepository::new(Arc::clone(&db)).count().unwrap();
        seed_database(&db, &config).unwrap();
        assert_eq!(OutletRepository::new(db).count().unwrap(), before);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let args = CliArgs::parse_from(["barista", "-c", "/nonexistent/barista.toml"]);
        let err = resolve_config(&args).unwrap_err();
        assert!(matches!(err, BaristaError::Config(_)));
        assert!(err.to_string().contains("/nonexistent/barista.toml"));
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("barista.toml");
        let mut written = BaristaConfig::default();
        written.server.port = 9321;
        written.save(&path).unwrap();

        let args = CliArgs::parse_from(["barista", "-c", path.to_str().unwrap()]);
        assert_eq!(resolve_config(&args).unwrap().server.port, 9321);
    }

    #[test]
    fn test_missing_seed_file_is_an_error() {
        let db = Arc::new(Database::in_memory().unwrap());
        let mut config = BaristaConfig::default();
        config.storage.products_seed = Some("/nonexistent/products.json".to_string());
        assert!(seed_database(&db, &config).is_err());
    }
}
