//! CLI argument definitions for the Barista server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use barista_core::config::{BaristaConfig, CONFIG_ENV};

/// Barista - conversational assistant backend for a coffee chain.
#[derive(Parser, Debug)]
#[command(name = "barista", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long = "print-config")]
    pub print_config: bool,
}

impl CliArgs {
    /// Priority: --config flag > BARISTA_CONFIG env var > ./barista.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.explicit_config_path()
            .unwrap_or_else(|| PathBuf::from("barista.toml"))
    }

    /// The path named by --config or BARISTA_CONFIG, if either is set.
    /// Such a path must exist.
    pub fn explicit_config_path(&self) -> Option<PathBuf> {
        if let Some(ref p) = self.config {
            return Some(p.clone());
        }
        std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
    }

    /// Apply flags on top of file and environment settings.
    pub fn apply(&self, config: &mut BaristaConfig) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}
