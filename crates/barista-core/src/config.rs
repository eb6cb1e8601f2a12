use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BaristaError, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BARISTA_CONFIG";
/// Environment variable overriding `server.host`.
pub const HOST_ENV: &str = "BARISTA_HOST";
/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "BARISTA_PORT";
/// Environment variable overriding `general.log_level`.
pub const LOG_ENV: &str = "BARISTA_LOG";

/// Top-level configuration for the Barista backend.
///
/// Loaded from `barista.toml` (or the file named by `BARISTA_CONFIG`).
/// Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaristaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reasoner: ReasonerConfig,
}

impl BaristaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BaristaConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply `BARISTA_HOST`, `BARISTA_PORT` and `BARISTA_LOG` from the process
    /// environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .parse()
                .map_err(|_| BaristaError::Config(format!("{} is not a valid port: {}", PORT_ENV, port)))?;
        }
        if let Some(level) = lookup(LOG_ENV) {
            self.general.log_level = level;
        }
        Ok(())
    }

    /// Reject configurations that would disable core invariants.
    pub fn validate(&self) -> Result<()> {
        if self.server.turn_timeout_secs == 0 {
            return Err(BaristaError::Config(
                "server.turn_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.session.expiry_minutes == 0 {
            return Err(BaristaError::Config(
                "session.expiry_minutes must be greater than zero".to_string(),
            ));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(BaristaError::Config(
                "session.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.agent.max_calls_per_tool == 0 {
            return Err(BaristaError::Config(
                "agent.max_calls_per_tool must be greater than zero".to_string(),
            ));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(BaristaError::Config(
                "agent.max_tool_rounds must be greater than zero".to_string(),
            ));
        }
        if self.search.embedding_dim == 0 {
            return Err(BaristaError::Config(
                "search.embedding_dim must be greater than zero".to_string(),
            ));
        }
        if self.search.default_top_k == 0 || self.search.default_top_k > self.search.max_top_k {
            return Err(BaristaError::Config(format!(
                "search.default_top_k must be between 1 and max_top_k ({})",
                self.search.max_top_k
            )));
        }
        if !["keyword", "openai"].contains(&self.reasoner.backend.as_str()) {
            return Err(BaristaError::Config(format!(
                "Unknown reasoner backend '{}'. Must be one of: keyword, openai",
                self.reasoner.backend
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Maximum requests accepted per second across the chat routes.
    pub rate_limit_per_sec: u64,
    /// Upper bound on a single turn, including every tool and model call.
    pub turn_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            rate_limit_per_sec: 50,
            turn_timeout_secs: 60,
        }
    }
}

/// Session lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is eligible for removal.
    pub expiry_minutes: u32,
    /// Cadence of the background sweep.
    pub sweep_interval_secs: u64,
    /// Also sweep before resolving a session on each chat request.
    pub sweep_on_request: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_minutes: 30,
            sweep_interval_secs: 60,
            sweep_on_request: true,
        }
    }
}

/// Agent loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum invocations of one tool within a single turn.
    pub max_calls_per_tool: usize,
    /// Maximum decide/execute rounds before the reply is synthesized.
    pub max_tool_rounds: usize,
    /// Maximum accepted message length in characters.
    pub max_message_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_calls_per_tool: 3,
            max_tool_rounds: 3,
            max_message_chars: 2000,
        }
    }
}

/// Product similarity search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Embedding dimension.
    pub embedding_dim: usize,
    /// Results returned when the caller gives no `top_k`.
    pub default_top_k: usize,
    /// Hard cap on `top_k`.
    pub max_top_k: usize,
    /// Hits scoring below this cosine similarity are dropped.
    pub min_similarity: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 512,
            default_top_k: 5,
            max_top_k: 20,
            min_similarity: 0.0,
        }
    }
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path, or `:memory:`.
    pub database_path: String,
    /// Optional JSON file of products loaded at startup.
    pub products_seed: Option<String>,
    /// Optional JSON file of outlets loaded at startup.
    pub outlets_seed: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            products_seed: None,
            outlets_seed: None,
        }
    }
}

/// Reasoning collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// "keyword" (offline rules) or "openai" (chat-completions API).
    pub backend: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            backend: "keyword".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}
