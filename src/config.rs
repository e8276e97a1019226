use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub federated: FederatedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP API
    pub host: String,
    /// Bind port for the HTTP API
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Federated training parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FederatedConfig {
    /// Minimum distinct client updates required before a round aggregates
    pub min_clients: usize,
    /// Total number of training rounds before the coordinator completes
    pub total_rounds: u64,
    /// Weight client contributions by dataset size (FedAvg) vs uniform mean
    pub weighted: bool,
    /// Contribution weight used when a client never declared a dataset size
    pub default_client_size: u64,
    /// Mean-absolute-difference threshold for the convergence check
    pub convergence_threshold: f64,
    /// Window for counting a client as active (reporting only)
    pub staleness_window_secs: u64,
    /// Per-layer shapes used to seed the initial global model,
    /// e.g. [[784, 64], [64], [64, 10], [10]]
    pub model_shape: Vec<Vec<usize>>,
}

impl Default for FederatedConfig {
    fn default() -> Self {
        Self {
            min_clients: 2,
            total_rounds: 10,
            weighted: true,
            default_client_size: 1,
            convergence_threshold: 1e-5,
            staleness_window_secs: 300,
            model_shape: vec![vec![32, 16], vec![16], vec![16, 1], vec![1]],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            federated: FederatedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file plus `FEDCOORD_` env overrides.
    ///
    /// Env keys use `__` as the section separator, e.g.
    /// `FEDCOORD_FEDERATED__MIN_CLIENTS=3`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        } else if Path::new("config/fedcoord.toml").exists() {
            builder = builder.add_source(File::with_name("config/fedcoord"));
        }

        builder = builder.add_source(
            Environment::with_prefix("FEDCOORD")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
