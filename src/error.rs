use thiserror::Error;

/// Main error type for the federated coordination server
#[derive(Error, Debug)]
pub enum FedError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Network errors (HTTP client)
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Validation errors — rejected at the boundary, no state mutated
    #[error("Client not registered: {0}")]
    UnregisteredClient(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    // Aggregation errors — recovered by the coordinator, never fatal
    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    // Training lifecycle errors
    #[error("Training complete: round bound reached ({current_round}/{total_rounds})")]
    TrainingComplete {
        current_round: u64,
        total_rounds: u64,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, FedError>;

impl FedError {
    /// True for errors caused by the caller's request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FedError::UnregisteredClient(_)
                | FedError::InvalidUpdate(_)
                | FedError::TrainingComplete { .. }
        )
    }
}
