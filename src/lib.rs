pub mod aggregator;
pub mod api;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod registry;
pub mod status;
pub mod weights;

pub use aggregator::{check_convergence, compute_metrics, federated_average, ClientContribution};
pub use client::FederatedHttpClient;
pub use config::{AppConfig, FederatedConfig, LoggingConfig, ServerConfig};
pub use coordinator::{
    GlobalModel, RoundCoordinator, RoundPhase, RoundSummary, ServerConfigInfo, TrainingStatus,
};
pub use error::{FedError, Result};
pub use registry::{ClientInfo, ClientRecord, ClientRegistry};
pub use status::{HealthResponse, StatusReporter};
pub use weights::{Tensor, WeightSet};
