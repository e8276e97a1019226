//! Read-only status projection for external polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::coordinator::{RoundCoordinator, TrainingStatus};

/// Health probe response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_clients: usize,
    pub current_round: u64,
}

/// Thin composition over the coordinator's snapshots. No state of its
/// own, no locking beyond what the underlying reads take.
#[derive(Clone)]
pub struct StatusReporter {
    coordinator: Arc<RoundCoordinator>,
}

impl StatusReporter {
    pub fn new(coordinator: Arc<RoundCoordinator>) -> Self {
        Self { coordinator }
    }

    pub async fn training_status(&self) -> TrainingStatus {
        self.coordinator.training_status().await
    }

    pub async fn health(&self) -> HealthResponse {
        let status = self.coordinator.training_status().await;
        HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            active_clients: status.active_clients,
            current_round: status.current_round,
        }
    }
}
