use std::sync::Arc;

use crate::coordinator::RoundCoordinator;
use crate::status::StatusReporter;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RoundCoordinator>,
    pub reporter: StatusReporter,
}

impl AppState {
    pub fn new(coordinator: Arc<RoundCoordinator>) -> Self {
        let reporter = StatusReporter::new(coordinator.clone());
        Self {
            coordinator,
            reporter,
        }
    }
}
