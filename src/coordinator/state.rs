//! Round state — the coordinator-owned view of the training run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::weights::WeightSet;

/// Coordinator lifecycle phase.
///
/// `Aggregating` is transient: it only exists inside the locked
/// check-and-aggregate section of `receive_update`, so readers observe
/// `Collecting` before and after, never a half-aggregated model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Waiting,
    Collecting,
    Aggregating,
    Completed,
}

/// One client's update, owned by the round it was submitted for.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub client_id: String,
    pub weights: WeightSet,
    pub metrics: HashMap<String, f64>,
    pub submitted_at: DateTime<Utc>,
}

/// Audit record for one aggregated round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u64,
    pub participants: Vec<String>,
    pub metrics: HashMap<String, f64>,
    pub converged: bool,
    pub aggregated_at: DateTime<Utc>,
}

/// Status projection returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStatus {
    pub current_round: u64,
    pub total_rounds: u64,
    pub active_clients: usize,
    pub clients_ready: usize,
    pub min_clients: usize,
    pub training_active: bool,
}

/// Mutable round state. Owned exclusively by the coordinator and only
/// touched under its lock.
#[derive(Debug)]
pub struct RoundState {
    pub phase: RoundPhase,
    /// 1-based round currently collecting (0 before `start`).
    pub current_round: u64,
    pub total_rounds: u64,
    pub min_clients: usize,
    pub training_active: bool,
    pub pending_updates: HashMap<String, PendingUpdate>,
    pub global_weights: WeightSet,
    /// Metrics from the most recently aggregated round.
    pub last_round_metrics: HashMap<String, f64>,
    /// Convergence flag from the most recent aggregation.
    pub converged: bool,
    pub history: Vec<RoundSummary>,
}

impl RoundState {
    pub fn new(initial_weights: WeightSet, min_clients: usize, total_rounds: u64) -> Self {
        Self {
            phase: RoundPhase::Waiting,
            current_round: 0,
            total_rounds,
            min_clients,
            training_active: false,
            pending_updates: HashMap::new(),
            global_weights: initial_weights,
            last_round_metrics: HashMap::new(),
            converged: false,
            history: Vec::new(),
        }
    }

    /// Quorum reached for the in-flight round.
    pub fn quorum_met(&self) -> bool {
        self.pending_updates.len() >= self.min_clients
    }

    pub fn is_completed(&self) -> bool {
        self.phase == RoundPhase::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::Tensor;

    #[test]
    fn test_initial_state() {
        let state = RoundState::new(
            WeightSet::new(vec![Tensor::vector(vec![0.0])]),
            2,
            10,
        );
        assert_eq!(state.phase, RoundPhase::Waiting);
        assert_eq!(state.current_round, 0);
        assert!(!state.training_active);
        assert!(!state.quorum_met());
    }
}
