//! Round coordinator — the distributed-training state machine.
//!
//! Owns the client registry, the in-flight round's pending updates, and
//! the global weights behind one `RwLock`. `receive_update`'s
//! check-and-aggregate sequence runs entirely under the write lock, so no
//! two aggregations can race and no reader ever observes a
//! half-aggregated model. Aggregation is synchronous and inline: the call
//! that supplies the quorum-triggering update pays for running FedAvg
//! before returning. Read paths hold the lock only long enough to copy
//! state out.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::aggregator::{
    check_convergence, compute_metrics, federated_average, ClientContribution,
    MetricsContribution,
};
use crate::config::FederatedConfig;
use crate::error::{FedError, Result};
use crate::registry::{ClientInfo, ClientRegistry};
use crate::weights::WeightSet;

use super::state::{PendingUpdate, RoundPhase, RoundState, RoundSummary, TrainingStatus};

/// Metric key a client uses to declare its sample count for weighting.
const NUM_SAMPLES_KEY: &str = "num_samples";

/// Federated parameters handed back to a client on registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfigInfo {
    pub min_clients: usize,
    pub total_rounds: u64,
    pub weighted: bool,
    pub current_round: u64,
}

/// Full-value global model snapshot (copy-out, never a live reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalModel {
    pub weights: WeightSet,
    pub round: u64,
}

struct Inner {
    registry: ClientRegistry,
    round: RoundState,
}

/// The coordination core. Constructed once at server start and shared as
/// `Arc<RoundCoordinator>` with every transport task.
pub struct RoundCoordinator {
    inner: RwLock<Inner>,
    weighted: bool,
    default_client_size: u64,
    convergence_threshold: f64,
    staleness_window: Duration,
}

impl RoundCoordinator {
    pub fn new(initial_weights: WeightSet, config: &FederatedConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                registry: ClientRegistry::new(),
                round: RoundState::new(initial_weights, config.min_clients, config.total_rounds),
            }),
            weighted: config.weighted,
            default_client_size: config.default_client_size.max(1),
            convergence_threshold: config.convergence_threshold,
            staleness_window: Duration::seconds(config.staleness_window_secs as i64),
        }
    }

    /// Register a client. Idempotent — re-registration only refreshes
    /// liveness. Returns the federated parameters the client trains with.
    pub async fn register(&self, client_id: &str, info: ClientInfo) -> ServerConfigInfo {
        let mut inner = self.inner.write().await;
        let known = inner.registry.contains(client_id);
        inner.registry.register(client_id, info);
        if known {
            debug!(client_id, "client re-registered");
        } else {
            info!(
                client_id,
                total_clients = inner.registry.len(),
                "client registered"
            );
        }
        ServerConfigInfo {
            min_clients: inner.round.min_clients,
            total_rounds: inner.round.total_rounds,
            weighted: self.weighted,
            current_round: inner.round.current_round,
        }
    }

    /// Begin training: `Waiting -> Collecting`, round 1. Idempotent if
    /// training is already active. Updates buffered while waiting count
    /// toward round 1, so the quorum check runs once here as well.
    pub async fn start(&self) {
        let mut inner = self.inner.write().await;
        if inner.round.training_active || inner.round.is_completed() {
            return;
        }
        inner.round.phase = RoundPhase::Collecting;
        inner.round.training_active = true;
        inner.round.current_round = 1;
        info!(
            total_rounds = inner.round.total_rounds,
            min_clients = inner.round.min_clients,
            weighted = self.weighted,
            "training started"
        );
        self.try_aggregate(&mut inner);
    }

    /// Accept one client update for the current round.
    ///
    /// Stores the update (last-write-wins per client), refreshes the
    /// client's liveness, and — still holding the write lock — aggregates
    /// if the quorum is now met. Updates arriving after a round has
    /// aggregated land in the next round's pending set; they are never
    /// dropped and never retroactively applied. Returns the acceptance
    /// timestamp.
    pub async fn receive_update(
        &self,
        client_id: &str,
        weights: WeightSet,
        metrics: HashMap<String, f64>,
    ) -> Result<DateTime<Utc>> {
        let mut inner = self.inner.write().await;

        if !inner.registry.contains(client_id) {
            return Err(FedError::UnregisteredClient(client_id.to_string()));
        }
        if inner.round.is_completed() {
            return Err(FedError::TrainingComplete {
                current_round: inner.round.current_round,
                total_rounds: inner.round.total_rounds,
            });
        }
        if weights.is_empty() {
            return Err(FedError::InvalidUpdate(
                "weight set is empty or contains an empty layer".to_string(),
            ));
        }

        inner.registry.touch(client_id);
        let now = Utc::now();
        let replaced = inner
            .round
            .pending_updates
            .insert(
                client_id.to_string(),
                PendingUpdate {
                    client_id: client_id.to_string(),
                    weights,
                    metrics,
                    submitted_at: now,
                },
            )
            .is_some();
        if replaced {
            debug!(client_id, "duplicate submission replaced earlier update");
        }
        debug!(
            client_id,
            round = inner.round.current_round,
            pending = inner.round.pending_updates.len(),
            needed = inner.round.min_clients,
            "update stored"
        );

        self.try_aggregate(&mut inner);
        Ok(now)
    }

    /// Check-and-aggregate. Must be called with the write lock held so the
    /// quorum check, the FedAvg run, and the weight replacement form one
    /// atomic step with respect to every other operation.
    fn try_aggregate(&self, inner: &mut Inner) {
        if !inner.round.training_active || !inner.round.quorum_met() {
            return;
        }
        inner.round.phase = RoundPhase::Aggregating;

        let mut contributions = Vec::with_capacity(inner.round.pending_updates.len());
        let mut metric_inputs = Vec::with_capacity(inner.round.pending_updates.len());
        for update in inner.round.pending_updates.values() {
            // Non-finite or non-positive sample counts fall through to the
            // declared size rather than truncating to a zero weight.
            let size = update
                .metrics
                .get(NUM_SAMPLES_KEY)
                .filter(|v| v.is_finite() && **v >= 1.0)
                .map(|v| *v as u64)
                .or_else(|| {
                    inner
                        .registry
                        .get(&update.client_id)
                        .and_then(|c| c.declared_size)
                })
                .unwrap_or(self.default_client_size);
            contributions.push(ClientContribution {
                client_id: update.client_id.clone(),
                weights: update.weights.clone(),
                size,
            });
            metric_inputs.push(MetricsContribution {
                size,
                metrics: update.metrics.clone(),
            });
        }

        match federated_average(&contributions, self.weighted) {
            Ok(new_weights) => {
                let round = inner.round.current_round;
                let metrics = compute_metrics(&metric_inputs, self.weighted);
                let converged = check_convergence(
                    Some(&inner.round.global_weights),
                    Some(&new_weights),
                    self.convergence_threshold,
                );
                let mut participants: Vec<String> = contributions
                    .iter()
                    .map(|c| c.client_id.clone())
                    .collect();
                participants.sort();

                info!(
                    round,
                    participants = participants.len(),
                    converged,
                    ?metrics,
                    "round aggregated"
                );

                inner.round.global_weights = new_weights;
                inner.round.last_round_metrics = metrics.clone();
                inner.round.converged = converged;
                inner.round.pending_updates.clear();
                inner.round.history.push(RoundSummary {
                    round,
                    participants,
                    metrics,
                    converged,
                    aggregated_at: Utc::now(),
                });

                if round >= inner.round.total_rounds {
                    inner.round.phase = RoundPhase::Completed;
                    inner.round.training_active = false;
                    info!(
                        rounds = inner.round.total_rounds,
                        "training complete"
                    );
                } else {
                    inner.round.current_round = round + 1;
                    inner.round.phase = RoundPhase::Collecting;
                }
            }
            Err(e) => {
                // Non-fatal: global weights untouched, pending updates
                // retained so the round can retry once the faulty data is
                // replaced or a straggler arrives.
                error!(
                    round = inner.round.current_round,
                    pending = inner.round.pending_updates.len(),
                    "aggregation failed, retaining pending updates: {e}"
                );
                inner.round.phase = RoundPhase::Collecting;
            }
        }
    }

    /// Deep copy of the current global model. Refreshes the caller's
    /// liveness; fails for unknown clients.
    pub async fn get_global_model(&self, client_id: &str) -> Result<GlobalModel> {
        let mut inner = self.inner.write().await;
        if !inner.registry.touch(client_id) {
            return Err(FedError::UnregisteredClient(client_id.to_string()));
        }
        Ok(GlobalModel {
            weights: inner.round.global_weights.clone(),
            round: inner.round.current_round,
        })
    }

    /// Pure read of the status projection.
    pub async fn training_status(&self) -> TrainingStatus {
        let inner = self.inner.read().await;
        TrainingStatus {
            current_round: inner.round.current_round,
            total_rounds: inner.round.total_rounds,
            active_clients: inner.registry.active_count(self.staleness_window),
            clients_ready: inner.round.pending_updates.len(),
            min_clients: inner.round.min_clients,
            training_active: inner.round.training_active,
        }
    }

    /// Per-round audit history (copy-out).
    pub async fn round_history(&self) -> Vec<RoundSummary> {
        self.inner.read().await.round.history.clone()
    }

    /// Metrics from the most recently aggregated round.
    pub async fn last_round_metrics(&self) -> HashMap<String, f64> {
        self.inner.read().await.round.last_round_metrics.clone()
    }

    /// Convergence flag from the most recent aggregation.
    pub async fn has_converged(&self) -> bool {
        self.inner.read().await.round.converged
    }

    pub async fn current_phase(&self) -> RoundPhase {
        self.inner.read().await.round.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::Tensor;

    fn test_config(min_clients: usize, total_rounds: u64, weighted: bool) -> FederatedConfig {
        FederatedConfig {
            min_clients,
            total_rounds,
            weighted,
            ..Default::default()
        }
    }

    fn weights(values: Vec<f64>) -> WeightSet {
        WeightSet::new(vec![Tensor::vector(values)])
    }

    fn coordinator(min_clients: usize, total_rounds: u64, weighted: bool) -> RoundCoordinator {
        RoundCoordinator::new(weights(vec![0.0]), &test_config(min_clients, total_rounds, weighted))
    }

    async fn register(coord: &RoundCoordinator, id: &str, size: Option<u64>) {
        coord
            .register(
                id,
                ClientInfo {
                    dataset_size: size,
                    ..Default::default()
                },
            )
            .await;
    }

    #[tokio::test]
    async fn test_unregistered_client_rejected() {
        let coord = coordinator(2, 10, false);
        coord.start().await;
        let err = coord
            .receive_update("ghost", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FedError::UnregisteredClient(_)));
    }

    #[tokio::test]
    async fn test_empty_weights_rejected_before_touching_state() {
        let coord = coordinator(2, 10, false);
        register(&coord, "a", None).await;
        coord.start().await;
        let err = coord
            .receive_update("a", WeightSet::default(), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FedError::InvalidUpdate(_)));
        assert_eq!(coord.training_status().await.clients_ready, 0);
    }

    #[tokio::test]
    async fn test_quorum_gates_aggregation() {
        let coord = coordinator(2, 10, false);
        register(&coord, "a", None).await;
        register(&coord, "b", None).await;
        register(&coord, "c", None).await;
        coord.start().await;

        coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap();

        let status = coord.training_status().await;
        assert_eq!(status.current_round, 1);
        assert_eq!(status.clients_ready, 1);
    }

    #[tokio::test]
    async fn test_quorum_triggers_round_advance() {
        let coord = coordinator(2, 10, false);
        register(&coord, "a", None).await;
        register(&coord, "b", None).await;
        coord.start().await;

        coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap();
        coord
            .receive_update("b", weights(vec![3.0]), HashMap::new())
            .await
            .unwrap();

        let status = coord.training_status().await;
        assert_eq!(status.current_round, 2);
        assert_eq!(status.clients_ready, 0);

        let model = coord.get_global_model("a").await.unwrap();
        assert_eq!(model.weights.layers()[0].values(), &[2.0]);
        assert_eq!(model.round, 2);
    }

    #[tokio::test]
    async fn test_weighted_aggregation_uses_declared_sizes() {
        let coord = coordinator(2, 10, true);
        register(&coord, "a", Some(100)).await;
        register(&coord, "b", Some(300)).await;
        coord.start().await;

        coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap();
        coord
            .receive_update("b", weights(vec![2.0]), HashMap::new())
            .await
            .unwrap();

        let model = coord.get_global_model("a").await.unwrap();
        assert!((model.weights.layers()[0].values()[0] - 1.75).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_num_samples_metric_overrides_declared_size() {
        let coord = coordinator(2, 10, true);
        register(&coord, "a", Some(1)).await;
        register(&coord, "b", Some(1)).await;
        coord.start().await;

        coord
            .receive_update(
                "a",
                weights(vec![1.0]),
                HashMap::from([("num_samples".to_string(), 100.0)]),
            )
            .await
            .unwrap();
        coord
            .receive_update(
                "b",
                weights(vec![2.0]),
                HashMap::from([("num_samples".to_string(), 300.0)]),
            )
            .await
            .unwrap();

        let model = coord.get_global_model("a").await.unwrap();
        assert!((model.weights.layers()[0].values()[0] - 1.75).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_bad_sample_counts_fall_back_to_declared_size() {
        let coord = coordinator(2, 10, true);
        register(&coord, "a", Some(100)).await;
        register(&coord, "b", Some(300)).await;
        coord.start().await;

        // NaN and negative counts are ignored, not truncated to zero.
        coord
            .receive_update(
                "a",
                weights(vec![1.0]),
                HashMap::from([("num_samples".to_string(), f64::NAN)]),
            )
            .await
            .unwrap();
        coord
            .receive_update(
                "b",
                weights(vec![2.0]),
                HashMap::from([("num_samples".to_string(), -50.0)]),
            )
            .await
            .unwrap();

        // Round aggregated with the declared 100/300 split.
        let status = coord.training_status().await;
        assert_eq!(status.current_round, 2);
        let model = coord.get_global_model("a").await.unwrap();
        assert!((model.weights.layers()[0].values()[0] - 1.75).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_straggler_lands_in_next_round() {
        let coord = coordinator(2, 10, false);
        register(&coord, "a", None).await;
        register(&coord, "b", None).await;
        register(&coord, "c", None).await;
        coord.start().await;

        coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap();
        coord
            .receive_update("b", weights(vec![3.0]), HashMap::new())
            .await
            .unwrap();
        // Round 1 aggregated; c's update is late.
        coord
            .receive_update("c", weights(vec![5.0]), HashMap::new())
            .await
            .unwrap();

        let status = coord.training_status().await;
        assert_eq!(status.current_round, 2);
        assert_eq!(status.clients_ready, 1);
        // Round 1's result is untouched by the straggler.
        let model = coord.get_global_model("a").await.unwrap();
        assert_eq!(model.weights.layers()[0].values(), &[2.0]);
    }

    #[tokio::test]
    async fn test_duplicate_submission_last_write_wins() {
        let coord = coordinator(2, 10, false);
        register(&coord, "a", None).await;
        register(&coord, "b", None).await;
        coord.start().await;

        coord
            .receive_update("a", weights(vec![10.0]), HashMap::new())
            .await
            .unwrap();
        coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap();
        assert_eq!(coord.training_status().await.clients_ready, 1);

        coord
            .receive_update("b", weights(vec![3.0]), HashMap::new())
            .await
            .unwrap();
        let model = coord.get_global_model("a").await.unwrap();
        assert_eq!(model.weights.layers()[0].values(), &[2.0]);
    }

    #[tokio::test]
    async fn test_aggregation_failure_preserves_state() {
        let coord = coordinator(2, 10, false);
        register(&coord, "a", None).await;
        register(&coord, "b", None).await;
        coord.start().await;

        let before = coord.get_global_model("a").await.unwrap();
        coord
            .receive_update("a", weights(vec![1.0, 2.0]), HashMap::new())
            .await
            .unwrap();
        // Shape conflict trips the aggregator when quorum is hit.
        coord
            .receive_update("b", weights(vec![3.0]), HashMap::new())
            .await
            .unwrap();

        let status = coord.training_status().await;
        assert_eq!(status.current_round, 1);
        assert_eq!(status.clients_ready, 2);
        let after = coord.get_global_model("a").await.unwrap();
        assert_eq!(after.weights, before.weights);
        assert_eq!(coord.current_phase().await, RoundPhase::Collecting);

        // A corrected resubmission lets the same round retry and succeed.
        coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap();
        assert_eq!(coord.training_status().await.current_round, 2);
    }

    #[tokio::test]
    async fn test_completion_rejects_further_updates() {
        let coord = coordinator(2, 1, false);
        register(&coord, "a", None).await;
        register(&coord, "b", None).await;
        coord.start().await;

        coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap();
        coord
            .receive_update("b", weights(vec![3.0]), HashMap::new())
            .await
            .unwrap();

        let status = coord.training_status().await;
        assert!(!status.training_active);
        assert_eq!(status.current_round, 1);
        assert_eq!(coord.current_phase().await, RoundPhase::Completed);

        let err = coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FedError::TrainingComplete { .. }));
        // The aggregated model is still served.
        assert!(coord.get_global_model("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_updates_buffered_while_waiting_fire_on_start() {
        let coord = coordinator(2, 10, false);
        register(&coord, "a", None).await;
        register(&coord, "b", None).await;

        coord
            .receive_update("a", weights(vec![1.0]), HashMap::new())
            .await
            .unwrap();
        coord
            .receive_update("b", weights(vec![3.0]), HashMap::new())
            .await
            .unwrap();
        // No aggregation before start.
        assert_eq!(coord.training_status().await.clients_ready, 2);
        assert_eq!(coord.training_status().await.current_round, 0);

        coord.start().await;
        let status = coord.training_status().await;
        assert_eq!(status.current_round, 2);
        assert_eq!(status.clients_ready, 0);
    }

    #[tokio::test]
    async fn test_round_history_records_participants_and_metrics() {
        let coord = coordinator(2, 10, false);
        register(&coord, "a", None).await;
        register(&coord, "b", None).await;
        coord.start().await;

        coord
            .receive_update(
                "a",
                weights(vec![1.0]),
                HashMap::from([("loss".to_string(), 0.4)]),
            )
            .await
            .unwrap();
        coord
            .receive_update(
                "b",
                weights(vec![3.0]),
                HashMap::from([("loss".to_string(), 0.6)]),
            )
            .await
            .unwrap();

        let history = coord.round_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].round, 1);
        assert_eq!(history[0].participants, vec!["a", "b"]);
        assert!((history[0].metrics["loss"] - 0.5).abs() < 1e-12);
    }
}
