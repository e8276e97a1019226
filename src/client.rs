//! HTTP client for the federated coordination server.
//!
//! Used by client processes to register, pull the global model, and push
//! local training results between rounds.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::api::types::{
    GetModelRequest, GetModelResponse, RegisterRequest, RegisterResponse, SubmitUpdateRequest,
    SubmitUpdateResponse,
};
use crate::coordinator::TrainingStatus;
use crate::error::{FedError, Result};
use crate::registry::ClientInfo;
use crate::status::HealthResponse;
use crate::weights::WeightSet;

pub struct FederatedHttpClient {
    http: reqwest::Client,
    server_url: String,
    client_id: String,
}

impl FederatedHttpClient {
    pub fn new(server_url: &str, client_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Register this client with the server. Safe to repeat.
    pub async fn register(&self, info: ClientInfo) -> Result<RegisterResponse> {
        let resp = self
            .http
            .post(format!("{}/register", self.server_url))
            .json(&RegisterRequest {
                client_id: self.client_id.clone(),
                client_info: info,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<RegisterResponse>()
            .await?;
        info!(client_id = %self.client_id, round = resp.server_config.current_round, "registered with server");
        Ok(resp)
    }

    /// Pull the current global model.
    pub async fn get_global_model(&self) -> Result<GetModelResponse> {
        let resp = self
            .http
            .post(format!("{}/get_model", self.server_url))
            .json(&GetModelRequest {
                client_id: self.client_id.clone(),
            })
            .send()
            .await?
            .error_for_status()?
            .json::<GetModelResponse>()
            .await?;
        debug!(round = resp.round, "retrieved global model");
        Ok(resp)
    }

    /// Submit a local training result for the current round.
    pub async fn submit_update(
        &self,
        weights: WeightSet,
        metrics: HashMap<String, f64>,
    ) -> Result<SubmitUpdateResponse> {
        let resp = self
            .http
            .post(format!("{}/submit_update", self.server_url))
            .json(&SubmitUpdateRequest {
                client_id: self.client_id.clone(),
                model_weights: weights,
                metrics,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<SubmitUpdateResponse>()
            .await?;
        Ok(resp)
    }

    pub async fn training_status(&self) -> Result<TrainingStatus> {
        Ok(self
            .http
            .get(format!("{}/training_status", self.server_url))
            .send()
            .await?
            .error_for_status()?
            .json::<TrainingStatus>()
            .await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        Ok(self
            .http
            .get(format!("{}/health", self.server_url))
            .send()
            .await?
            .error_for_status()?
            .json::<HealthResponse>()
            .await?)
    }

    /// Poll until the server reaches `round` (or training ends).
    ///
    /// Returns the final status, or `Timeout` if the deadline passes
    /// before the round is reached.
    pub async fn wait_for_round(
        &self,
        round: u64,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TrainingStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.training_status().await?;
            if status.current_round >= round || !status.training_active {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(FedError::Timeout(format!(
                    "round {round} not reached within {timeout:?} (at {})",
                    status.current_round
                )));
            }
            debug!(
                current = status.current_round,
                waiting_for = round,
                "waiting for round"
            );
            tokio::time::sleep(poll_interval).await;
        }
    }
}
