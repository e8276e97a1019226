use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::coordinator::ServerConfigInfo;
use crate::registry::ClientInfo;
use crate::weights::WeightSet;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub client_id: String,
    #[serde(default)]
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetModelRequest {
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitUpdateRequest {
    pub client_id: String,
    pub model_weights: WeightSet,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: String,
    pub client_id: String,
    pub server_config: ServerConfigInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetModelResponse {
    pub model_weights: WeightSet,
    pub round: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitUpdateResponse {
    pub status: String,
    pub client_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
