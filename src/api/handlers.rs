use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::api::{state::AppState, types::*};
use crate::coordinator::TrainingStatus;
use crate::error::FedError;
use crate::status::HealthResponse;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: FedError) -> ApiError {
    let status = match &err {
        FedError::UnregisteredClient(_) | FedError::InvalidUpdate(_) => StatusCode::BAD_REQUEST,
        FedError::TrainingComplete { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// POST /register
pub async fn register_client(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    if req.client_id.trim().is_empty() {
        return Err(error_response(FedError::InvalidUpdate(
            "client_id is required".to_string(),
        )));
    }
    let server_config = state
        .coordinator
        .register(&req.client_id, req.client_info)
        .await;
    Ok(Json(RegisterResponse {
        status: "registered".to_string(),
        client_id: req.client_id,
        server_config,
    }))
}

/// POST /get_model
pub async fn get_global_model(
    State(state): State<AppState>,
    Json(req): Json<GetModelRequest>,
) -> Result<Json<GetModelResponse>, ApiError> {
    let model = state
        .coordinator
        .get_global_model(&req.client_id)
        .await
        .map_err(error_response)?;
    Ok(Json(GetModelResponse {
        model_weights: model.weights,
        round: model.round,
        timestamp: Utc::now(),
    }))
}

/// POST /submit_update
pub async fn submit_update(
    State(state): State<AppState>,
    Json(req): Json<SubmitUpdateRequest>,
) -> Result<Json<SubmitUpdateResponse>, ApiError> {
    let timestamp = state
        .coordinator
        .receive_update(&req.client_id, req.model_weights, req.metrics)
        .await
        .map_err(error_response)?;
    Ok(Json(SubmitUpdateResponse {
        status: "update_received".to_string(),
        client_id: req.client_id,
        timestamp,
    }))
}

/// GET /training_status
pub async fn get_training_status(State(state): State<AppState>) -> Json<TrainingStatus> {
    Json(state.reporter.training_status().await)
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.reporter.health().await)
}
