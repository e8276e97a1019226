use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/register", post(handlers::register_client))
        .route("/get_model", post(handlers::get_global_model))
        .route("/submit_update", post(handlers::submit_update))
        .route("/training_status", get(handlers::get_training_status))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(cors)
}
