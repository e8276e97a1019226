//! HTTP transport for the coordination core.
//!
//! Thin axum wrapper around the operation contract: `/register`,
//! `/get_model`, `/submit_update`, `/training_status`, `/health`. All
//! coordination semantics live in the core; this layer only decodes
//! requests, maps errors to status codes, and re-encodes snapshots.

pub mod handlers;
pub mod routes;
pub mod state;
pub mod types;

pub use routes::create_router;
pub use state::AppState;
