pub mod operations;
pub mod status;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/operations", post(operations::start_operation))
        .route("/api/operations/status", post(status::receive_status))
        .route("/api/operations/{id}", get(operations::get_operation))
        .route("/api/restores/schedule", post(operations::schedule_restore))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
