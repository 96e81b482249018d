//! Readiness probe for the backing stores

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use axum_helpers::{run_health_checks, HealthCheckFuture};

use crate::state::AppState;

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let db = state.db.clone();
    let service = state.service.clone();

    let checks: Vec<(&str, HealthCheckFuture)> = vec![
        (
            "metadata",
            Box::pin(async move { db.ping().await.map_err(|e| e.to_string()) }),
        ),
        (
            "index",
            Box::pin(async move { service.index().ping().await.map_err(|e| e.to_string()) }),
        ),
    ];

    match run_health_checks(checks).await {
        Ok(ok) => ok.into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
