//! API routes module

pub mod health;

use axum::Router;

use crate::state::AppState;

/// Create all API routes
pub fn routes(state: &AppState) -> Router {
    Router::new().nest(
        "/images",
        domain_images::handlers::routes(state.service.clone()),
    )
}
