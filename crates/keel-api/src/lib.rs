//! Keel HTTP API: the Orders context behind an Axum router.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the application router over `state`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::orders::router())
        .merge(routes::saga::router())
        .merge(routes::inventory::router())
        .merge(routes::stats::router())
        .with_state(state)
}
