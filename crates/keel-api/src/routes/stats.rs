//! Aggregate counters across the event store, buses and orchestrator.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /stats
async fn get_stats(State(state): State<AppState>) -> Json<Value> {
    let buses = state.command_bus.stats().combined(state.query_bus.stats());
    Json(json!({
        "event_store": {
            "connected": state.event_store.is_connected(),
            "stats": state.event_store.stats(),
        },
        "cqrs": {
            "command_handlers": state.command_bus.handler_count(),
            "query_handlers": state.query_bus.handler_count(),
            "stats": buses,
        },
        "saga": {
            "retained_executions": state.orchestrator.execution_count(),
            "stats": state.orchestrator.stats(),
        },
        "read_model": {
            "orders": state.read_model.len(),
        },
        "payments": state.payments.list().len(),
    }))
}

/// Returns the stats router.
pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}
