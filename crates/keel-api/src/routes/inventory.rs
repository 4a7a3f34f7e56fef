//! Stock levels consulted by the placement saga.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /inventory
async fn get_inventory(State(state): State<AppState>) -> Json<Value> {
    let levels = state.inventory.levels();
    Json(json!({
        "total_products": levels.len(),
        "inventory": levels,
    }))
}

/// Returns the inventory router.
pub fn router() -> Router<AppState> {
    Router::new().route("/inventory", get(get_inventory))
}
