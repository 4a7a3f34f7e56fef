//! Routes for running the order placement saga and inspecting its history.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use keel_orders::application::placement_saga::{ORDER_PLACEMENT_SAGA, PlacementRequest};
use keel_saga::SagaExecution;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::parse_body;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /saga/place-order`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlaceOrderRequest {
    /// The ordering user.
    pub user_id: String,
    /// Product name.
    pub product: String,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
}

impl Default for PlaceOrderRequest {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_owned(),
            product: "Unknown".to_owned(),
            quantity: 1,
            price: 0.0,
        }
    }
}

impl From<PlaceOrderRequest> for PlacementRequest {
    fn from(request: PlaceOrderRequest) -> Self {
        Self {
            user_id: request.user_id,
            product: request.product,
            quantity: request.quantity,
            price: request.price,
        }
    }
}

/// POST /saga/place-order
async fn place_order(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: PlacementRequest = parse_body::<PlaceOrderRequest>(&body)?.into();
    let total = request.total();
    let mut context = request.into_context();
    info!(product = ?context.get("product"), "starting order placement");

    let execution = state
        .orchestrator
        .execute(ORDER_PLACEMENT_SAGA, &mut context)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Order placed successfully via saga",
            "execution_id": execution.id,
            "order_id": context.get("order_id"),
            "payment_id": context.get("payment_id"),
            "product": context.get("product"),
            "quantity": context.get("quantity"),
            "total": total,
        })),
    ))
}

/// GET /saga/executions
async fn list_executions(State(state): State<AppState>) -> Json<Value> {
    let executions: Vec<SagaExecution> = state.orchestrator.list_executions();
    Json(json!({
        "registered_sagas": [ORDER_PLACEMENT_SAGA],
        "total_executions": executions.len(),
        "executions": executions,
    }))
}

/// GET /saga/executions/{id}
async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SagaExecution>, ApiError> {
    let not_found = || ApiError::NotFound(format!("Saga execution {id} not found"));
    let execution_id = Uuid::parse_str(&id).map_err(|_| not_found())?;
    state
        .orchestrator
        .get_execution(execution_id)
        .map(Json)
        .ok_or_else(not_found)
}

/// Returns the saga router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/saga/place-order", post(place_order))
        .route("/saga/executions", get(list_executions))
        .route("/saga/executions/{id}", get(get_execution))
}
