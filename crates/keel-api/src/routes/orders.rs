//! Routes for the Orders context: commands go through the command bus,
//! reads through the query bus.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use keel_core::repository::EventStore;
use keel_cqrs::CommandResult;
use keel_orders::domain::aggregates::OrderStatus;
use keel_orders::domain::commands::{CancelOrder, CreateOrder, DeliverOrder, ShipOrder};
use keel_orders::domain::queries::{GetOrder, ListOrders};
use serde::Deserialize;
use serde_json::{Value, json};

use super::parse_body;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /orders`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CreateOrderRequest {
    /// The ordering user.
    pub user_id: String,
    /// Product name.
    pub product: String,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
}

impl Default for CreateOrderRequest {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_owned(),
            product: String::new(),
            quantity: 1,
            price: 0.0,
        }
    }
}

/// Request body for `POST /orders/{id}/cancel`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CancelOrderRequest {
    /// Why the order is cancelled.
    pub reason: String,
}

impl Default for CancelOrderRequest {
    fn default() -> Self {
        Self {
            reason: "Cancelled by user".to_owned(),
        }
    }
}

/// Query string for `GET /orders`.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    /// Status filter, e.g. `shipped`.
    pub status: Option<String>,
}

fn command_response(message: &str, result: CommandResult) -> Result<Json<Value>, ApiError> {
    if let Some(error) = ApiError::from_command(&result) {
        return Err(error);
    }
    Ok(Json(json!({ "message": message, "data": result.data() })))
}

async fn ensure_order_exists(state: &AppState, order_id: &str) -> Result<(), ApiError> {
    let result = state
        .query_bus
        .execute(GetOrder::new(order_id, state.clock.as_ref()))
        .await;
    if let Some(error) = ApiError::from_query(&result) {
        return Err(error);
    }
    if result.found() {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("Order {order_id} not found")))
    }
}

/// POST /orders
async fn create_order(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: CreateOrderRequest = parse_body(&body)?;
    let command = CreateOrder::new(
        request.user_id,
        request.product,
        request.quantity,
        request.price,
        state.clock.as_ref(),
    );
    let result = state.command_bus.dispatch(command).await;
    let body = command_response("Order created", result)?;
    Ok((StatusCode::CREATED, body))
}

/// GET /orders
async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Value>, ApiError> {
    let status = params
        .status
        .map(|raw| {
            serde_json::from_value::<OrderStatus>(Value::String(raw.clone()))
                .map_err(|_| ApiError::BadRequest(format!("unknown order status: {raw}")))
        })
        .transpose()?;
    let result = state
        .query_bus
        .execute(ListOrders::new(status, state.clock.as_ref()))
        .await;
    if let Some(error) = ApiError::from_query(&result) {
        return Err(error);
    }
    Ok(Json(
        result
            .into_data()
            .unwrap_or_else(|| json!({ "orders": [], "total": 0 })),
    ))
}

/// GET /orders/{id}
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .query_bus
        .execute(GetOrder::new(order_id.clone(), state.clock.as_ref()))
        .await;
    if let Some(error) = ApiError::from_query(&result) {
        return Err(error);
    }
    result
        .into_data()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))
}

/// POST /orders/{id}/ship
async fn ship_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    ensure_order_exists(&state, &order_id).await?;
    let result = state
        .command_bus
        .dispatch(ShipOrder::new(order_id, state.clock.as_ref()))
        .await;
    command_response("Order shipped", result)
}

/// POST /orders/{id}/deliver
async fn deliver_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    ensure_order_exists(&state, &order_id).await?;
    let result = state
        .command_bus
        .dispatch(DeliverOrder::new(order_id, state.clock.as_ref()))
        .await;
    command_response("Order delivered", result)
}

/// POST /orders/{id}/cancel
async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: CancelOrderRequest = parse_body(&body)?;
    ensure_order_exists(&state, &order_id).await?;
    let result = state
        .command_bus
        .dispatch(CancelOrder::new(
            order_id,
            request.reason,
            state.clock.as_ref(),
        ))
        .await;
    command_response("Order cancelled", result)
}

/// GET /orders/{id}/events
async fn get_order_events(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let events = state.event_store.get_events(&order_id, 0).await?;
    if events.is_empty() {
        return Err(ApiError::NotFound(format!("No events found for {order_id}")));
    }
    Ok(Json(json!({
        "aggregate_id": order_id,
        "event_count": events.len(),
        "events": events,
    })))
}

/// Returns the router for the Orders context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/ship", post(ship_order))
        .route("/orders/{id}/deliver", post(deliver_order))
        .route("/orders/{id}/cancel", post(cancel_order))
        .route("/orders/{id}/events", get(get_order_events))
}
