//! The `order_placement` saga: reserve stock, take payment, create the
//! order through the command bus, then confirm it.
//!
//! Context keys written by the steps: `inventory_reserved`,
//! `reserved_quantity`, `payment_id`, `payment_amount` and `order_id`.

use std::sync::Arc;

use futures::FutureExt;
use keel_core::clock::SharedClock;
use keel_cqrs::CommandBus;
use keel_saga::{Saga, SagaContext, SagaStep, StepError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::inventory::Inventory;
use super::payments::PaymentLedger;
use crate::domain::aggregates::round_cents;
use crate::domain::commands::{CancelOrder, ConfirmOrder, CreateOrder};

/// Registration name of the placement saga.
pub const ORDER_PLACEMENT_SAGA: &str = "order_placement";

/// Cancellation reason used when rolling back a created order.
pub const COMPENSATION_REASON: &str = "Saga compensation - rolling back";

fn default_user() -> String {
    "anonymous".to_owned()
}

fn default_product() -> String {
    "Unknown".to_owned()
}

fn default_quantity() -> u32 {
    1
}

/// Inputs the saga reads from its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    /// The ordering user.
    #[serde(default = "default_user")]
    pub user_id: String,
    /// Product name.
    #[serde(default = "default_product")]
    pub product: String,
    /// Units ordered.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Unit price.
    #[serde(default)]
    pub price: f64,
}

impl PlacementRequest {
    /// Reads the request fields from a saga context.
    ///
    /// # Errors
    ///
    /// Returns a `StepError` if a field has the wrong type.
    pub fn from_context(context: &SagaContext) -> Result<Self, StepError> {
        serde_json::from_value(Value::Object(context.clone()))
            .map_err(|e| format!("invalid placement request: {e}").into())
    }

    /// Seeds a fresh saga context with the request fields.
    #[must_use]
    pub fn into_context(self) -> SagaContext {
        let mut context = SagaContext::new();
        context.insert("user_id".into(), json!(self.user_id));
        context.insert("product".into(), json!(self.product));
        context.insert("quantity".into(), json!(self.quantity));
        context.insert("price".into(), json!(self.price));
        context
    }

    /// `price * quantity`, rounded to cents.
    #[must_use]
    pub fn total(&self) -> f64 {
        round_cents(self.price * f64::from(self.quantity))
    }
}

fn context_str<'a>(context: &'a SagaContext, key: &str) -> Option<&'a str> {
    context.get(key).and_then(Value::as_str)
}

/// Builds the placement saga over the given collaborators.
#[must_use]
pub fn order_placement_saga(
    inventory: &Arc<Inventory>,
    payments: &Arc<PaymentLedger>,
    commands: &Arc<CommandBus>,
    clock: &SharedClock,
) -> Saga {
    Saga::new(ORDER_PLACEMENT_SAGA)
        .with_description("Reserve inventory, take payment, create and confirm an order")
        .step(reserve_inventory_step(inventory))
        .step(process_payment_step(payments, clock))
        .step(create_order_step(commands, clock))
        .step(confirm_order_step(commands, clock))
}

fn reserve_inventory_step(inventory: &Arc<Inventory>) -> SagaStep {
    let reserve = Arc::clone(inventory);
    let release = Arc::clone(inventory);
    SagaStep::new("reserve_inventory", move |ctx| {
        let inventory = Arc::clone(&reserve);
        async move {
            let request = PlacementRequest::from_context(ctx)?;
            let remaining = inventory.reserve(&request.product, request.quantity)?;
            ctx.insert("inventory_reserved".into(), json!(true));
            ctx.insert("reserved_quantity".into(), json!(request.quantity));
            Ok::<_, StepError>(json!({ "product": request.product, "remaining": remaining }))
        }
        .boxed()
    })
    .with_compensation(move |ctx| {
        let inventory = Arc::clone(&release);
        async move {
            let quantity = ctx
                .get("reserved_quantity")
                .and_then(Value::as_u64)
                .and_then(|q| u32::try_from(q).ok())
                .unwrap_or(0);
            if let Some(product) = context_str(ctx, "product").filter(|_| quantity > 0) {
                inventory.release(product, quantity);
            }
            Ok(json!({ "released": quantity }))
        }
        .boxed()
    })
}

fn process_payment_step(payments: &Arc<PaymentLedger>, clock: &SharedClock) -> SagaStep {
    let charge = Arc::clone(payments);
    let refund = Arc::clone(payments);
    let clock = Arc::clone(clock);
    SagaStep::new("process_payment", move |ctx| {
        let payments = Arc::clone(&charge);
        let clock = Arc::clone(&clock);
        async move {
            let request = PlacementRequest::from_context(ctx)?;
            let payment = payments.charge(&request.user_id, request.total(), clock.as_ref())?;
            ctx.insert("payment_id".into(), json!(payment.id));
            ctx.insert("payment_amount".into(), json!(payment.amount));
            Ok::<_, StepError>(json!({ "payment_id": payment.id, "amount": payment.amount }))
        }
        .boxed()
    })
    .with_compensation(move |ctx| {
        let payments = Arc::clone(&refund);
        async move {
            match context_str(ctx, "payment_id") {
                Some(payment_id) => {
                    let payment = payments.refund(payment_id)?;
                    Ok::<_, StepError>(json!({ "refunded": payment.id }))
                }
                None => Ok(Value::Null),
            }
        }
        .boxed()
    })
}

fn create_order_step(commands: &Arc<CommandBus>, clock: &SharedClock) -> SagaStep {
    let create = Arc::clone(commands);
    let cancel = Arc::clone(commands);
    let create_clock = Arc::clone(clock);
    let cancel_clock = Arc::clone(clock);
    SagaStep::new("create_order", move |ctx| {
        let commands = Arc::clone(&create);
        let clock = Arc::clone(&create_clock);
        async move {
            let request = PlacementRequest::from_context(ctx)?;
            let command = CreateOrder::new(
                request.user_id,
                request.product,
                request.quantity,
                request.price,
                clock.as_ref(),
            );
            let result = commands.dispatch(command).await;
            let order_id = result
                .data()
                .and_then(|data| data.get("order_id"))
                .and_then(Value::as_str)
                .map(str::to_owned);
            match order_id {
                Some(order_id) if result.success() => {
                    ctx.insert("order_id".into(), json!(order_id));
                    Ok(json!({ "order_id": order_id }))
                }
                _ => Err::<Value, StepError>(
                    result
                        .error()
                        .unwrap_or("Order creation failed")
                        .to_owned()
                        .into(),
                ),
            }
        }
        .boxed()
    })
    .with_compensation(move |ctx| {
        let commands = Arc::clone(&cancel);
        let clock = Arc::clone(&cancel_clock);
        async move {
            let Some(order_id) = context_str(ctx, "order_id").map(str::to_owned) else {
                return Ok(Value::Null);
            };
            let result = commands
                .dispatch(CancelOrder::new(
                    order_id.clone(),
                    COMPENSATION_REASON,
                    clock.as_ref(),
                ))
                .await;
            if !result.success() {
                return Err::<Value, StepError>(
                    result.error().unwrap_or("order cancellation failed").into(),
                );
            }
            info!(%order_id, "order cancelled by compensation");
            Ok(json!({ "cancelled": order_id }))
        }
        .boxed()
    })
}

fn confirm_order_step(commands: &Arc<CommandBus>, clock: &SharedClock) -> SagaStep {
    let commands = Arc::clone(commands);
    let clock = Arc::clone(clock);
    SagaStep::new("confirm_order", move |ctx| {
        let commands = Arc::clone(&commands);
        let clock = Arc::clone(&clock);
        async move {
            let order_id = context_str(ctx, "order_id")
                .map(str::to_owned)
                .ok_or_else(|| StepError::from("order_id missing from saga context"))?;
            let payment_id = context_str(ctx, "payment_id").map(str::to_owned);
            let result = commands
                .dispatch(ConfirmOrder::new(order_id, payment_id, clock.as_ref()))
                .await;
            if result.success() {
                Ok::<_, StepError>(result.data().cloned().unwrap_or(Value::Null))
            } else {
                Err(result.error().unwrap_or("order confirmation failed").into())
            }
        }
        .boxed()
    })
}
