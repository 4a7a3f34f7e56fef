//! Command handlers for the Orders context.
//!
//! Each handler loads the order from the event store, runs the domain
//! method, commits the new events and refreshes the read model. Business
//! rule violations come back as rejected results; store failures propagate
//! as `DomainError` and the bus reports them as failed results.

use std::sync::Arc;

use keel_core::clock::{Clock, SharedClock};
use keel_core::error::DomainError;
use keel_core::repository::{EventStore, commit, hydrate};
use keel_cqrs::{CommandBus, CommandResult};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::read_model::OrdersReadModel;
use crate::domain::aggregates::Order;
use crate::domain::commands::{CancelOrder, ConfirmOrder, CreateOrder, DeliverOrder, ShipOrder};
use crate::domain::events::OrderCreated;

/// Generates an `order-<8 hex>` identifier.
#[must_use]
pub fn new_order_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("order-{}", &simple[..8])
}

/// Generates a `TRK-<10 upper hex>` tracking number.
#[must_use]
pub fn new_tracking_number() -> String {
    let simple = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TRK-{}", &simple[..10])
}

/// Loads `order_id`, runs `decide`, then persists and projects the result.
async fn execute<F>(
    order_id: &str,
    clock: &dyn Clock,
    store: &dyn EventStore,
    read_model: &OrdersReadModel,
    decide: F,
) -> Result<CommandResult, DomainError>
where
    F: FnOnce(&mut Order) -> Result<Value, DomainError>,
{
    let mut order = Order::new(order_id);
    hydrate(store, &mut order).await?;

    let data = match decide(&mut order) {
        Ok(data) => data,
        Err(DomainError::Validation(reason)) => return Ok(CommandResult::rejected(reason)),
        Err(e) => return Err(e),
    };

    commit(store, &mut order, clock).await?;
    read_model.upsert(order.view());
    Ok(CommandResult::ok(data))
}

/// Handles `CreateOrder`.
///
/// # Errors
///
/// Returns `DomainError` if loading or appending events fails.
pub async fn handle_create_order(
    command: &CreateOrder,
    clock: &dyn Clock,
    store: &dyn EventStore,
    read_model: &OrdersReadModel,
) -> Result<CommandResult, DomainError> {
    let order_id = command.order_id.clone().unwrap_or_else(new_order_id);
    let details = OrderCreated {
        user_id: command.user_id.clone(),
        product: command.product.clone(),
        quantity: command.quantity,
        price: command.price,
    };
    let result = execute(&order_id, clock, store, read_model, |order| {
        order.create(details, clock)?;
        let view = order.view();
        Ok(json!({
            "order_id": view.order_id,
            "status": view.status,
            "product": view.product,
            "quantity": view.quantity,
            "total": view.total,
        }))
    })
    .await?;
    if result.success() {
        info!(%order_id, product = %command.product, quantity = command.quantity, "order created");
    }
    Ok(result)
}

/// Handles `ConfirmOrder`.
///
/// # Errors
///
/// Returns `DomainError` if the order does not exist or the store fails.
pub async fn handle_confirm_order(
    command: &ConfirmOrder,
    clock: &dyn Clock,
    store: &dyn EventStore,
    read_model: &OrdersReadModel,
) -> Result<CommandResult, DomainError> {
    let payment_id = command.payment_id.clone();
    execute(&command.order_id, clock, store, read_model, |order| {
        if !order.exists() {
            return Err(DomainError::AggregateNotFound(command.order_id.clone()));
        }
        order.confirm(payment_id, clock)?;
        Ok(json!({ "order_id": command.order_id, "status": order.status() }))
    })
    .await
}

/// Handles `ShipOrder`, assigning a fresh tracking number.
///
/// # Errors
///
/// Returns `DomainError` if the order does not exist or the store fails.
pub async fn handle_ship_order(
    command: &ShipOrder,
    clock: &dyn Clock,
    store: &dyn EventStore,
    read_model: &OrdersReadModel,
) -> Result<CommandResult, DomainError> {
    let tracking_number = new_tracking_number();
    execute(&command.order_id, clock, store, read_model, |order| {
        order.ship(tracking_number.clone(), clock)?;
        Ok(json!({
            "order_id": command.order_id,
            "status": order.status(),
            "tracking_number": tracking_number,
        }))
    })
    .await
}

/// Handles `DeliverOrder`.
///
/// # Errors
///
/// Returns `DomainError` if the order does not exist or the store fails.
pub async fn handle_deliver_order(
    command: &DeliverOrder,
    clock: &dyn Clock,
    store: &dyn EventStore,
    read_model: &OrdersReadModel,
) -> Result<CommandResult, DomainError> {
    execute(&command.order_id, clock, store, read_model, |order| {
        order.deliver(clock)?;
        Ok(json!({ "order_id": command.order_id, "status": order.status() }))
    })
    .await
}

/// Handles `CancelOrder`.
///
/// # Errors
///
/// Returns `DomainError` if the order does not exist or the store fails.
pub async fn handle_cancel_order(
    command: &CancelOrder,
    clock: &dyn Clock,
    store: &dyn EventStore,
    read_model: &OrdersReadModel,
) -> Result<CommandResult, DomainError> {
    let reason = command.reason.clone();
    execute(&command.order_id, clock, store, read_model, |order| {
        order.cancel(reason.clone(), clock)?;
        Ok(json!({
            "order_id": command.order_id,
            "status": order.status(),
            "reason": reason,
        }))
    })
    .await
}

/// Registers every Orders command handler on `bus`.
pub fn register_command_handlers(
    bus: &CommandBus,
    store: &Arc<dyn EventStore>,
    read_model: &Arc<OrdersReadModel>,
    clock: &SharedClock,
) {
    macro_rules! register {
        ($command:ty, $handler:path) => {{
            let store = Arc::clone(store);
            let read_model = Arc::clone(read_model);
            let clock = Arc::clone(clock);
            bus.register(move |command: $command| {
                let store = Arc::clone(&store);
                let read_model = Arc::clone(&read_model);
                let clock = Arc::clone(&clock);
                async move {
                    $handler(&command, clock.as_ref(), store.as_ref(), &read_model).await
                }
            });
        }};
    }

    register!(CreateOrder, handle_create_order);
    register!(ConfirmOrder, handle_confirm_order);
    register!(ShipOrder, handle_ship_order);
    register!(DeliverOrder, handle_deliver_order);
    register!(CancelOrder, handle_cancel_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_event_store::InMemoryEventStore;
    use keel_test_support::{FailingEventStore, FixedClock};

    use crate::domain::aggregates::OrderStatus;

    async fn create(
        store: &InMemoryEventStore,
        read_model: &OrdersReadModel,
        clock: &FixedClock,
    ) -> String {
        let command = CreateOrder::new("user-1", "Widget", 2, 29.99, clock);
        let result = handle_create_order(&command, clock, store, read_model)
            .await
            .unwrap();
        result.data().unwrap()["order_id"]
            .as_str()
            .unwrap()
            .to_owned()
    }

    #[tokio::test]
    async fn test_handle_create_order_persists_and_projects() {
        // Arrange
        let store = InMemoryEventStore::default();
        let read_model = OrdersReadModel::new();
        let clock = FixedClock::at_default();
        let command = CreateOrder::new("user-1", "Widget", 2, 29.99, &clock);

        // Act
        let result = handle_create_order(&command, &clock, &store, &read_model)
            .await
            .unwrap();

        // Assert
        let data = result.data().unwrap();
        let order_id = data["order_id"].as_str().unwrap();
        assert!(order_id.starts_with("order-"));
        assert_eq!(order_id.len(), 14);
        assert_eq!(data["status"], json!("created"));
        assert_eq!(data["total"], json!(59.98));
        assert_eq!(store.current_version(order_id).await.unwrap(), 1);
        assert_eq!(
            read_model.get(order_id).unwrap().status,
            OrderStatus::Created
        );
    }

    #[tokio::test]
    async fn test_handle_create_order_with_existing_id_is_rejected() {
        let store = InMemoryEventStore::default();
        let read_model = OrdersReadModel::new();
        let clock = FixedClock::at_default();
        let order_id = create(&store, &read_model, &clock).await;
        let duplicate =
            CreateOrder::new("user-2", "Gadget", 1, 5.0, &clock).with_order_id(order_id.clone());

        let result = handle_create_order(&duplicate, &clock, &store, &read_model)
            .await
            .unwrap();

        assert!(result.is_rejected());
        assert_eq!(store.current_version(&order_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_handle_ship_order_assigns_tracking_number() {
        // Arrange
        let store = InMemoryEventStore::default();
        let read_model = OrdersReadModel::new();
        let clock = FixedClock::at_default();
        let order_id = create(&store, &read_model, &clock).await;

        // Act
        let result = handle_ship_order(&ShipOrder::new(&order_id, &clock), &clock, &store, &read_model)
            .await
            .unwrap();

        // Assert
        let tracking = result.data().unwrap()["tracking_number"].as_str().unwrap();
        assert!(tracking.starts_with("TRK-"));
        assert_eq!(tracking.len(), 14);
        assert_eq!(tracking, tracking.to_uppercase());
        let view = read_model.get(&order_id).unwrap();
        assert_eq!(view.status, OrderStatus::Shipped);
        assert_eq!(view.tracking_number.as_deref(), Some(tracking));
    }

    #[tokio::test]
    async fn test_rule_violation_becomes_rejected_result() {
        // Arrange
        let store = InMemoryEventStore::default();
        let read_model = OrdersReadModel::new();
        let clock = FixedClock::at_default();
        let order_id = create(&store, &read_model, &clock).await;
        handle_cancel_order(
            &CancelOrder::new(&order_id, "customer request", &clock),
            &clock,
            &store,
            &read_model,
        )
        .await
        .unwrap();

        // Act
        let result = handle_ship_order(&ShipOrder::new(&order_id, &clock), &clock, &store, &read_model)
            .await
            .unwrap();

        // Assert
        assert_eq!(
            result,
            CommandResult::rejected("Cannot ship a cancelled order")
        );
        assert_eq!(store.current_version(&order_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_order_is_an_error() {
        let store = InMemoryEventStore::default();
        let read_model = OrdersReadModel::new();
        let clock = FixedClock::at_default();

        let result = handle_deliver_order(
            &DeliverOrder::new("order-missing", &clock),
            &clock,
            &store,
            &read_model,
        )
        .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(id)) if id == "order-missing"));
        assert!(read_model.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let read_model = OrdersReadModel::new();
        let clock = FixedClock::at_default();
        let command = CreateOrder::new("user-1", "Widget", 1, 1.0, &clock);

        let result = handle_create_order(&command, &clock, &FailingEventStore, &read_model).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_registered_handlers_run_through_the_bus() {
        // Arrange
        let bus = CommandBus::default();
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::default());
        let read_model = Arc::new(OrdersReadModel::new());
        let clock: SharedClock = Arc::new(FixedClock::at_default());
        register_command_handlers(&bus, &store, &read_model, &clock);

        // Act
        let created = bus
            .dispatch(CreateOrder::new("user-1", "Gizmo", 1, 15.0, clock.as_ref()))
            .await;
        let order_id = created.data().unwrap()["order_id"].as_str().unwrap().to_owned();
        let confirmed = bus
            .dispatch(ConfirmOrder::new(&order_id, Some("pay-1".into()), clock.as_ref()))
            .await;
        let missing = bus
            .dispatch(ShipOrder::new("order-none", clock.as_ref()))
            .await;

        // Assert
        assert_eq!(bus.handler_count(), 5);
        assert!(confirmed.success());
        assert_eq!(
            read_model.get(&order_id).unwrap().payment_id.as_deref(),
            Some("pay-1")
        );
        assert_eq!(missing.error(), Some("aggregate not found: order-none"));
    }
}
