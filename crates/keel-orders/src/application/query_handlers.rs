//! Query handlers for the Orders context, served from the read model.

use std::sync::Arc;

use keel_core::error::DomainError;
use keel_cqrs::{QueryBus, QueryResult};
use serde_json::json;

use super::read_model::OrdersReadModel;
use crate::domain::queries::{GetOrder, ListOrders};

fn to_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(value)
        .map_err(|e| DomainError::Infrastructure(format!("view serialization failed: {e}")))
}

/// Handles `GetOrder`. An unknown order is a not-found result.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the view cannot be serialized.
pub fn handle_get_order(
    query: &GetOrder,
    read_model: &OrdersReadModel,
) -> Result<QueryResult, DomainError> {
    match read_model.get(&query.order_id) {
        Some(view) => Ok(QueryResult::ok(to_value(&view)?)),
        None => Ok(QueryResult::not_found()),
    }
}

/// Handles `ListOrders`, returning `{orders, total}`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a view cannot be serialized.
pub fn handle_list_orders(
    query: &ListOrders,
    read_model: &OrdersReadModel,
) -> Result<QueryResult, DomainError> {
    let orders = read_model.list(query.status);
    let total = orders.len();
    Ok(QueryResult::ok(json!({
        "orders": to_value(&orders)?,
        "total": total,
    })))
}

/// Registers every Orders query handler on `bus`.
pub fn register_query_handlers(bus: &QueryBus, read_model: &Arc<OrdersReadModel>) {
    let model = Arc::clone(read_model);
    bus.register(move |query: GetOrder| {
        let result = handle_get_order(&query, &model);
        async move { result }
    });

    let model = Arc::clone(read_model);
    bus.register(move |query: ListOrders| {
        let result = handle_list_orders(&query, &model);
        async move { result }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_test_support::FixedClock;

    use crate::domain::aggregates::{Order, OrderStatus};
    use crate::domain::events::OrderCreated;

    fn seeded() -> Arc<OrdersReadModel> {
        let clock = FixedClock::at_default();
        let read_model = Arc::new(OrdersReadModel::new());
        for (id, product) in [("order-a", "Widget"), ("order-b", "Gadget")] {
            let mut order = Order::new(id);
            order
                .create(
                    OrderCreated {
                        user_id: "user-1".to_owned(),
                        product: product.to_owned(),
                        quantity: 1,
                        price: 10.0,
                    },
                    &clock,
                )
                .unwrap();
            if id == "order-b" {
                order.ship("TRK-1".to_owned(), &clock).unwrap();
            }
            read_model.upsert(order.view());
        }
        read_model
    }

    #[tokio::test]
    async fn test_get_order_found_and_missing() {
        // Arrange
        let clock = FixedClock::at_default();
        let bus = QueryBus::default();
        register_query_handlers(&bus, &seeded());

        // Act
        let hit = bus.execute(GetOrder::new("order-a", &clock)).await;
        let miss = bus.execute(GetOrder::new("order-z", &clock)).await;

        // Assert
        assert!(hit.found());
        assert_eq!(hit.data().unwrap()["product"], json!("Widget"));
        assert!(!miss.found());
        assert!(miss.error().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_with_status_filter() {
        // Arrange
        let clock = FixedClock::at_default();
        let bus = QueryBus::default();
        register_query_handlers(&bus, &seeded());

        // Act
        let all = bus.execute(ListOrders::new(None, &clock)).await;
        let shipped = bus
            .execute(ListOrders::new(Some(OrderStatus::Shipped), &clock))
            .await;

        // Assert
        assert_eq!(all.data().unwrap()["total"], json!(2));
        let shipped = shipped.into_data().unwrap();
        assert_eq!(shipped["total"], json!(1));
        assert_eq!(shipped["orders"][0]["order_id"], json!("order-b"));
    }
}
