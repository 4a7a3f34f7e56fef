//! Domain events for the Orders context.

use keel_core::clock::Clock;
use keel_core::error::DomainError;
use keel_core::event::Event;
use serde::{Deserialize, Serialize};

/// Event type tag for [`OrderCreated`].
pub const ORDER_CREATED_EVENT_TYPE: &str = "OrderCreated";
/// Event type tag for [`OrderConfirmed`].
pub const ORDER_CONFIRMED_EVENT_TYPE: &str = "OrderConfirmed";
/// Event type tag for [`OrderShipped`].
pub const ORDER_SHIPPED_EVENT_TYPE: &str = "OrderShipped";
/// Event type tag for [`OrderDelivered`].
pub const ORDER_DELIVERED_EVENT_TYPE: &str = "OrderDelivered";
/// Event type tag for [`OrderCancelled`].
pub const ORDER_CANCELLED_EVENT_TYPE: &str = "OrderCancelled";

/// Emitted when an order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    /// The ordering user.
    pub user_id: String,
    /// Product name.
    pub product: String,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
}

/// Emitted when payment for an order is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    /// The settling payment, if known.
    pub payment_id: Option<String>,
}

/// Emitted when an order leaves the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipped {
    /// Carrier tracking number.
    pub tracking_number: String,
}

/// Emitted when an order reaches the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {}

/// Emitted when an order is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    /// Why the order was cancelled.
    pub reason: String,
}

/// Event payload variants for the Orders context.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEventKind {
    /// An order has been placed.
    Created(OrderCreated),
    /// An order has been confirmed.
    Confirmed(OrderConfirmed),
    /// An order has shipped.
    Shipped(OrderShipped),
    /// An order has been delivered.
    Delivered(OrderDelivered),
    /// An order has been cancelled.
    Cancelled(OrderCancelled),
}

impl OrderEventKind {
    /// Returns the event type tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => ORDER_CREATED_EVENT_TYPE,
            Self::Confirmed(_) => ORDER_CONFIRMED_EVENT_TYPE,
            Self::Shipped(_) => ORDER_SHIPPED_EVENT_TYPE,
            Self::Delivered(_) => ORDER_DELIVERED_EVENT_TYPE,
            Self::Cancelled(_) => ORDER_CANCELLED_EVENT_TYPE,
        }
    }

    /// Builds the generic event for `order_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be
    /// serialized.
    pub fn to_event(&self, order_id: &str, clock: &dyn Clock) -> Result<Event, DomainError> {
        let data = match self {
            Self::Created(payload) => serde_json::to_value(payload),
            Self::Confirmed(payload) => serde_json::to_value(payload),
            Self::Shipped(payload) => serde_json::to_value(payload),
            Self::Delivered(payload) => serde_json::to_value(payload),
            Self::Cancelled(payload) => serde_json::to_value(payload),
        }
        .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))?;
        Ok(Event::new(self.event_type(), data, clock)
            .for_aggregate(order_id)
            .with_metadata("source", "orders"))
    }
}
