//! Aggregate roots for the Orders context.

use std::fmt;
use std::sync::{Arc, LazyLock};

use keel_core::aggregate::{Aggregate, AggregateRoot, EventHandlers};
use keel_core::clock::Clock;
use keel_core::error::DomainError;
use keel_core::event::Event;
use keel_core::snapshot::Snapshot;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::events::{
    ORDER_CANCELLED_EVENT_TYPE, ORDER_CONFIRMED_EVENT_TYPE, ORDER_CREATED_EVENT_TYPE,
    ORDER_DELIVERED_EVENT_TYPE, ORDER_SHIPPED_EVENT_TYPE, OrderCancelled, OrderConfirmed,
    OrderCreated, OrderDelivered, OrderEventKind, OrderShipped,
};

/// Lifecycle of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// No `OrderCreated` event seen yet.
    #[default]
    New,
    /// Placed, awaiting confirmation.
    Created,
    /// Payment confirmed.
    Confirmed,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Returns the lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Created => "created",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State folded from an order's events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    /// The ordering user.
    pub user_id: Option<String>,
    /// Product name.
    pub product: Option<String>,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Settling payment.
    pub payment_id: Option<String>,
    /// Carrier tracking number, once shipped.
    pub tracking_number: Option<String>,
    /// Cancellation reason, once cancelled.
    pub cancelled_reason: Option<String>,
}

fn decode<T: DeserializeOwned>(event: &Event) -> Option<T> {
    match serde_json::from_value(Value::Object(event.data.clone())) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(
                event_type = %event.event_type,
                aggregate_id = %event.aggregate_id,
                error = %e,
                "malformed order event payload; state unchanged"
            );
            None
        }
    }
}

fn on_order_created(state: &mut OrderState, event: &Event) {
    if let Some(created) = decode::<OrderCreated>(event) {
        state.user_id = Some(created.user_id);
        state.product = Some(created.product);
        state.quantity = created.quantity;
        state.price = created.price;
        state.status = OrderStatus::Created;
    }
}

fn on_order_confirmed(state: &mut OrderState, event: &Event) {
    if let Some(confirmed) = decode::<OrderConfirmed>(event) {
        state.payment_id = confirmed.payment_id;
        state.status = OrderStatus::Confirmed;
    }
}

fn on_order_shipped(state: &mut OrderState, event: &Event) {
    if let Some(shipped) = decode::<OrderShipped>(event) {
        state.tracking_number = Some(shipped.tracking_number);
        state.status = OrderStatus::Shipped;
    }
}

fn on_order_delivered(state: &mut OrderState, _event: &Event) {
    state.status = OrderStatus::Delivered;
}

fn on_order_cancelled(state: &mut OrderState, event: &Event) {
    let reason = decode::<OrderCancelled>(event)
        .map_or_else(|| "No reason provided".to_owned(), |c| c.reason);
    state.cancelled_reason = Some(reason);
    state.status = OrderStatus::Cancelled;
}

static ORDER_HANDLERS: LazyLock<Arc<EventHandlers<OrderState>>> = LazyLock::new(|| {
    Arc::new(
        EventHandlers::new()
            .on(ORDER_CREATED_EVENT_TYPE, on_order_created)
            .on(ORDER_CONFIRMED_EVENT_TYPE, on_order_confirmed)
            .on(ORDER_SHIPPED_EVENT_TYPE, on_order_shipped)
            .on(ORDER_DELIVERED_EVENT_TYPE, on_order_delivered)
            .on(ORDER_CANCELLED_EVENT_TYPE, on_order_cancelled),
    )
});

/// Read-only view of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    /// The order identifier.
    pub order_id: String,
    /// The ordering user.
    pub user_id: Option<String>,
    /// Product name.
    pub product: Option<String>,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
    /// `price * quantity`, rounded to cents.
    pub total: f64,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Settling payment.
    pub payment_id: Option<String>,
    /// Carrier tracking number.
    pub tracking_number: Option<String>,
    /// Cancellation reason.
    pub cancelled_reason: Option<String>,
    /// Aggregate version.
    pub version: i64,
}

/// Rounds a monetary amount to cents.
#[must_use]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// The aggregate root for an order.
#[derive(Debug)]
pub struct Order {
    inner: Aggregate<OrderState>,
}

impl Order {
    /// Creates an empty order with the given identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Aggregate::new(id, Arc::clone(&ORDER_HANDLERS)),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &OrderState {
        self.inner.state()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> OrderStatus {
        self.state().status
    }

    /// Returns `true` once the order has been placed.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.status() != OrderStatus::New
    }

    /// Places the order, producing an `OrderCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the order was already placed.
    pub fn create(&mut self, details: OrderCreated, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.exists() {
            return Err(DomainError::Validation(format!(
                "Order {} already exists",
                self.aggregate_id()
            )));
        }
        self.record(&OrderEventKind::Created(details), clock)
    }

    /// Confirms the order, producing an `OrderConfirmed` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` unless the order is awaiting
    /// confirmation.
    pub fn confirm(
        &mut self,
        payment_id: Option<String>,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status() != OrderStatus::Created {
            return Err(DomainError::Validation(format!(
                "Cannot confirm an order that is {}",
                self.status()
            )));
        }
        self.record(
            &OrderEventKind::Confirmed(OrderConfirmed { payment_id }),
            clock,
        )
    }

    /// Ships the order, producing an `OrderShipped` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the order is cancelled or has
    /// already shipped.
    pub fn ship(&mut self, tracking_number: String, clock: &dyn Clock) -> Result<(), DomainError> {
        match self.status() {
            OrderStatus::Cancelled => Err(DomainError::Validation(
                "Cannot ship a cancelled order".to_owned(),
            )),
            OrderStatus::Shipped | OrderStatus::Delivered => {
                Err(DomainError::Validation("Order already shipped".to_owned()))
            }
            OrderStatus::New => Err(DomainError::AggregateNotFound(
                self.aggregate_id().to_owned(),
            )),
            OrderStatus::Created | OrderStatus::Confirmed => self.record(
                &OrderEventKind::Shipped(OrderShipped { tracking_number }),
                clock,
            ),
        }
    }

    /// Marks the order delivered, producing an `OrderDelivered` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` unless the order has shipped.
    pub fn deliver(&mut self, clock: &dyn Clock) -> Result<(), DomainError> {
        match self.status() {
            OrderStatus::Shipped => {
                self.record(&OrderEventKind::Delivered(OrderDelivered {}), clock)
            }
            OrderStatus::Delivered => {
                Err(DomainError::Validation("Order already delivered".to_owned()))
            }
            OrderStatus::New => Err(DomainError::AggregateNotFound(
                self.aggregate_id().to_owned(),
            )),
            other => Err(DomainError::Validation(format!(
                "Cannot deliver an order that is {other}"
            ))),
        }
    }

    /// Cancels the order, producing an `OrderCancelled` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the order has shipped or is
    /// already cancelled.
    pub fn cancel(&mut self, reason: String, clock: &dyn Clock) -> Result<(), DomainError> {
        match self.status() {
            OrderStatus::Shipped | OrderStatus::Delivered => Err(DomainError::Validation(
                "Cannot cancel an order that has been shipped".to_owned(),
            )),
            OrderStatus::Cancelled => Err(DomainError::Validation(
                "Order is already cancelled".to_owned(),
            )),
            OrderStatus::New => Err(DomainError::AggregateNotFound(
                self.aggregate_id().to_owned(),
            )),
            OrderStatus::Created | OrderStatus::Confirmed => self.record(
                &OrderEventKind::Cancelled(OrderCancelled { reason }),
                clock,
            ),
        }
    }

    /// Builds the read-model view of the order.
    #[must_use]
    pub fn view(&self) -> OrderView {
        let state = self.state();
        OrderView {
            order_id: self.aggregate_id().to_owned(),
            user_id: state.user_id.clone(),
            product: state.product.clone(),
            quantity: state.quantity,
            price: state.price,
            total: round_cents(state.price * f64::from(state.quantity)),
            status: state.status,
            payment_id: state.payment_id.clone(),
            tracking_number: state.tracking_number.clone(),
            cancelled_reason: state.cancelled_reason.clone(),
            version: self.version(),
        }
    }

    fn record(&mut self, kind: &OrderEventKind, clock: &dyn Clock) -> Result<(), DomainError> {
        let event = kind.to_event(self.aggregate_id(), clock)?;
        self.inner.apply(event);
        Ok(())
    }
}

impl AggregateRoot for Order {
    fn aggregate_id(&self) -> &str {
        self.inner.aggregate_id()
    }

    fn version(&self) -> i64 {
        self.inner.version()
    }

    fn apply(&mut self, event: Event) {
        self.inner.apply(event);
    }

    fn load_from_events(&mut self, events: &[Event]) {
        self.inner.load_from_events(events);
    }

    fn replay(&mut self, events: &[Event]) {
        self.inner.replay(events);
    }

    fn uncommitted_events(&self) -> &[Event] {
        self.inner.uncommitted_events()
    }

    fn clear_uncommitted_events(&mut self) {
        self.inner.clear_uncommitted_events();
    }

    fn snapshot(&self, clock: &dyn Clock) -> Result<Snapshot, DomainError> {
        self.inner.snapshot(clock)
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), DomainError> {
        self.inner.restore_snapshot(snapshot)
    }
}
