//! Query definitions for the Orders context.

use chrono::{DateTime, Utc};
use keel_core::clock::Clock;
use keel_cqrs::{Envelope, Query};
use uuid::Uuid;

use super::aggregates::OrderStatus;

/// Fetches one order from the read model.
#[derive(Debug, Clone)]
pub struct GetOrder {
    /// Query identity.
    pub envelope: Envelope,
    /// Target order.
    pub order_id: String,
}

impl GetOrder {
    /// Creates the query with a generated envelope.
    #[must_use]
    pub fn new(order_id: impl Into<String>, clock: &dyn Clock) -> Self {
        Self {
            envelope: Envelope::new(clock),
            order_id: order_id.into(),
        }
    }
}

impl Query for GetOrder {
    const QUERY_TYPE: &'static str = "GetOrder";

    fn id(&self) -> Uuid {
        self.envelope.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.envelope.timestamp
    }
}

/// Lists orders, optionally filtered by status.
#[derive(Debug, Clone)]
pub struct ListOrders {
    /// Query identity.
    pub envelope: Envelope,
    /// Only orders in this status, when set.
    pub status: Option<OrderStatus>,
}

impl ListOrders {
    /// Creates the query with a generated envelope.
    #[must_use]
    pub fn new(status: Option<OrderStatus>, clock: &dyn Clock) -> Self {
        Self {
            envelope: Envelope::new(clock),
            status,
        }
    }
}

impl Query for ListOrders {
    const QUERY_TYPE: &'static str = "ListOrders";

    fn id(&self) -> Uuid {
        self.envelope.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.envelope.timestamp
    }
}
