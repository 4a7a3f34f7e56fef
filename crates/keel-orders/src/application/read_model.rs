//! In-memory projection of orders, kept current by the command handlers.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{PoisonError, RwLock};

use crate::domain::aggregates::{OrderStatus, OrderView};

/// Order views keyed by order id.
#[derive(Debug, Default)]
pub struct OrdersReadModel {
    orders: RwLock<BTreeMap<String, OrderView>>,
}

impl OrdersReadModel {
    /// Creates an empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the view for its order. A view older than the
    /// stored one is ignored, so out-of-order commits never regress it.
    pub fn upsert(&self, view: OrderView) {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        match orders.entry(view.order_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(view);
            }
            Entry::Occupied(mut slot) => {
                if slot.get().version < view.version {
                    slot.insert(view);
                }
            }
        }
    }

    /// Looks up one order.
    #[must_use]
    pub fn get(&self, order_id: &str) -> Option<OrderView> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_id)
            .cloned()
    }

    /// Orders sorted by id, restricted to `status` when given.
    #[must_use]
    pub fn list(&self, status: Option<OrderStatus>) -> Vec<OrderView> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|view| status.is_none_or(|wanted| view.status == wanted))
            .cloned()
            .collect()
    }

    /// Number of projected orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been projected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
