//! Stock levels consulted by the placement saga.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

/// Stock reservation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// The product is not stocked.
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// Not enough units on hand.
    #[error("Insufficient inventory for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Requested product.
        product: String,
        /// Units requested.
        requested: u32,
        /// Units on hand.
        available: u32,
    },
}

/// Units on hand per product.
#[derive(Debug)]
pub struct Inventory {
    levels: Mutex<BTreeMap<String, u32>>,
}

impl Inventory {
    /// Creates an inventory with the given stock levels.
    #[must_use]
    pub fn with_stock<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            levels: Mutex::new(
                levels
                    .into_iter()
                    .map(|(product, units)| (product.into(), units))
                    .collect(),
            ),
        }
    }

    /// The demo catalog: 100 Widgets, 50 Gadgets, 25 Gizmos.
    #[must_use]
    pub fn default_catalog() -> Self {
        Self::with_stock([("Widget", 100), ("Gadget", 50), ("Gizmo", 25)])
    }

    /// Takes `quantity` units of `product` out of stock.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError` if the product is unknown or short.
    pub fn reserve(&self, product: &str, quantity: u32) -> Result<u32, InventoryError> {
        let mut levels = self.lock();
        let available = levels
            .get_mut(product)
            .ok_or_else(|| InventoryError::UnknownProduct(product.to_owned()))?;
        if *available < quantity {
            return Err(InventoryError::InsufficientStock {
                product: product.to_owned(),
                requested: quantity,
                available: *available,
            });
        }
        *available -= quantity;
        debug!(product, quantity, remaining = *available, "inventory reserved");
        Ok(*available)
    }

    /// Returns `quantity` units of `product` to stock.
    pub fn release(&self, product: &str, quantity: u32) {
        let mut levels = self.lock();
        match levels.get_mut(product) {
            Some(available) => {
                *available = available.saturating_add(quantity);
                debug!(product, quantity, remaining = *available, "inventory released");
            }
            None => warn!(product, quantity, "release for unknown product ignored"),
        }
    }

    /// Units on hand, if the product is stocked.
    #[must_use]
    pub fn available(&self, product: &str) -> Option<u32> {
        self.lock().get(product).copied()
    }

    /// Snapshot of every stock level.
    #[must_use]
    pub fn levels(&self) -> BTreeMap<String, u32> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, u32>> {
        self.levels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::default_catalog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        // Arrange
        let inventory = Inventory::default_catalog();

        // Act
        let remaining = inventory.reserve("Widget", 30).unwrap();
        inventory.release("Widget", 10);

        // Assert
        assert_eq!(remaining, 70);
        assert_eq!(inventory.available("Widget"), Some(80));
    }

    #[test]
    fn test_reserve_more_than_available_leaves_stock_untouched() {
        let inventory = Inventory::default_catalog();

        let error = inventory.reserve("Gizmo", 26).unwrap_err();

        assert_eq!(
            error.to_string(),
            "Insufficient inventory for Gizmo: requested 26, available 25"
        );
        assert_eq!(inventory.available("Gizmo"), Some(25));
    }

    #[test]
    fn test_unknown_product() {
        let inventory = Inventory::with_stock([("Widget", 1)]);

        assert_eq!(
            inventory.reserve("Sprocket", 1),
            Err(InventoryError::UnknownProduct("Sprocket".to_owned()))
        );
        inventory.release("Sprocket", 1);
        assert_eq!(inventory.levels().len(), 1);
    }
}
