//! Command definitions for the Orders context.

use chrono::{DateTime, Utc};
use keel_core::clock::Clock;
use keel_cqrs::{Command, Envelope, ValidationError};
use uuid::Uuid;

macro_rules! impl_command {
    ($command:ty, $tag:literal) => {
        impl Command for $command {
            const COMMAND_TYPE: &'static str = $tag;

            fn id(&self) -> Uuid {
                self.envelope.id
            }

            fn timestamp(&self) -> DateTime<Utc> {
                self.envelope.timestamp
            }

            fn validate(&self) -> Result<(), ValidationError> {
                self.check()
            }
        }
    };
}

fn require_order_id(order_id: &str) -> Result<(), ValidationError> {
    if order_id.trim().is_empty() {
        return Err(ValidationError::required("order_id"));
    }
    Ok(())
}

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// Command identity.
    pub envelope: Envelope,
    /// Order identifier; generated by the handler when absent.
    pub order_id: Option<String>,
    /// The ordering user.
    pub user_id: String,
    /// Product name.
    pub product: String,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
}

impl CreateOrder {
    /// Creates the command with a generated envelope.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        product: impl Into<String>,
        quantity: u32,
        price: f64,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            envelope: Envelope::new(clock),
            order_id: None,
            user_id: user_id.into(),
            product: product.into(),
            quantity,
            price,
        }
    }

    /// Pins the order identifier instead of generating one.
    #[must_use]
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    fn check(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::required("user_id"));
        }
        if self.product.trim().is_empty() {
            return Err(ValidationError::required("product"));
        }
        if self.quantity == 0 {
            return Err(ValidationError::new("quantity must be positive"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::new("price must be a non-negative amount"));
        }
        Ok(())
    }
}

impl_command!(CreateOrder, "CreateOrder");

/// Command to confirm payment for an order.
#[derive(Debug, Clone)]
pub struct ConfirmOrder {
    /// Command identity.
    pub envelope: Envelope,
    /// Target order.
    pub order_id: String,
    /// The settling payment, if any.
    pub payment_id: Option<String>,
}

impl ConfirmOrder {
    /// Creates the command with a generated envelope.
    #[must_use]
    pub fn new(order_id: impl Into<String>, payment_id: Option<String>, clock: &dyn Clock) -> Self {
        Self {
            envelope: Envelope::new(clock),
            order_id: order_id.into(),
            payment_id,
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_order_id(&self.order_id)
    }
}

impl_command!(ConfirmOrder, "ConfirmOrder");

/// Command to ship an order.
#[derive(Debug, Clone)]
pub struct ShipOrder {
    /// Command identity.
    pub envelope: Envelope,
    /// Target order.
    pub order_id: String,
}

impl ShipOrder {
    /// Creates the command with a generated envelope.
    #[must_use]
    pub fn new(order_id: impl Into<String>, clock: &dyn Clock) -> Self {
        Self {
            envelope: Envelope::new(clock),
            order_id: order_id.into(),
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_order_id(&self.order_id)
    }
}

impl_command!(ShipOrder, "ShipOrder");

/// Command to mark an order delivered.
#[derive(Debug, Clone)]
pub struct DeliverOrder {
    /// Command identity.
    pub envelope: Envelope,
    /// Target order.
    pub order_id: String,
}

impl DeliverOrder {
    /// Creates the command with a generated envelope.
    #[must_use]
    pub fn new(order_id: impl Into<String>, clock: &dyn Clock) -> Self {
        Self {
            envelope: Envelope::new(clock),
            order_id: order_id.into(),
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_order_id(&self.order_id)
    }
}

impl_command!(DeliverOrder, "DeliverOrder");

/// Command to cancel an order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    /// Command identity.
    pub envelope: Envelope,
    /// Target order.
    pub order_id: String,
    /// Why the order is cancelled.
    pub reason: String,
}

impl CancelOrder {
    /// Creates the command with a generated envelope.
    #[must_use]
    pub fn new(order_id: impl Into<String>, reason: impl Into<String>, clock: &dyn Clock) -> Self {
        Self {
            envelope: Envelope::new(clock),
            order_id: order_id.into(),
            reason: reason.into(),
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        require_order_id(&self.order_id)
    }
}

impl_command!(CancelOrder, "CancelOrder");

#[cfg(test)]
mod tests {
    use super::*;
    use keel_test_support::FixedClock;

    #[test]
    fn test_create_order_validation() {
        let clock = FixedClock::at_default();
        let valid = CreateOrder::new("user-1", "Widget", 2, 9.5, &clock);

        assert!(valid.validate().is_ok());
        assert_eq!(
            CreateOrder::new("user-1", "", 2, 9.5, &clock)
                .validate()
                .unwrap_err()
                .message(),
            "product required"
        );
        assert_eq!(
            CreateOrder::new("", "Widget", 2, 9.5, &clock)
                .validate()
                .unwrap_err()
                .message(),
            "user_id required"
        );
        assert!(CreateOrder::new("user-1", "Widget", 0, 9.5, &clock)
            .validate()
            .is_err());
        assert!(CreateOrder::new("user-1", "Widget", 1, -1.0, &clock)
            .validate()
            .is_err());
        assert!(CreateOrder::new("user-1", "Widget", 1, f64::NAN, &clock)
            .validate()
            .is_err());
    }

    #[test]
    fn test_order_id_is_required() {
        let clock = FixedClock::at_default();

        assert_eq!(
            ShipOrder::new(" ", &clock).validate().unwrap_err().message(),
            "order_id required"
        );
        assert!(CancelOrder::new("", "r", &clock).validate().is_err());
        assert!(ConfirmOrder::new("", None, &clock).validate().is_err());
        assert!(DeliverOrder::new("order-1", &clock).validate().is_ok());
    }

    #[test]
    fn test_command_type_tags() {
        assert_eq!(CreateOrder::COMMAND_TYPE, "CreateOrder");
        assert_eq!(ShipOrder::COMMAND_TYPE, "ShipOrder");
        assert_eq!(CancelOrder::COMMAND_TYPE, "CancelOrder");
    }

    #[test]
    fn test_envelope_stamped_from_clock() {
        let clock = FixedClock::at_default();

        let command = ShipOrder::new("order-1", &clock);

        assert_eq!(command.timestamp(), clock.0);
        assert_eq!(command.id(), command.envelope.id);
    }
}
