//! Simulated payment processing used by the placement saga.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use keel_core::clock::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::aggregates::round_cents;

/// Payment failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    /// The amount is negative or not a number.
    #[error("invalid payment amount: {0}")]
    InvalidAmount(String),

    /// No payment with this id.
    #[error("payment not found: {0}")]
    NotFound(String),
}

/// Settlement state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Funds captured.
    Completed,
    /// Funds returned.
    Refunded,
}

/// A captured payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// `pay-<8 hex>` identifier.
    pub id: String,
    /// The paying user.
    pub user_id: String,
    /// Amount charged.
    pub amount: f64,
    /// Settlement state.
    pub status: PaymentStatus,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

/// Record of every payment taken.
#[derive(Debug, Default)]
pub struct PaymentLedger {
    payments: Mutex<BTreeMap<String, Payment>>,
}

impl PaymentLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges `amount` to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` for negative or non-finite
    /// amounts.
    pub fn charge(
        &self,
        user_id: &str,
        amount: f64,
        clock: &dyn Clock,
    ) -> Result<Payment, PaymentError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(PaymentError::InvalidAmount(amount.to_string()));
        }
        let simple = Uuid::new_v4().simple().to_string();
        let payment = Payment {
            id: format!("pay-{}", &simple[..8]),
            user_id: user_id.to_owned(),
            amount: round_cents(amount),
            status: PaymentStatus::Completed,
            timestamp: clock.now(),
        };
        self.lock().insert(payment.id.clone(), payment.clone());
        info!(payment_id = %payment.id, user_id, amount = payment.amount, "payment processed");
        Ok(payment)
    }

    /// Marks a payment refunded. Refunding twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotFound` for an unknown payment id.
    pub fn refund(&self, payment_id: &str) -> Result<Payment, PaymentError> {
        let mut payments = self.lock();
        let payment = payments
            .get_mut(payment_id)
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_owned()))?;
        if payment.status == PaymentStatus::Refunded {
            debug!(payment_id, "payment already refunded");
        } else {
            payment.status = PaymentStatus::Refunded;
            info!(payment_id, amount = payment.amount, "payment refunded");
        }
        Ok(payment.clone())
    }

    /// Looks up one payment.
    #[must_use]
    pub fn get(&self, payment_id: &str) -> Option<Payment> {
        self.lock().get(payment_id).cloned()
    }

    /// Every payment, sorted by id.
    #[must_use]
    pub fn list(&self) -> Vec<Payment> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Payment>> {
        self.payments.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_test_support::FixedClock;

    #[test]
    fn test_charge_records_completed_payment() {
        // Arrange
        let ledger = PaymentLedger::new();
        let clock = FixedClock::at_default();

        // Act
        let payment = ledger.charge("user-1", 59.98, &clock).unwrap();

        // Assert
        assert!(payment.id.starts_with("pay-"));
        assert_eq!(payment.id.len(), 12);
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.timestamp, clock.0);
        assert_eq!(ledger.get(&payment.id), Some(payment));
    }

    #[test]
    fn test_charge_rejects_invalid_amounts() {
        let ledger = PaymentLedger::new();
        let clock = FixedClock::at_default();

        assert!(ledger.charge("user-1", -1.0, &clock).is_err());
        assert!(ledger.charge("user-1", f64::INFINITY, &clock).is_err());
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn test_refund_is_idempotent() {
        let ledger = PaymentLedger::new();
        let clock = FixedClock::at_default();
        let payment = ledger.charge("user-1", 10.0, &clock).unwrap();

        ledger.refund(&payment.id).unwrap();
        let again = ledger.refund(&payment.id).unwrap();

        assert_eq!(again.status, PaymentStatus::Refunded);
        assert!(matches!(
            ledger.refund("pay-missing"),
            Err(PaymentError::NotFound(_))
        ));
    }
}
