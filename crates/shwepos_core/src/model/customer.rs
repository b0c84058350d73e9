//! Customer model with loyalty balance.
//!
//! # Invariants
//! - `loyalty_points` and `total_purchases` are never negative.

use super::{require_non_negative, require_text, Kyat, ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: RecordId,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    /// Lifetime spend net of refunds.
    pub total_purchases: Kyat,
    /// Epoch milliseconds of the latest sale.
    pub last_purchase: Option<i64>,
    pub loyalty_points: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCustomer {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
}

impl Customer {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("customer_name", &self.customer_name)?;
        require_text("customer_phone", &self.customer_phone)?;
        require_non_negative("total_purchases", self.total_purchases)?;
        require_non_negative("loyalty_points", self.loyalty_points)?;
        Ok(())
    }
}
