//! Store-wide settings shown on receipts and used at checkout.

use super::{require_text, ModelValidationError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAX_RATE_BPS: u32 = 500;
/// Myanmar Standard Time, UTC+06:30.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 390;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub store_name: String,
    pub store_address: String,
    pub store_phone: String,
    pub receipt_footer: String,
    /// Sales tax in basis points (500 = 5%).
    pub tax_rate_bps: u32,
    /// Offset used for "today", "this week" and "this month" reporting.
    pub utc_offset_minutes: i32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Myanmar Shop".to_string(),
            store_address: "Yangon, Myanmar".to_string(),
            store_phone: "09-123-456-789".to_string(),
            receipt_footer: "ဝယ်ယူအားပေးမှုအတွက် ကျေးဇူးတင်ပါသည်".to_string(),
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl StoreSettings {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("store_name", &self.store_name)?;
        if self.tax_rate_bps > 10_000 {
            return Err(ModelValidationError::TaxRateOutOfRange(self.tax_rate_bps));
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ModelValidationError::UtcOffsetOutOfRange(
                self.utc_offset_minutes,
            ));
        }
        Ok(())
    }
}
