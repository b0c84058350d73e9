//! Sale and return transactions.
//!
//! # Responsibility
//! - Capture an immutable snapshot of what was sold or refunded.
//!
//! # Invariants
//! - Lines keep the unit price at the time of sale; later price edits do not
//!   rewrite history.
//! - Return transactions carry negative `total_amount`/`paid_amount` and
//!   reference the original sale.

use super::{Kyat, ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    BankTransfer,
    /// Refund booked by a return transaction.
    Return,
}

impl PaymentMethod {
    /// Methods a cashier can pick at checkout.
    pub const TENDER: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::MobileMoney,
        PaymentMethod::BankTransfer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Return => "return",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "mobile_money" => Some(PaymentMethod::MobileMoney),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "return" => Some(PaymentMethod::Return),
            _ => None,
        }
    }
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Return => "return",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sale" => Some(TransactionKind::Sale),
            "return" => Some(TransactionKind::Return),
            _ => None,
        }
    }
}

/// One product row of a sale or return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLine {
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    /// Unit price at time of sale.
    pub price: Kyat,
    pub subtotal: Kyat,
}

impl TransactionLine {
    pub fn new(
        product_code: impl Into<String>,
        product_name: impl Into<String>,
        quantity: i64,
        price: Kyat,
    ) -> Self {
        Self {
            product_code: product_code.into(),
            product_name: product_name.into(),
            quantity,
            price,
            subtotal: price * quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: RecordId,
    pub kind: TransactionKind,
    /// Human-facing number printed on receipts (`TXN-…` / `RTN-…`).
    pub transaction_number: String,
    pub original_transaction_id: Option<RecordId>,
    pub transaction_date: i64,
    pub lines: Vec<TransactionLine>,
    pub total_amount: Kyat,
    pub paid_amount: Kyat,
    pub change_amount: Kyat,
    pub discount: Kyat,
    pub tax: Kyat,
    pub payment_method: PaymentMethod,
    pub cashier: String,
    pub customer_id: Option<RecordId>,
    pub return_reason: Option<String>,
    pub restocked: bool,
    pub created_at: i64,
}

impl Transaction {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.lines.is_empty() {
            return Err(ModelValidationError::EmptyTransaction);
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(ModelValidationError::NonPositiveQuantity {
                    product_code: line.product_code.clone(),
                });
            }
            if line.subtotal != line.price * line.quantity {
                return Err(ModelValidationError::LineSubtotalMismatch {
                    product_code: line.product_code.clone(),
                });
            }
        }
        super::require_text("transaction_number", &self.transaction_number)?;
        super::require_text("cashier", &self.cashier)?;
        Ok(())
    }

    pub fn is_sale(&self) -> bool {
        self.kind == TransactionKind::Sale
    }

    pub fn is_return(&self) -> bool {
        self.kind == TransactionKind::Return
    }

    /// Sum of line subtotals before discount and tax.
    pub fn lines_subtotal(&self) -> Kyat {
        self.lines.iter().map(|line| line.subtotal).sum()
    }

    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}
