//! In-memory sale in progress.
//!
//! # Responsibility
//! - Hold cart lines keyed by product code, the discount and the customer.
//! - Enforce per-line stock limits against the product snapshot it was given.
//!
//! # Invariants
//! - Every line quantity is in `1..=available`.
//! - `discount` is never negative and never above `subtotal()`.

use crate::model::product::Product;
use crate::model::transaction::TransactionLine;
use crate::model::{Kyat, RecordId};
use crate::repo::transaction_repo::StockDecrement;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Cart mutation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The line already holds all available stock, or there is none.
    OutOfStock {
        product_code: String,
        available: i64,
    },
    InsufficientStock {
        product_code: String,
        requested: i64,
        available: i64,
    },
    NegativeDiscount(Kyat),
    DiscountExceedsSubtotal {
        discount: Kyat,
        subtotal: Kyat,
    },
    LineNotFound(String),
}

impl Display for CartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfStock {
                product_code,
                available,
            } => write!(f, "`{product_code}` is out of stock (available {available})"),
            Self::InsufficientStock {
                product_code,
                requested,
                available,
            } => write!(
                f,
                "only {available} of `{product_code}` in stock, requested {requested}"
            ),
            Self::NegativeDiscount(amount) => write!(f, "discount must not be negative: {amount}"),
            Self::DiscountExceedsSubtotal { discount, subtotal } => write!(
                f,
                "discount {discount} exceeds subtotal {subtotal}"
            ),
            Self::LineNotFound(code) => write!(f, "no cart line for `{code}`"),
        }
    }
}

impl Error for CartError {}

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: RecordId,
    pub product_code: String,
    pub product_name: String,
    /// Unit price captured when the line was last touched.
    pub price: Kyat,
    pub quantity: i64,
    /// Stock on hand at the time the line was last touched.
    pub available: i64,
}

impl CartLine {
    pub fn subtotal(&self) -> Kyat {
        self.price * self.quantity
    }

    fn refresh_from(&mut self, product: &Product) {
        self.product_name = product.product_name.clone();
        self.price = product.price;
        self.available = product.quantity;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
    discount: Kyat,
    customer_id: Option<RecordId>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one unit of `product`, creating the line on first add.
    pub fn add_product(&mut self, product: &Product) -> Result<(), CartError> {
        let in_cart = self
            .line(&product.product_code)
            .map(|line| line.quantity)
            .unwrap_or(0);
        if product.quantity <= 0 || in_cart >= product.quantity {
            return Err(CartError::OutOfStock {
                product_code: product.product_code.clone(),
                available: product.quantity.max(0),
            });
        }

        match self.line_mut(&product.product_code) {
            Some(line) => {
                line.refresh_from(product);
                line.quantity += 1;
            }
            None => self.lines.push(CartLine {
                product_id: product.id,
                product_code: product.product_code.clone(),
                product_name: product.product_name.clone(),
                price: product.price,
                quantity: 1,
                available: product.quantity,
            }),
        }
        Ok(())
    }

    /// Sets a line quantity; `quantity <= 0` removes the line.
    pub fn set_quantity(&mut self, product: &Product, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            self.lines
                .retain(|line| line.product_code != product.product_code);
            self.clamp_discount();
            return Ok(());
        }
        if quantity > product.quantity {
            return Err(CartError::InsufficientStock {
                product_code: product.product_code.clone(),
                requested: quantity,
                available: product.quantity.max(0),
            });
        }

        match self.line_mut(&product.product_code) {
            Some(line) => {
                line.refresh_from(product);
                line.quantity = quantity;
            }
            None => self.lines.push(CartLine {
                product_id: product.id,
                product_code: product.product_code.clone(),
                product_name: product.product_name.clone(),
                price: product.price,
                quantity,
                available: product.quantity,
            }),
        }
        self.clamp_discount();
        Ok(())
    }

    pub fn remove(&mut self, product_code: &str) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_code != product_code);
        if self.lines.len() == before {
            return Err(CartError::LineNotFound(product_code.to_string()));
        }
        self.clamp_discount();
        Ok(())
    }

    /// Empties the cart and resets discount and customer.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.discount = 0;
        self.customer_id = None;
    }

    pub fn apply_discount(&mut self, amount: Kyat) -> Result<(), CartError> {
        if amount < 0 {
            return Err(CartError::NegativeDiscount(amount));
        }
        let subtotal = self.subtotal();
        if amount > subtotal {
            return Err(CartError::DiscountExceedsSubtotal {
                discount: amount,
                subtotal,
            });
        }
        self.discount = amount;
        Ok(())
    }

    pub fn select_customer(&mut self, customer_id: Option<RecordId>) {
        self.customer_id = customer_id;
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_code: &str) -> Option<&CartLine> {
        self.lines
            .iter()
            .find(|line| line.product_code == product_code)
    }

    pub fn discount(&self) -> Kyat {
        self.discount
    }

    pub fn customer_id(&self) -> Option<RecordId> {
        self.customer_id
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Kyat {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    pub(crate) fn transaction_lines(&self) -> Vec<TransactionLine> {
        self.lines
            .iter()
            .map(|line| {
                TransactionLine::new(
                    line.product_code.as_str(),
                    line.product_name.as_str(),
                    line.quantity,
                    line.price,
                )
            })
            .collect()
    }

    pub(crate) fn stock_decrements(&self) -> Vec<StockDecrement> {
        self.lines
            .iter()
            .map(|line| StockDecrement {
                product_id: line.product_id,
                product_code: line.product_code.clone(),
                quantity: line.quantity,
            })
            .collect()
    }

    fn line_mut(&mut self, product_code: &str) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product_code == product_code)
    }

    // Shrinking the cart can leave a discount above the new subtotal.
    fn clamp_discount(&mut self) {
        self.discount = self.discount.min(self.subtotal());
    }
}
