//! Checkout orchestrator.
//!
//! Turns a user's cart into an order in one transaction:
//!
//! 1. lock and read the cart, recompute the total from current prices
//! 2. insert the order (`pending`)
//! 3. insert one item per line with the unit price captured now
//! 4. insert the delivery address
//! 5. insert the payment record
//! 6. delete the checked-out cart lines
//!
//! Any error before commit drops the transaction and rolls every step back.

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use brokeshop_core::{Price, ProductId, UserId, cart_total};

use crate::db::{self, RepositoryError};
use crate::models::{CheckoutReceipt, DeliveryAddress, PaymentDetails};

/// Largest value `customer_order.total` holds; same column type as a price.
pub const ORDER_TOTAL_LIMIT: Decimal = Price::MAX.amount();

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to check out.
    #[error("cart is empty")]
    EmptyCart,

    /// The order total does not fit the order ledger.
    #[error("order total exceeds {}", ORDER_TOTAL_LIMIT)]
    TotalTooLarge,

    /// A form field failed validation.
    #[error("{0}")]
    InvalidField(String),

    /// Store failure; nothing was written.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

/// Address and payment fields submitted with the checkout form.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub full_name: String,
    pub phone: String,
    pub country: String,
    pub city: String,
    pub street: String,
    pub building: String,
    pub apartment: String,
    pub postal_code: String,
    pub card_number: String,
    pub card_holder: String,
    pub expiry_date: String,
    pub cvv: String,
}

impl std::fmt::Debug for CheckoutForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutForm")
            .field("full_name", &self.full_name)
            .field("city", &self.city)
            .field("card_number", &"[REDACTED]")
            .field("cvv", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl CheckoutForm {
    /// Validate the form into a delivery address and payment details.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidField` naming the first bad field.
    pub fn validate(self) -> Result<(DeliveryAddress, PaymentDetails), CheckoutError> {
        let full_name = required(&self.full_name, "full name")?;
        let city = required(&self.city, "city")?;
        let street = required(&self.street, "street")?;
        let card_holder = required(&self.card_holder, "card holder")?;

        let card_number: String = self
            .card_number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if !(12..=19).contains(&card_number.len()) || !is_digits(&card_number) {
            return Err(invalid("card number must be 12 to 19 digits"));
        }

        let expiry_date = self.expiry_date.trim().to_owned();
        if !is_valid_expiry(&expiry_date) {
            return Err(invalid("expiry date must be MM/YY"));
        }

        let cvv = self.cvv.trim().to_owned();
        if !(3..=4).contains(&cvv.len()) || !is_digits(&cvv) {
            return Err(invalid("CVV must be 3 or 4 digits"));
        }

        let address = DeliveryAddress {
            full_name,
            phone: self.phone.trim().to_owned(),
            country: self.country.trim().to_owned(),
            city,
            street,
            building: self.building.trim().to_owned(),
            apartment: self.apartment.trim().to_owned(),
            postal_code: self.postal_code.trim().to_owned(),
        };
        let payment = PaymentDetails {
            card_number: SecretString::from(card_number),
            card_holder,
            expiry_date,
            cvv: SecretString::from(cvv),
        };
        Ok((address, payment))
    }
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the cart has no lines; no order
    /// is created.
    /// Returns `CheckoutError::Repository` if any step fails; nothing is
    /// written.
    #[instrument(skip(self, address, payment), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        address: &DeliveryAddress,
        payment: &PaymentDetails,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let lines = db::cart::lock_lines(&mut *tx, user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let total = cart_total(lines.iter().map(|l| (l.unit_price, l.quantity)));
        if total > ORDER_TOTAL_LIMIT {
            return Err(CheckoutError::TotalTooLarge);
        }

        let order_id = db::orders::insert_order(&mut *tx, user_id, total).await?;
        for line in &lines {
            db::orders::insert_item(
                &mut *tx,
                order_id,
                line.product_id,
                line.quantity,
                line.unit_price,
            )
            .await?;
        }
        db::orders::insert_address(&mut *tx, order_id, user_id, address).await?;
        db::orders::insert_payment(&mut *tx, order_id, payment).await?;

        let product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        db::cart::remove_lines(&mut *tx, user_id, &product_ids).await?;

        tx.commit().await?;

        tracing::info!(%order_id, %total, items = lines.len(), "Order placed");
        Ok(CheckoutReceipt { order_id, total })
    }
}

fn required(value: &str, field: &str) -> Result<String, CheckoutError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(&format!("{field} is required")));
    }
    Ok(value.to_owned())
}

fn invalid(message: &str) -> CheckoutError {
    CheckoutError::InvalidField(message.to_owned())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_valid_expiry(s: &str) -> bool {
    let Some((month, year)) = s.split_once('/') else {
        return false;
    };
    month.len() == 2
        && year.len() == 2
        && is_digits(month)
        && is_digits(year)
        && month.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
}
