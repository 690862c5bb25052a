//! Prices, quantities and cart arithmetic.
//!
//! All money is [`Decimal`] with two fractional digits. Floating point never
//! touches a price.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Price
// =============================================================================

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a number")]
    NotANumber,
    /// The value is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The value is above [`Price::MAX`].
    #[error("price cannot exceed {}", Price::MAX.0)]
    TooLarge,
}

/// A non-negative unit price.
///
/// ```
/// use brokeshop_core::Price;
///
/// assert_eq!(Price::parse("850").unwrap().to_string(), "850.00");
/// assert!(Price::parse("-1").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest price a `NUMERIC(12,2)` column holds.
    pub const MAX: Self = Self(Decimal::from_parts(3_567_587_327, 232, 0, false, 2));

    /// Wrap a decimal amount, rounding to cents.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero and
    /// [`PriceError::TooLarge`] if it is above [`Price::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let amount = amount.round_dp(2);
        if amount > Self::MAX.0 {
            return Err(PriceError::TooLarge);
        }
        Ok(Self(amount))
    }

    /// Parse a price from form input such as `"850"` or `"12.50"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a decimal or is negative.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let amount: Decimal = s
            .trim()
            .replace(',', ".")
            .parse()
            .map_err(|_| PriceError::NotANumber)?;
        Self::new(amount)
    }

    /// The underlying amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn line_total(self, quantity: Quantity) -> Decimal {
        self.0 * Decimal::from(quantity.get())
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::str::FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Error returned when a quantity is out of range.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative.
    #[error("quantity must be positive, got {0}")]
    NotPositive(i32),
    /// Above [`Quantity::MAX`].
    #[error("quantity cannot exceed {max}, got {0}", max = Quantity::MAX.0)]
    TooLarge(i32),
}

/// An item count between 1 and [`Quantity::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Quantity(i32);

impl Quantity {
    /// One unit.
    pub const ONE: Self = Self(1);

    /// Most units of one product a cart line or order item may hold.
    pub const MAX: Self = Self(10_000);

    /// Validate a raw count.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] if `n` is zero or negative and
    /// [`QuantityError::TooLarge`] if it is above [`Quantity::MAX`].
    pub const fn new(n: i32) -> Result<Self, QuantityError> {
        if n <= 0 {
            Err(QuantityError::NotPositive(n))
        } else if n > Self::MAX.0 {
            Err(QuantityError::TooLarge(n))
        } else {
            Ok(Self(n))
        }
    }

    /// The raw count.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sum of `unit price x quantity` over a set of lines.
///
/// ```
/// use brokeshop_core::{Price, Quantity, cart_total};
/// use rust_decimal::Decimal;
///
/// let lines = [
///     (Price::parse("850").unwrap(), Quantity::new(2).unwrap()),
///     (Price::parse("180").unwrap(), Quantity::ONE),
/// ];
/// assert_eq!(cart_total(lines), Decimal::new(1880, 0));
/// ```
#[must_use]
pub fn cart_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Price, Quantity)>,
{
    lines
        .into_iter()
        .map(|(price, qty)| price.line_total(qty))
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_parse() {
        assert_eq!(Price::parse("850").unwrap().amount(), Decimal::new(850, 0));
        assert_eq!(Price::parse(" 12.5 ").unwrap().to_string(), "12.50");
        assert_eq!(Price::parse("3,99").unwrap().amount(), Decimal::new(399, 2));
        assert_eq!(Price::parse("0").unwrap(), Price::ZERO);
    }

    #[test]
    fn test_price_rejects_bad_input() {
        assert_eq!(Price::parse("abc"), Err(PriceError::NotANumber));
        assert_eq!(Price::parse(""), Err(PriceError::NotANumber));
        assert_eq!(Price::parse("-0.01"), Err(PriceError::Negative));
    }

    #[test]
    fn test_price_fits_column() {
        assert_eq!(Price::MAX.to_string(), "9999999999.99");
        assert!(Price::parse("9999999999.99").is_ok());
        assert_eq!(Price::parse("10000000000"), Err(PriceError::TooLarge));
    }

    #[test]
    fn test_price_rounds_to_cents() {
        assert_eq!(Price::parse("1.005").unwrap().to_string(), "1.00");
        assert_eq!(Price::parse("1.015").unwrap().to_string(), "1.02");
    }

    #[test]
    fn test_price_deserialize_validates() {
        assert!(serde_json::from_str::<Price>("\"-5\"").is_err());
        let p: Price = serde_json::from_str("\"450\"").unwrap();
        assert_eq!(p.amount(), Decimal::new(450, 0));
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert_eq!(Quantity::new(0), Err(QuantityError::NotPositive(0)));
        assert_eq!(Quantity::new(-3), Err(QuantityError::NotPositive(-3)));
        assert_eq!(Quantity::new(2).unwrap().get(), 2);
    }

    #[test]
    fn test_quantity_is_capped() {
        assert_eq!(Quantity::new(10_000), Ok(Quantity::MAX));
        assert_eq!(Quantity::new(10_001), Err(QuantityError::TooLarge(10_001)));
        assert_eq!(
            Quantity::new(i32::MAX),
            Err(QuantityError::TooLarge(i32::MAX))
        );
        assert_eq!(
            QuantityError::TooLarge(20_000).to_string(),
            "quantity cannot exceed 10000, got 20000"
        );
    }

    #[test]
    fn test_cart_total_sums_line_totals() {
        let lines = [
            (Price::parse("400").unwrap(), Quantity::new(3).unwrap()),
            (Price::parse("0.10").unwrap(), Quantity::new(3).unwrap()),
        ];
        assert_eq!(cart_total(lines), Decimal::new(120_030, 2));
    }

    #[test]
    fn test_cart_total_empty_is_zero() {
        assert_eq!(cart_total(std::iter::empty()), Decimal::ZERO);
    }
}
