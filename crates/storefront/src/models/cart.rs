//! Cart view types.

use rust_decimal::Decimal;
use serde::Serialize;

use brokeshop_core::{Price, ProductId, Quantity, cart_total};

/// One line of a user's cart joined with the product it refers to.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub unit_price: Price,
    pub quantity: Quantity,
    pub line_total: Decimal,
}

/// A user's cart, lines in the order they were first added.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    pub count: i64,
}

impl Cart {
    /// Build a cart view, computing the total and item count from the lines.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let total = cart_total(lines.iter().map(|l| (l.unit_price, l.quantity)));
        let count = lines.iter().map(|l| i64::from(l.quantity.get())).sum();
        Self {
            lines,
            total,
            count,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, price: &str, qty: i32) -> CartLine {
        let unit_price = Price::parse(price).unwrap();
        let quantity = Quantity::new(qty).unwrap();
        CartLine {
            product_id: ProductId::new(id),
            name: format!("product {id}"),
            image: "/images/default.jpg".to_owned(),
            unit_price,
            quantity,
            line_total: unit_price.line_total(quantity),
        }
    }

    #[test]
    fn test_totals() {
        let cart = Cart::from_lines(vec![line(3, "400", 3), line(5, "1200", 1)]);
        assert_eq!(cart.total, Decimal::new(2400, 0));
        assert_eq!(cart.count, 4);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from_lines(Vec::new());
        assert_eq!(cart.total, Decimal::ZERO);
        assert_eq!(cart.count, 0);
        assert!(cart.is_empty());
    }
}
