//! Order, delivery and payment types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Serialize;

use brokeshop_core::{OrderId, OrderStatus, Price, ProductId, Quantity, UserId, Username};

/// A placed order with its items.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// An order line with the unit price captured at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    /// `None` once the product has been removed from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub quantity: Quantity,
    pub unit_price: Price,
}

/// An order as listed in the back-office, with the buyer's name.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub username: Username,
}

/// Where an order ships to.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAddress {
    pub full_name: String,
    pub phone: String,
    pub country: String,
    pub city: String,
    pub street: String,
    pub building: String,
    pub apartment: String,
    pub postal_code: String,
}

/// Card details captured at checkout.
///
/// The number and CVV stay wrapped so they never reach logs or `Debug`
/// output. They are still written to the store in clear, which is only
/// acceptable because this shop never charges a card.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub card_number: SecretString,
    pub card_holder: String,
    pub expiry_date: String,
    pub cvv: SecretString,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub total: Decimal,
}

impl CheckoutReceipt {
    /// Message shown to the shopper after placing the order.
    #[must_use]
    pub fn message(&self) -> String {
        format!("Order #{} placed. Total: {:.2}", self.order_id, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_message() {
        let receipt = CheckoutReceipt {
            order_id: OrderId::new(42),
            total: Decimal::new(1200, 0),
        };
        assert_eq!(receipt.message(), "Order #42 placed. Total: 1200.00");
    }

    #[test]
    fn test_payment_debug_hides_card() {
        let payment = PaymentDetails {
            card_number: SecretString::from("4111111111111111"),
            card_holder: "ALICE".to_owned(),
            expiry_date: "12/30".to_owned(),
            cvv: SecretString::from("123"),
        };
        let debug_output = format!("{payment:?}");
        assert!(!debug_output.contains("4111111111111111"));
        assert!(!debug_output.contains("\"123\""));
    }
}
