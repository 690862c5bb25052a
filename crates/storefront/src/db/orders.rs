//! Order repository.
//!
//! Items are never updated after insertion. The only mutable column of an
//! order is its status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use brokeshop_core::{
    OrderId, OrderStatus, Price, ProductId, Quantity, UserId, Username,
};

use super::RepositoryError;
use crate::models::{DeliveryAddress, Order, OrderItem, OrderSummary, PaymentDetails};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    total: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let status = OrderStatus::parse(&self.status).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid status on order {}: {e}", self.id))
        })?;
        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            total: self.total,
            status,
            created_at: self.created_at,
            items,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: Option<i32>,
    product_name: Option<String>,
    quantity: i32,
    unit_price: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let corrupt =
            |e: &dyn std::fmt::Display| RepositoryError::DataCorruption(format!("invalid order item: {e}"));
        Ok(Self {
            product_id: row.product_id.map(ProductId::new),
            product_name: row.product_name,
            quantity: Quantity::new(row.quantity).map_err(|e| corrupt(&e))?,
            unit_price: Price::new(row.unit_price).map_err(|e| corrupt(&e))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderWithUserRow {
    #[sqlx(flatten)]
    order: OrderRow,
    username: String,
}

/// Aggregate figures for the back-office dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderStats {
    /// Orders of any status.
    pub total_orders: i64,
    /// Sum of totals of `confirmed` and `delivered` orders.
    pub revenue: Decimal,
    /// Number of `confirmed` and `delivered` orders.
    pub paid_orders: i64,
    /// Orders still `pending`.
    pub pending_orders: i64,
}

/// Per-user order figures for the user detail page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserOrderStats {
    pub order_count: i64,
    pub total_spent: Decimal,
}

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.total, o.status, o.created_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for order queries.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders with items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order o
             WHERE o.user_id = $1
             ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let mut items = self.items_for(rows.iter().map(|r| r.id)).await?;
        rows.into_iter()
            .map(|r| {
                let order_items = items.remove(&r.id).unwrap_or_default();
                r.into_order(order_items)
            })
            .collect()
    }

    /// Every order with its buyer's name, newest first, optionally capped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(&self, limit: Option<i64>) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderWithUserRow>(&format!(
            "SELECT {ORDER_COLUMNS}, u.username
             FROM shop.customer_order o
             JOIN shop.user_account u ON u.id = o.user_id
             ORDER BY o.created_at DESC, o.id DESC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        let mut items = self.items_for(rows.iter().map(|r| r.order.id)).await?;
        rows.into_iter()
            .map(|r| {
                let order_items = items.remove(&r.order.id).unwrap_or_default();
                Ok(OrderSummary {
                    order: r.order.into_order(order_items)?,
                    username: Username::from_stored(r.username),
                })
            })
            .collect()
    }

    /// Set an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: &OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop.customer_order SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Dashboard figures across all orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let stats = sqlx::query_as::<_, OrderStats>(
            "SELECT COUNT(*) AS total_orders,
                    COALESCE(SUM(total) FILTER (WHERE status = ANY($1)), 0) AS revenue,
                    COUNT(*) FILTER (WHERE status = ANY($1)) AS paid_orders,
                    COUNT(*) FILTER (WHERE status = $2) AS pending_orders
             FROM shop.customer_order",
        )
        .bind(&OrderStatus::REVENUE[..])
        .bind(OrderStatus::PENDING)
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    /// Order count and lifetime spend of one user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats_for_user(&self, user_id: UserId) -> Result<UserOrderStats, RepositoryError> {
        let stats = sqlx::query_as::<_, UserOrderStats>(
            "SELECT COUNT(*) AS order_count, COALESCE(SUM(total), 0) AS total_spent
             FROM shop.customer_order WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    async fn items_for(
        &self,
        order_ids: impl Iterator<Item = i32>,
    ) -> Result<HashMap<i32, Vec<OrderItem>>, RepositoryError> {
        let ids: Vec<i32> = order_ids.collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT i.order_id, i.product_id, p.name AS product_name, i.quantity, i.unit_price
             FROM shop.order_item i
             LEFT JOIN shop.product p ON p.id = i.product_id
             WHERE i.order_id = ANY($1)
             ORDER BY i.order_id, i.id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<i32, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id;
            by_order.entry(order_id).or_default().push(row.try_into()?);
        }
        Ok(by_order)
    }
}

// =============================================================================
// Checkout writes (run inside the caller's transaction)
// =============================================================================

/// Insert a `pending` order and return its ID.
pub(crate) async fn insert_order(
    conn: &mut PgConnection,
    user_id: UserId,
    total: Decimal,
) -> Result<OrderId, RepositoryError> {
    let id: OrderId = sqlx::query_scalar(
        "INSERT INTO shop.customer_order (user_id, total, status)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(user_id)
    .bind(total)
    .bind(OrderStatus::PENDING)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Insert one order line with the unit price captured now.
pub(crate) async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    product_id: ProductId,
    quantity: Quantity,
    unit_price: Price,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO shop.order_item (order_id, product_id, quantity, unit_price)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity.get())
    .bind(unit_price.amount())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert the delivery address of an order.
pub(crate) async fn insert_address(
    conn: &mut PgConnection,
    order_id: OrderId,
    user_id: UserId,
    address: &DeliveryAddress,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO shop.delivery_address
             (order_id, user_id, full_name, phone, country, city, street, building, apartment, postal_code)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(order_id)
    .bind(user_id)
    .bind(&address.full_name)
    .bind(&address.phone)
    .bind(&address.country)
    .bind(&address.city)
    .bind(&address.street)
    .bind(&address.building)
    .bind(&address.apartment)
    .bind(&address.postal_code)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert the payment record of an order, `pending`, method `card`.
pub(crate) async fn insert_payment(
    conn: &mut PgConnection,
    order_id: OrderId,
    payment: &PaymentDetails,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO shop.payment (order_id, card_number, card_holder, expiry_date, cvv, method, status)
         VALUES ($1, $2, $3, $4, $5, 'card', 'pending')",
    )
    .bind(order_id)
    .bind(payment.card_number.expose_secret())
    .bind(&payment.card_holder)
    .bind(&payment.expiry_date)
    .bind(payment.cvv.expose_secret())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
