//! Cart aggregate: (user, product) -> positive quantity.
//!
//! Every mutation is a single statement, so concurrent adds from two tabs
//! sum instead of overwriting each other.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use brokeshop_core::{Price, ProductId, Quantity, QuantityError, UserId};

use super::RepositoryError;
use crate::models::{Cart, CartLine};

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Requested quantity was out of range.
    #[error(transparent)]
    InvalidQuantity(#[from] QuantityError),

    /// The line would hold more than [`Quantity::MAX`] units.
    #[error("a cart line holds at most {} units", Quantity::MAX.get())]
    LineLimit,

    /// The product is not in the catalog.
    #[error("product not found")]
    ProductNotFound,

    /// Store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CartError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

/// Internal row type for cart lines joined with their product.
#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: i32,
    name: String,
    image: String,
    price: Decimal,
    quantity: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let unit_price = Price::new(row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid price for product {}: {e}",
                row.product_id
            ))
        })?;
        let quantity = Quantity::new(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid cart quantity: {e}"))
        })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            image: row.image,
            unit_price,
            quantity,
            line_total: unit_price.line_total(quantity),
        })
    }
}

const LINES_QUERY: &str = "
    SELECT c.product_id, p.name, p.image, p.price, c.quantity
    FROM shop.cart_line c
    JOIN shop.product p ON p.id = c.product_id
    WHERE c.user_id = $1
    ORDER BY c.created_at, c.product_id";

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart with product snapshots and line totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(LINES_QUERY)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        let lines = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Cart::from_lines(lines))
    }

    /// Add `quantity` units, summing onto any existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is out of range.
    /// Returns `CartError::LineLimit` if the summed line would exceed
    /// [`Quantity::MAX`]; the line is left unchanged.
    /// Returns `CartError::ProductNotFound` if the product doesn't exist.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), CartError> {
        let quantity = Quantity::new(quantity)?;

        let result = sqlx::query(
            "INSERT INTO shop.cart_line (user_id, product_id, quantity)
             SELECT $1, p.id, $3 FROM shop.product p WHERE p.id = $2
             ON CONFLICT (user_id, product_id)
             DO UPDATE SET quantity = cart_line.quantity + EXCLUDED.quantity
             WHERE cart_line.quantity + EXCLUDED.quantity <= $4",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity.get())
        .bind(Quantity::MAX.get())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.product WHERE id = $1)")
                    .bind(product_id)
                    .fetch_one(self.pool)
                    .await?;
            return Err(if exists {
                CartError::LineLimit
            } else {
                CartError::ProductNotFound
            });
        }
        Ok(())
    }

    /// Replace the quantity of a line. Zero or less removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is above
    /// [`Quantity::MAX`].
    /// Returns `CartError::ProductNotFound` if a positive quantity is set for
    /// a product that doesn't exist.
    pub async fn set(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), CartError> {
        let quantity = match Quantity::new(quantity) {
            Ok(quantity) => quantity,
            Err(QuantityError::NotPositive(_)) => {
                self.remove(user_id, product_id).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let result = sqlx::query(
            "INSERT INTO shop.cart_line (user_id, product_id, quantity)
             SELECT $1, p.id, $3 FROM shop.product p WHERE p.id = $2
             ON CONFLICT (user_id, product_id)
             DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity.get())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CartError::ProductNotFound);
        }
        Ok(())
    }

    /// Remove one line. Removing a missing line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_line WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear_in(&mut *conn, user_id).await
    }

    /// Total number of units in the cart, 0 when empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM shop.cart_line WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Cart total at current catalog prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total(&self, user_id: UserId) -> Result<Decimal, RepositoryError> {
        Ok(self.get(user_id).await?.total)
    }
}

/// Read and row-lock the user's cart inside a transaction.
///
/// Concurrent updates of these lines block until the transaction ends. A line
/// inserted meanwhile is not locked; pair with [`remove_lines`] so it survives.
pub(crate) async fn lock_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<CartLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartLineRow>(&format!("{LINES_QUERY} FOR UPDATE OF c"))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Delete every line of the user's cart on an existing connection.
pub(crate) async fn clear_in(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM shop.cart_line WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delete the given lines of the user's cart on an existing connection.
pub(crate) async fn remove_lines(
    conn: &mut PgConnection,
    user_id: UserId,
    product_ids: &[ProductId],
) -> Result<(), RepositoryError> {
    let ids: Vec<i32> = product_ids.iter().map(ProductId::as_i32).collect();
    sqlx::query("DELETE FROM shop.cart_line WHERE user_id = $1 AND product_id = ANY($2)")
        .bind(user_id)
        .bind(ids)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
