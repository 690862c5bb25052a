//! Review repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use brokeshop_core::{
    ModerationDecision, ProductId, Rating, RatingSummary, ReviewId, ReviewStatus, UserId,
    Username,
};

use super::RepositoryError;
use crate::models::{Review, ReviewWithAuthor};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    product_id: i32,
    user_id: i32,
    rating: i32,
    comment: Option<String>,
    status: String,
    moderated_by: Option<i32>,
    moderated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(row.rating).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid rating on review {}: {e}", row.id))
        })?;
        let status = row
            .status
            .parse::<ReviewStatus>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: ReviewId::new(row.id),
            product_id: ProductId::new(row.product_id),
            user_id: UserId::new(row.user_id),
            rating,
            comment: row.comment,
            status,
            moderated_by: row.moderated_by.map(UserId::new),
            moderated_at: row.moderated_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewWithAuthorRow {
    #[sqlx(flatten)]
    review: ReviewRow,
    username: String,
    product_name: String,
}

impl TryFrom<ReviewWithAuthorRow> for ReviewWithAuthor {
    type Error = RepositoryError;

    fn try_from(row: ReviewWithAuthorRow) -> Result<Self, Self::Error> {
        Ok(Self {
            review: row.review.try_into()?,
            username: Username::from_stored(row.username),
            product_name: row.product_name,
        })
    }
}

const REVIEW_COLUMNS: &str = "r.id, r.product_id, r.user_id, r.rating, r.comment, r.status, \
                              r.moderated_by, r.moderated_at, r.created_at";

const WITH_AUTHOR: &str = "FROM shop.review r
     JOIN shop.user_account u ON u.id = r.user_id
     JOIN shop.product p ON p.id = r.product_id";

// =============================================================================
// Repository
// =============================================================================

/// Repository for review operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a `pending` review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: Rating,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "INSERT INTO shop.review AS r (product_id, user_id, rating, comment)
             VALUES ($1, $2, $3, $4)
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(product_id)
        .bind(user_id)
        .bind(i32::from(rating))
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return RepositoryError::Conflict("already reviewed".to_owned());
                }
                if db_err.is_foreign_key_violation() {
                    return RepositoryError::NotFound;
                }
            }
            RepositoryError::from(e)
        })?;

        row.try_into()
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM shop.review r WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Move a pending review to its terminal state.
    ///
    /// The update only matches a `pending` row, so of two concurrent
    /// moderators exactly one succeeds.
    ///
    /// # Returns
    ///
    /// Returns `None` if no pending review with this ID exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn moderate(
        &self,
        id: ReviewId,
        decision: ModerationDecision,
        moderator: UserId,
    ) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "UPDATE shop.review AS r
             SET status = $2, moderated_by = $3, moderated_at = now()
             WHERE r.id = $1 AND r.status = 'pending'
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(id)
        .bind(decision.target().as_str())
        .bind(moderator)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Approved reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_approved(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ReviewWithAuthor>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewWithAuthorRow>(&format!(
            "SELECT {REVIEW_COLUMNS}, u.username, p.name AS product_name
             {WITH_AUTHOR}
             WHERE r.product_id = $1 AND r.status = 'approved'
             ORDER BY r.created_at DESC, r.id DESC"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Reviews across all products, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<ReviewWithAuthor>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewWithAuthorRow>(&format!(
            "SELECT {REVIEW_COLUMNS}, u.username, p.name AS product_name
             {WITH_AUTHOR}
             WHERE $1::TEXT IS NULL OR r.status = $1
             ORDER BY r.created_at DESC, r.id DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// A user's own reviews in any status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ReviewWithAuthor>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewWithAuthorRow>(&format!(
            "SELECT {REVIEW_COLUMNS}, u.username, p.name AS product_name
             {WITH_AUTHOR}
             WHERE r.user_id = $1
             ORDER BY r.created_at DESC, r.id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Average and count of approved ratings for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rating_summary(
        &self,
        product_id: ProductId,
    ) -> Result<RatingSummary, RepositoryError> {
        let (sum, count): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(rating), 0)::BIGINT, COUNT(*)
             FROM shop.review
             WHERE product_id = $1 AND status = 'approved'",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(RatingSummary::from_totals(sum, count))
    }

    /// Whether the user has a review of this product in any status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_reviewed(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM shop.review WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Number of reviews awaiting moderation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_pending(&self) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.review WHERE status = 'pending'")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Delete a review in any status.
    ///
    /// # Returns
    ///
    /// Returns `true` if the review was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ReviewId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.review WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
