//! Review submission and moderation.
//!
//! A review starts `pending` and is moved exactly once to `approved` or
//! `rejected` by a moderator (admin or root). Only approved reviews count
//! towards a product's rating.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use brokeshop_core::{
    ModerationDecision, ModerationError, ProductId, Rating, RatingError, ReviewId, Role, UserId,
    authorize,
};

use crate::db::{RepositoryError, ReviewRepository};
use crate::models::{CurrentUser, Review};

/// Shortest accepted comment, after trimming.
pub const MIN_COMMENT_LENGTH: usize = 3;

/// Longest accepted comment, after trimming.
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// Errors from review operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    InvalidRating(#[from] RatingError),

    #[error("comment must be between {MIN_COMMENT_LENGTH} and {MAX_COMMENT_LENGTH} characters")]
    InvalidComment,

    /// The user already has a review of this product, in any status.
    #[error("already reviewed")]
    AlreadyReviewed,

    #[error("product not found")]
    ProductNotFound,

    #[error("review not found")]
    NotFound,

    #[error(transparent)]
    AlreadyModerated(#[from] ModerationError),

    /// The actor's role doesn't allow this operation.
    #[error("insufficient privileges")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ReviewError {
    /// Whether this error is the caller's fault rather than the store's.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}

/// Review service.
pub struct ReviewService<'a> {
    reviews: ReviewRepository<'a>,
}

impl<'a> ReviewService<'a> {
    /// Create a new review service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            reviews: ReviewRepository::new(pool),
        }
    }

    /// Submit a `pending` review.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidRating` or `ReviewError::InvalidComment`
    /// before touching the store.
    /// Returns `ReviewError::AlreadyReviewed` if the user reviewed this product
    /// before; the existing review is left as is.
    /// Returns `ReviewError::ProductNotFound` if the product doesn't exist.
    #[instrument(skip(self, comment), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn submit(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<Review, ReviewError> {
        let rating = Rating::new(rating)?;
        let comment = normalize_comment(comment)?;

        let review = self
            .reviews
            .create(user_id, product_id, rating, comment.as_deref())
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ReviewError::AlreadyReviewed,
                RepositoryError::NotFound => ReviewError::ProductNotFound,
                other => ReviewError::Repository(other),
            })?;

        tracing::info!(review_id = %review.id, "Review submitted");
        Ok(review)
    }

    /// Approve or reject a pending review.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Forbidden` if the actor is not a moderator.
    /// Returns `ReviewError::NotFound` if the review doesn't exist.
    /// Returns `ReviewError::AlreadyModerated` if it already left `pending`,
    /// including when a concurrent moderator got there first.
    #[instrument(skip(self, actor), fields(moderator = %actor.id, review_id = %id))]
    pub async fn moderate(
        &self,
        actor: &CurrentUser,
        id: ReviewId,
        decision: ModerationDecision,
    ) -> Result<Review, ReviewError> {
        if !authorize(actor.role, Role::Admin).is_allowed() {
            return Err(ReviewError::Forbidden);
        }

        if let Some(review) = self.reviews.moderate(id, decision, actor.id).await? {
            tracing::info!(status = %review.status, "Review moderated");
            return Ok(review);
        }

        // Nothing matched: either no such review or it is no longer pending.
        let existing = self
            .reviews
            .get_by_id(id)
            .await?
            .ok_or(ReviewError::NotFound)?;
        Err(ModerationError::AlreadyModerated(existing.status).into())
    }

    /// Delete a review in any status. Root only.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Forbidden` if the actor is not root.
    /// Returns `ReviewError::NotFound` if the review doesn't exist.
    #[instrument(skip(self, actor), fields(actor = %actor.id, review_id = %id))]
    pub async fn delete(&self, actor: &CurrentUser, id: ReviewId) -> Result<(), ReviewError> {
        if !authorize(actor.role, Role::Root).is_allowed() {
            return Err(ReviewError::Forbidden);
        }
        if !self.reviews.delete(id).await? {
            return Err(ReviewError::NotFound);
        }
        tracing::info!("Review deleted");
        Ok(())
    }
}

/// Trim an optional comment; blank means no comment.
///
/// # Errors
///
/// Returns `ReviewError::InvalidComment` if a non-blank comment is too short
/// or too long.
pub fn normalize_comment(comment: Option<&str>) -> Result<Option<String>, ReviewError> {
    let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let len = comment.chars().count();
    if !(MIN_COMMENT_LENGTH..=MAX_COMMENT_LENGTH).contains(&len) {
        return Err(ReviewError::InvalidComment);
    }
    Ok(Some(comment.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_comment_is_none() {
        assert_eq!(normalize_comment(None).unwrap(), None);
        assert_eq!(normalize_comment(Some("   ")).unwrap(), None);
    }

    #[test]
    fn test_comment_is_trimmed() {
        assert_eq!(
            normalize_comment(Some("  tasty  ")).unwrap().as_deref(),
            Some("tasty")
        );
    }

    #[test]
    fn test_comment_length_bounds() {
        assert!(matches!(
            normalize_comment(Some("ok")),
            Err(ReviewError::InvalidComment)
        ));
        assert!(normalize_comment(Some("yum")).is_ok());

        let long = "a".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(matches!(
            normalize_comment(Some(&long)),
            Err(ReviewError::InvalidComment)
        ));
        let max = "a".repeat(MAX_COMMENT_LENGTH);
        assert!(normalize_comment(Some(&max)).is_ok());
    }

    #[test]
    fn test_already_reviewed_message() {
        assert_eq!(ReviewError::AlreadyReviewed.to_string(), "already reviewed");
    }

    #[test]
    fn test_client_errors() {
        assert!(ReviewError::Forbidden.is_client_error());
        assert!(!ReviewError::Repository(RepositoryError::Timeout).is_client_error());
    }
}
