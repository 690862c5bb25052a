//! Review types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use brokeshop_core::{ProductId, Rating, ReviewId, ReviewStatus, UserId, Username};

/// A product review.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: Rating,
    pub comment: Option<String>,
    pub status: ReviewStatus,
    pub moderated_by: Option<UserId>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A review joined with its author and product names, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub username: Username,
    pub product_name: String,
}
