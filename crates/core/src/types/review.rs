//! Review moderation state machine and rating arithmetic.
//!
//! A review is created `pending` and moves exactly once to `approved` or
//! `rejected`. Both are terminal. Only approved reviews are visible to
//! shoppers and count towards a product's rating.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Status
// =============================================================================

/// Moderation status of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Awaiting a moderator.
    #[default]
    Pending,
    /// Visible on the product page.
    Approved,
    /// Hidden permanently.
    Rejected,
}

/// A moderator's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationDecision {
    /// Publish the review.
    Approve,
    /// Hide the review.
    Reject,
}

/// Errors from the moderation transition.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationError {
    /// The review already reached a terminal state.
    #[error("review is already {0}")]
    AlreadyModerated(ReviewStatus),
}

impl ReviewStatus {
    /// The literal stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Apply a moderator's decision.
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::AlreadyModerated`] unless the review is
    /// pending.
    pub const fn moderate(self, decision: ModerationDecision) -> Result<Self, ModerationError> {
        match (self, decision) {
            (Self::Pending, ModerationDecision::Approve) => Ok(Self::Approved),
            (Self::Pending, ModerationDecision::Reject) => Ok(Self::Rejected),
            (terminal, _) => Err(ModerationError::AlreadyModerated(terminal)),
        }
    }
}

impl ModerationDecision {
    /// The status a pending review ends in.
    #[must_use]
    pub const fn target(self) -> ReviewStatus {
        match self {
            Self::Approve => ReviewStatus::Approved,
            Self::Reject => ReviewStatus::Rejected,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("invalid review status: {s}")),
        }
    }
}

// =============================================================================
// Rating
// =============================================================================

/// Error returned when a rating is outside 1-5.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct RatingError(pub i32);

/// A star rating from 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rating(u8);

impl Rating {
    /// Lowest rating.
    pub const MIN: i32 = 1;
    /// Highest rating.
    pub const MAX: i32 = 5;

    /// Validate a raw rating.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError`] if `n` is outside 1-5.
    pub fn new(n: i32) -> Result<Self, RatingError> {
        if (Self::MIN..=Self::MAX).contains(&n) {
            u8::try_from(n).map(Self).map_err(|_| RatingError(n))
        } else {
            Err(RatingError(n))
        }
    }

    /// The number of stars.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for Rating {
    type Error = RatingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i32 {
    fn from(r: Rating) -> Self {
        Self::from(r.0)
    }
}

/// Average of approved ratings for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal place, `0` when there are none.
    pub average: Decimal,
    /// Number of approved reviews.
    pub count: i64,
}

impl RatingSummary {
    /// Summarise a set of approved ratings.
    ///
    /// ```
    /// use brokeshop_core::{Rating, RatingSummary};
    ///
    /// let ratings = [5, 4, 4].map(|n| Rating::new(n).unwrap());
    /// let summary = RatingSummary::from_ratings(ratings);
    /// assert_eq!(summary.average.to_string(), "4.3");
    /// assert_eq!(summary.count, 3);
    /// ```
    #[must_use]
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = Rating>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0_i64, 0_i64), |(sum, count), r| {
                (sum + i64::from(r.get()), count + 1)
            });
        Self::from_totals(sum, count)
    }

    /// Build a summary from an aggregate `SUM(rating)` and `COUNT(*)`.
    #[must_use]
    pub fn from_totals(sum: i64, count: i64) -> Self {
        if count <= 0 {
            return Self::default();
        }
        let average = (Decimal::from(sum) / Decimal::from(count))
            .round_dp_with_strategy(1, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        Self { average, count }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_moves_to_either_terminal_state() {
        assert_eq!(
            ReviewStatus::Pending.moderate(ModerationDecision::Approve),
            Ok(ReviewStatus::Approved)
        );
        assert_eq!(
            ReviewStatus::Pending.moderate(ModerationDecision::Reject),
            Ok(ReviewStatus::Rejected)
        );
    }

    #[test]
    fn test_terminal_states_never_regress() {
        for terminal in [ReviewStatus::Approved, ReviewStatus::Rejected] {
            for decision in [ModerationDecision::Approve, ModerationDecision::Reject] {
                assert_eq!(
                    terminal.moderate(decision),
                    Err(ModerationError::AlreadyModerated(terminal))
                );
            }
        }
    }

    #[test]
    fn test_decision_target_matches_transition() {
        for decision in [ModerationDecision::Approve, ModerationDecision::Reject] {
            assert_eq!(
                ReviewStatus::Pending.moderate(decision).unwrap(),
                decision.target()
            );
        }
    }

    #[test]
    fn test_status_literals() {
        for status in [
            ReviewStatus::Pending,
            ReviewStatus::Approved,
            ReviewStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ReviewStatus>().unwrap(), status);
        }
        assert!("spam".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn test_rating_bounds() {
        assert_eq!(Rating::new(0), Err(RatingError(0)));
        assert_eq!(Rating::new(6), Err(RatingError(6)));
        assert_eq!(Rating::new(1).unwrap().get(), 1);
        assert_eq!(Rating::new(5).unwrap().get(), 5);
    }

    #[test]
    fn test_summary_empty_is_zero() {
        let summary = RatingSummary::from_ratings([]);
        assert_eq!(summary.average, Decimal::ZERO);
        assert_eq!(summary.count, 0);
    }

    #[test]
    fn test_summary_rounds_to_one_decimal() {
        let summary = RatingSummary::from_totals(9, 2);
        assert_eq!(summary.average, Decimal::new(45, 1));
        let summary = RatingSummary::from_totals(5, 3);
        assert_eq!(summary.average, Decimal::new(17, 1));
    }
}
