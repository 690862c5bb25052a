//! Review moderation handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use brokeshop_core::{ModerationDecision, ReviewId, ReviewStatus};

use crate::db::ReviewRepository;
use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireRoot};
use crate::models::ReviewWithAuthor;
use crate::routes::flash::{self, FlashQuery};
use crate::services::ReviewService;
use crate::state::AppState;

use super::StaffView;

const QUEUE_PATH: &str = "/admin/reviews";

/// Moderation listing view.
#[derive(Debug, Serialize)]
pub struct ReviewsView {
    pub staff: StaffView,
    pub reviews: Vec<ReviewWithAuthor>,
    /// `None` when listing every status.
    pub status: Option<ReviewStatus>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

async fn list(
    state: &AppState,
    admin: &RequireAdmin,
    status: Option<ReviewStatus>,
    flash: FlashQuery,
) -> Result<Json<ReviewsView>> {
    let reviews = ReviewRepository::new(state.pool()).list(status).await?;
    Ok(Json(ReviewsView {
        staff: StaffView::from(&admin.user),
        reviews,
        status,
        flash,
    }))
}

/// Reviews awaiting moderation.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn pending(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<ReviewsView>> {
    list(&state, &admin, Some(ReviewStatus::Pending), flash).await
}

/// Reviews in every status.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn all(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<ReviewsView>> {
    list(&state, &admin, None, flash).await
}

async fn moderate(
    state: &AppState,
    admin: &RequireAdmin,
    id: ReviewId,
    decision: ModerationDecision,
) -> Response {
    match ReviewService::new(state.pool())
        .moderate(&admin.user, id, decision)
        .await
    {
        Ok(review) => {
            flash::success(QUEUE_PATH, &format!("Review {}", review.status)).into_response()
        }
        Err(e) => flash::failure(QUEUE_PATH, e),
    }
}

/// Publish a pending review.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn approve(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<ReviewId>,
) -> Response {
    moderate(&state, &admin, id, ModerationDecision::Approve).await
}

/// Hide a pending review.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn reject(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<ReviewId>,
) -> Response {
    moderate(&state, &admin, id, ModerationDecision::Reject).await
}

/// Delete a review in any status.
#[instrument(skip(state, root), fields(root = %root.user.id))]
pub async fn delete(
    State(state): State<AppState>,
    root: RequireRoot,
    Path(id): Path<ReviewId>,
) -> Response {
    match ReviewService::new(state.pool()).delete(&root.user, id).await {
        Ok(()) => flash::success(QUEUE_PATH, "Review deleted").into_response(),
        Err(e) => flash::failure(QUEUE_PATH, e),
    }
}
