//! Catalog route handlers: listing, search, product detail and reviews.
//!
//! Every catalog page requires a logged-in user.

use axum::{
    Form, Json,
    extract::{FromRequest, Path, Query, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use brokeshop_core::{ProductId, RatingSummary, Role};

use crate::db::{CartRepository, ProductRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, wants_json};
use crate::models::{CurrentUser, Product, ReviewWithAuthor};
use crate::routes::flash::{self, FlashQuery};
use crate::services::ReviewService;
use crate::state::AppState;

// =============================================================================
// View Models
// =============================================================================

/// Who is browsing, for the page header.
#[derive(Debug, Serialize)]
pub struct ViewerView {
    pub username: String,
    pub role: Role,
    pub is_staff: bool,
    pub cart_count: i64,
}

impl ViewerView {
    async fn load(state: &AppState, user: &CurrentUser) -> Result<Self> {
        let cart_count = CartRepository::new(state.pool()).count(user.id).await?;
        Ok(Self {
            username: user.username.to_string(),
            role: user.role,
            is_staff: user.role.is_staff(),
            cart_count,
        })
    }
}

/// Catalog listing view, shared by `/shop` and `/shop/search`.
#[derive(Debug, Serialize)]
pub struct CatalogView {
    pub viewer: ViewerView,
    pub products: Vec<Product>,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

/// Product detail view.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub viewer: ViewerView,
    pub product: Product,
    pub reviews: Vec<ReviewWithAuthor>,
    pub rating: RatingSummary,
    pub has_reviewed: bool,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

// =============================================================================
// Catalog
// =============================================================================

/// Display the full catalog.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<CatalogView>> {
    let products = ProductRepository::new(state.pool());
    Ok(Json(CatalogView {
        viewer: ViewerView::load(&state, &user).await?,
        products: products.list_all().await?,
        categories: products.categories().await?,
        query: None,
        category: None,
        flash,
    }))
}

/// Search by text, or filter by category. Text wins when both are given.
#[instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn search(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<SearchQuery>,
) -> Result<Json<CatalogView>> {
    let repo = ProductRepository::new(state.pool());
    let text = non_blank(query.q);
    let category = non_blank(query.category);

    let products = match (&text, &category) {
        (Some(text), _) => repo.search(text).await?,
        (None, Some(category)) => repo.list_by_category(category).await?,
        (None, None) => repo.list_all().await?,
    };

    Ok(Json(CatalogView {
        viewer: ViewerView::load(&state, &user).await?,
        products,
        categories: repo.categories().await?,
        category: if text.is_some() { None } else { category },
        query: text,
        flash: query.flash,
    }))
}

/// Display one product with its approved reviews.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<ProductView>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_owned()))?;

    let reviews = ReviewRepository::new(state.pool());
    Ok(Json(ProductView {
        viewer: ViewerView::load(&state, &user).await?,
        reviews: reviews.list_approved(id).await?,
        rating: reviews.rating_summary(id).await?,
        has_reviewed: reviews.has_reviewed(user.id, id).await?,
        product,
        flash,
    }))
}

// =============================================================================
// Reviews
// =============================================================================

/// Review form data. The rating arrives as text from a `<select>`.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Review JSON body.
#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

fn has_json_body(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Submit a review, from a form post or a JSON body.
///
/// The body is read according to its `Content-Type`. Clients that want JSON
/// back (see [`wants_json`]) get `201` and the pending review, or the error
/// status; everyone else is redirected back to the product page.
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn submit_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    request: Request,
) -> Response {
    let back = format!("/shop/product/{id}");
    let reply_json = wants_json(request.headers());

    let (rating, comment) = if has_json_body(&request) {
        match Json::<ReviewBody>::from_request(request, &state).await {
            Ok(Json(body)) => (body.rating, body.comment),
            Err(rejection) => return rejection.into_response(),
        }
    } else {
        match Form::<ReviewForm>::from_request(request, &state).await {
            // Unparseable input is an out-of-range rating.
            Ok(Form(form)) => (form.rating.trim().parse::<i32>().unwrap_or(0), form.comment),
            Err(rejection) => return rejection.into_response(),
        }
    };

    let result = ReviewService::new(state.pool())
        .submit(user.id, id, rating, comment.as_deref())
        .await;

    match (result, reply_json) {
        (Ok(review), true) => (StatusCode::CREATED, Json(review)).into_response(),
        (Ok(_), false) => {
            flash::success(&back, "Review submitted and awaiting moderation").into_response()
        }
        (Err(e), true) => AppError::from(e).into_response(),
        (Err(e), false) => flash::failure(&back, e),
    }
}
