//! Back-office route handlers.
//!
//! Everything under `/admin` needs at least the admin role. Catalog changes,
//! review deletion and snapshot import need root; those handlers take
//! [`RequireRoot`](crate::middleware::RequireRoot) instead.

pub mod data;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use brokeshop_core::Role;

use crate::db::{OrderRepository, ProductRepository, ReviewRepository, UserRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{CurrentUser, OrderSummary};
use crate::routes::flash::FlashQuery;
use crate::state::AppState;

/// Orders shown on the dashboard.
const RECENT_ORDERS: i64 = 5;

/// The signed-in staff member, for the back-office header.
#[derive(Debug, Serialize)]
pub struct StaffView {
    pub username: String,
    pub role: Role,
    pub is_root: bool,
}

impl From<&CurrentUser> for StaffView {
    fn from(user: &CurrentUser) -> Self {
        Self {
            username: user.username.to_string(),
            role: user.role,
            is_root: user.role == Role::Root,
        }
    }
}

/// Dashboard figures.
#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub staff: StaffView,
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub paid_orders: i64,
    pub pending_orders: i64,
    pub revenue: Decimal,
    pub pending_reviews: i64,
    pub recent_orders: Vec<OrderSummary>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

/// Back-office dashboard.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<DashboardView>> {
    let pool = state.pool();
    let orders = OrderRepository::new(pool);
    let stats = orders.stats().await?;

    Ok(Json(DashboardView {
        staff: StaffView::from(&admin.user),
        total_users: UserRepository::new(pool).count().await?,
        total_products: ProductRepository::new(pool).count().await?,
        total_orders: stats.total_orders,
        paid_orders: stats.paid_orders,
        pending_orders: stats.pending_orders,
        revenue: stats.revenue,
        pending_reviews: ReviewRepository::new(pool).count_pending().await?,
        recent_orders: orders.list_all(Some(RECENT_ORDERS)).await?,
        flash,
    }))
}

/// Create the back-office router, mounted at `/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        // Users
        .route("/users", get(users::index))
        .route("/users/{id}", get(users::show))
        .route("/users/{id}/role", post(users::update_role))
        .route("/users/{id}/delete", post(users::delete))
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}/status", post(orders::update_status))
        // Catalog (root)
        .route("/products", get(products::index).post(products::create))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/delete", post(products::delete))
        // Reviews
        .route("/reviews", get(reviews::pending))
        .route("/reviews/all", get(reviews::all))
        .route("/reviews/{id}/approve", post(reviews::approve))
        .route("/reviews/{id}/reject", post(reviews::reject))
        .route("/reviews/{id}/delete", post(reviews::delete))
        // Snapshots
        .route("/export", get(data::export))
        .route("/import", post(data::import))
}
