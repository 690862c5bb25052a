//! Back-office order handlers.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use brokeshop_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::OrderSummary;
use crate::routes::flash::{self, FlashQuery};
use crate::state::AppState;

use super::StaffView;

const ORDERS_PATH: &str = "/admin/orders";

/// All-orders view.
#[derive(Debug, Serialize)]
pub struct OrdersView {
    pub staff: StaffView,
    pub orders: Vec<OrderSummary>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

/// Status update form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
}

/// Every order with its buyer, newest first.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn index(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<OrdersView>> {
    let orders = OrderRepository::new(state.pool()).list_all(None).await?;
    Ok(Json(OrdersView {
        staff: StaffView::from(&admin.user),
        orders,
        flash,
    }))
}

/// Set an order's status.
#[instrument(skip(state, admin, form), fields(admin = %admin.user.id))]
pub async fn update_status(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Response {
    let status = match OrderStatus::parse(&form.status) {
        Ok(status) => status,
        Err(e) => return flash::error(ORDERS_PATH, &e.to_string()).into_response(),
    };

    match OrderRepository::new(state.pool())
        .update_status(id, &status)
        .await
    {
        Ok(()) => {
            tracing::info!(order_id = %id, %status, "Order status updated");
            flash::success(ORDERS_PATH, &format!("Order #{id} is now {status}")).into_response()
        }
        Err(e) => flash::failure(ORDERS_PATH, e),
    }
}
