//! Back-office user management handlers.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use brokeshop_core::{Role, UserId};

use crate::db::{OrderRepository, ReviewRepository, UserRepository, orders::UserOrderStats};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, ReviewWithAuthor, User};
use crate::routes::flash::{self, FlashQuery};
use crate::services::UserAdminService;
use crate::state::AppState;

use super::StaffView;

const USERS_PATH: &str = "/admin/users";

/// User list view.
#[derive(Debug, Serialize)]
pub struct UsersView {
    pub staff: StaffView,
    pub users: Vec<User>,
    /// Roles the signed-in staff member may assign.
    pub assignable_roles: Vec<Role>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

/// User detail view.
#[derive(Debug, Serialize)]
pub struct UserDetailView {
    pub staff: StaffView,
    pub user: User,
    pub stats: UserOrderStats,
    pub orders: Vec<Order>,
    pub reviews: Vec<ReviewWithAuthor>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

/// Role update form data.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    #[serde(default)]
    pub role: String,
}

/// List every user, newest first.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn index(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<UsersView>> {
    let users = UserRepository::new(state.pool()).list_all().await?;
    let assignable_roles = Role::ALL
        .into_iter()
        .filter(|r| *r <= admin.user.role)
        .collect();

    Ok(Json(UsersView {
        staff: StaffView::from(&admin.user),
        users,
        assignable_roles,
        flash,
    }))
}

/// One user with their orders, reviews and spend.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn show(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<UserId>,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<UserDetailView>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_owned()))?;
    let orders = OrderRepository::new(state.pool());

    Ok(Json(UserDetailView {
        staff: StaffView::from(&admin.user),
        stats: orders.stats_for_user(id).await?,
        orders: orders.list_for_user(id).await?,
        reviews: ReviewRepository::new(state.pool()).list_for_user(id).await?,
        user,
        flash,
    }))
}

/// Change a user's role.
#[instrument(skip(state, admin, form), fields(admin = %admin.user.id))]
pub async fn update_role(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<UserId>,
    Form(form): Form<RoleForm>,
) -> Response {
    let back = format!("{USERS_PATH}/{id}");
    let Ok(role) = form.role.parse::<Role>() else {
        return flash::error(&back, "Unknown role").into_response();
    };

    match UserAdminService::new(state.pool(), state.principals())
        .update_role(&admin.user, id, role)
        .await
    {
        Ok(user) => {
            flash::success(&back, &format!("{} is now {}", user.username, user.role))
                .into_response()
        }
        Err(e) => flash::failure(&back, e),
    }
}

/// Delete a user.
#[instrument(skip(state, admin), fields(admin = %admin.user.id))]
pub async fn delete(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<UserId>,
) -> Response {
    match UserAdminService::new(state.pool(), state.principals())
        .delete_user(&admin.user, id)
        .await
    {
        Ok(()) => flash::success(USERS_PATH, "User deleted").into_response(),
        Err(e) => flash::failure(USERS_PATH, e),
    }
}
