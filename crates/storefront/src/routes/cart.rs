//! Cart, checkout and order history route handlers.
//!
//! Mutations are form posts answered with a redirect carrying a flash
//! message. Views return JSON.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use brokeshop_core::ProductId;

use crate::db::{CartRepository, OrderRepository};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Cart, Order};
use crate::routes::flash::{self, FlashQuery};
use crate::services::{CheckoutError, CheckoutForm, CheckoutService};
use crate::state::AppState;

const CART_PATH: &str = "/cart";
const SHOP_PATH: &str = "/shop";
const CHECKOUT_PATH: &str = "/cart/checkout";
const ORDERS_PATH: &str = "/cart/orders";

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    #[serde(default)]
    pub quantity: Option<String>,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    #[serde(default)]
    pub quantity: String,
}

/// Quantity for an add; missing or unparseable input means one unit.
fn add_quantity(raw: Option<&str>) -> i32 {
    raw.and_then(|q| q.trim().parse().ok()).unwrap_or(1)
}

// =============================================================================
// View Models
// =============================================================================

/// Cart and checkout page view.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart: Cart,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

/// Cart badge.
#[derive(Debug, Serialize)]
pub struct CartCountView {
    pub count: i64,
}

/// Order history view.
#[derive(Debug, Serialize)]
pub struct OrdersView {
    pub orders: Vec<Order>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

// =============================================================================
// Cart
// =============================================================================

/// Display the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<CartView>> {
    let cart = CartRepository::new(state.pool()).get(user.id).await?;
    Ok(Json(CartView { cart, flash }))
}

/// Add units of a product to the cart.
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let quantity = add_quantity(form.quantity.as_deref());

    match CartRepository::new(state.pool())
        .add(user.id, product_id, quantity)
        .await
    {
        Ok(()) => {
            let product = product_id.to_string();
            add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product.as_str())]));
            flash::success(SHOP_PATH, "Added to cart").into_response()
        }
        Err(e) => flash::failure(SHOP_PATH, e),
    }
}

/// Replace the quantity of a line. Zero or less removes it.
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let Ok(quantity) = form.quantity.trim().parse::<i32>() else {
        return flash::error(CART_PATH, "Quantity must be a whole number").into_response();
    };

    match CartRepository::new(state.pool())
        .set(user.id, product_id, quantity)
        .await
    {
        Ok(()) => flash::success(CART_PATH, "Cart updated").into_response(),
        Err(e) => flash::failure(CART_PATH, e),
    }
}

/// Remove a line from the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Response {
    match CartRepository::new(state.pool())
        .remove(user.id, product_id)
        .await
    {
        Ok(()) => flash::success(CART_PATH, "Item removed").into_response(),
        Err(e) => flash::failure(CART_PATH, e),
    }
}

/// Empty the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Response {
    match CartRepository::new(state.pool()).clear(user.id).await {
        Ok(()) => flash::success(CART_PATH, "Cart cleared").into_response(),
        Err(e) => flash::failure(CART_PATH, e),
    }
}

/// Number of units in the cart, for the header badge.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartCountView>> {
    let count = CartRepository::new(state.pool()).count(user.id).await?;
    Ok(Json(CartCountView { count }))
}

// =============================================================================
// Checkout
// =============================================================================

/// Checkout summary. An empty cart sends the user back to the cart page.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn checkout_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(flash): Query<FlashQuery>,
) -> Result<Response> {
    let cart = CartRepository::new(state.pool()).get(user.id).await?;
    if cart.is_empty() {
        return Ok(flash::error(CART_PATH, "Your cart is empty").into_response());
    }
    Ok(Json(CartView { cart, flash }).into_response())
}

/// Place an order for the whole cart.
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let (address, payment) = match form.validate() {
        Ok(validated) => validated,
        Err(e) => return flash::failure(CHECKOUT_PATH, e),
    };

    match CheckoutService::new(state.pool())
        .place_order(user.id, &address, &payment)
        .await
    {
        Ok(receipt) => flash::success(ORDERS_PATH, &receipt.message()).into_response(),
        Err(CheckoutError::EmptyCart) => {
            flash::error(CART_PATH, "Your cart is empty").into_response()
        }
        Err(e) => flash::failure(CHECKOUT_PATH, e),
    }
}

/// The user's orders, newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<OrdersView>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(OrdersView { orders, flash }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_quantity_defaults_to_one() {
        assert_eq!(add_quantity(None), 1);
        assert_eq!(add_quantity(Some("")), 1);
        assert_eq!(add_quantity(Some("two")), 1);
        assert_eq!(add_quantity(Some(" 3 ")), 3);
    }

    #[test]
    fn test_add_quantity_keeps_non_positive() {
        // Rejected later by the cart, not silently turned into one.
        assert_eq!(add_quantity(Some("0")), 0);
        assert_eq!(add_quantity(Some("-2")), -2);
    }
}
