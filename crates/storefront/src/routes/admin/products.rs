//! Catalog management handlers (root only).

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use brokeshop_core::{Price, ProductId};

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireRoot;
use crate::models::{Product, ProductDraft, product::normalize_image};
use crate::routes::flash::{self, FlashQuery};
use crate::state::AppState;

use super::StaffView;

const PRODUCTS_PATH: &str = "/admin/products";

/// Catalog management view.
#[derive(Debug, Serialize)]
pub struct ProductsView {
    pub staff: StaffView,
    pub products: Vec<Product>,
    pub categories: Vec<String>,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

/// Create and update form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub image: String,
}

impl ProductForm {
    /// Validate into a draft.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a missing name or a price that is
    /// not a non-negative number.
    pub fn into_draft(self) -> Result<ProductDraft> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Product name is required".to_owned()));
        }
        let price = Price::parse(&self.price)
            .map_err(|e| AppError::BadRequest(format!("Invalid price: {e}")))?;
        let category = Some(self.category.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_owned);

        Ok(ProductDraft {
            name: name.to_owned(),
            description: self.description.trim().to_owned(),
            price,
            category,
            image: normalize_image(&self.image),
        })
    }
}

/// List the catalog for editing.
#[instrument(skip(state, root), fields(root = %root.user.id))]
pub async fn index(
    State(state): State<AppState>,
    root: RequireRoot,
    Query(flash): Query<FlashQuery>,
) -> Result<Json<ProductsView>> {
    let repo = ProductRepository::new(state.pool());
    Ok(Json(ProductsView {
        staff: StaffView::from(&root.user),
        products: repo.list_all().await?,
        categories: repo.categories().await?,
        flash,
    }))
}

/// Add a product.
#[instrument(skip(state, root, form), fields(root = %root.user.id))]
pub async fn create(
    State(state): State<AppState>,
    root: RequireRoot,
    Form(form): Form<ProductForm>,
) -> Response {
    let draft = match form.into_draft() {
        Ok(draft) => draft,
        Err(e) => return flash::failure(PRODUCTS_PATH, e),
    };

    match ProductRepository::new(state.pool()).create(&draft).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id, "Product created");
            flash::success(PRODUCTS_PATH, &format!("Added {}", product.name)).into_response()
        }
        Err(e) => flash::failure(PRODUCTS_PATH, e),
    }
}

/// Edit a product. A blank image keeps the current one.
#[instrument(skip(state, root, form), fields(root = %root.user.id))]
pub async fn update(
    State(state): State<AppState>,
    root: RequireRoot,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> Response {
    let draft = match form.into_draft() {
        Ok(draft) => draft,
        Err(e) => return flash::failure(PRODUCTS_PATH, e),
    };

    match ProductRepository::new(state.pool()).update(id, &draft).await {
        Ok(product) => {
            tracing::info!(product_id = %id, "Product updated");
            flash::success(PRODUCTS_PATH, &format!("Updated {}", product.name)).into_response()
        }
        Err(e) => flash::failure(PRODUCTS_PATH, e),
    }
}

/// Remove a product from the catalog.
#[instrument(skip(state, root), fields(root = %root.user.id))]
pub async fn delete(
    State(state): State<AppState>,
    root: RequireRoot,
    Path(id): Path<ProductId>,
) -> Response {
    match ProductRepository::new(state.pool()).delete(id).await {
        Ok(true) => {
            tracing::info!(product_id = %id, "Product deleted");
            flash::success(PRODUCTS_PATH, "Product deleted").into_response()
        }
        Ok(false) => flash::error(PRODUCTS_PATH, "Product not found").into_response(),
        Err(e) => flash::failure(PRODUCTS_PATH, e),
    }
}
