//! Catalog types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use brokeshop_core::{Price, ProductId};

/// Directory every product image is served from.
pub const IMAGE_PREFIX: &str = "/images/";

/// Image shown when a product has none.
pub const DEFAULT_IMAGE: &str = "/images/default.jpg";

/// A catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: Option<String>,
    /// Absolute path under [`IMAGE_PREFIX`].
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for creating or updating a product.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: Option<String>,
    /// Normalised image path, `None` when the form left it blank.
    pub image: Option<String>,
}

/// Normalise a submitted image reference to a path under `/images/`.
///
/// Returns `None` for blank input so updates can keep the current image.
#[must_use]
pub fn normalize_image(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with(IMAGE_PREFIX) {
        Some(raw.to_owned())
    } else {
        Some(format!("{IMAGE_PREFIX}{}", raw.trim_start_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_image_adds_prefix() {
        assert_eq!(normalize_image("pizza.jpg").as_deref(), Some("/images/pizza.jpg"));
        assert_eq!(normalize_image("/pizza.jpg").as_deref(), Some("/images/pizza.jpg"));
    }

    #[test]
    fn test_normalize_image_keeps_prefixed_path() {
        assert_eq!(
            normalize_image(" /images/steak.jpg ").as_deref(),
            Some("/images/steak.jpg")
        );
    }

    #[test]
    fn test_normalize_image_blank_is_none() {
        assert_eq!(normalize_image("   "), None);
    }
}
