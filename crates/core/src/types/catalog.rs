//! Product catalog record shapes.
//!
//! The catalog is owned by a remote service; these records describe exactly
//! which fields the cart and wishlist rely on. Required fields are plain, and
//! optional ones are `Option` so absent data is handled at the boundary
//! instead of surfacing later as missing values.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};
use super::price::Price;

/// A product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub alt_text: Option<String>,
}

/// A purchasable variant of a product (size, colour, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub title: String,
    /// Overrides the product price when present.
    #[serde(default)]
    pub price: Option<Price>,
    /// Units available; `None` means stock is not tracked.
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub handle: String,
    pub price: Price,
    /// Stock for products sold without variants.
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// The price, stock and images of a single purchasable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSnapshot {
    pub price: Price,
    pub stock: Option<u32>,
    pub images: Vec<Image>,
}

impl VariantSnapshot {
    /// Whether at least one unit can be sold.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|stock| stock > 0)
    }
}

impl Product {
    /// Find a variant by ID.
    #[must_use]
    pub fn variant(&self, id: &VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// Resolve the effective price, stock and images for a variant, or for the
    /// bare product when `variant_id` is `None`.
    ///
    /// Returns `None` when the variant does not belong to this product.
    #[must_use]
    pub fn snapshot(&self, variant_id: Option<&VariantId>) -> Option<VariantSnapshot> {
        let Some(variant_id) = variant_id else {
            return Some(VariantSnapshot {
                price: self.price,
                stock: self.stock,
                images: self.images.clone(),
            });
        };

        let variant = self.variant(variant_id)?;
        let images = if variant.images.is_empty() {
            self.images.clone()
        } else {
            variant.images.clone()
        };

        Some(VariantSnapshot {
            price: variant.price.unwrap_or(self.price),
            stock: variant.stock,
            images,
        })
    }
}
