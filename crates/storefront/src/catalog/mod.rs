//! Product catalog lookups.
//!
//! The cart needs a variant's price when an item is added and its stock
//! ceiling when a quantity is increased. [`CatalogService`] is the seam the
//! sync layer depends on; [`CatalogClient`] serves it from the API with an
//! in-memory `moka` cache.

mod client;

pub use client::CatalogClient;

use std::future::Future;

use nova_cart_core::{ProductId, VariantId, VariantSnapshot};
use thiserror::Error;

use crate::remote::RemoteError;

/// Errors from catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Transport or API failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Variant {variant_id} not found on product {product_id}")]
    VariantNotFound {
        product_id: ProductId,
        variant_id: VariantId,
    },
}

impl CatalogError {
    /// Whether the product or variant does not exist, as opposed to the
    /// lookup failing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound(_) | Self::VariantNotFound { .. }
        )
    }
}

/// Read access to product and variant data.
pub trait CatalogService: Send + Sync {
    /// Price, stock and images for a product, or for one of its variants.
    fn get_variant(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> impl Future<Output = Result<VariantSnapshot, CatalogError>> + Send;

    /// Drop anything cached for a product so the next lookup sees current
    /// stock.
    fn invalidate(&self, product_id: &ProductId) -> impl Future<Output = ()> + Send;
}
