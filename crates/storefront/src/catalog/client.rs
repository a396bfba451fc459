//! API-backed catalog with a product cache.

use moka::future::Cache;
use nova_cart_core::{Product, ProductId, VariantId, VariantSnapshot};
use reqwest::Method;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{CatalogError, CatalogService};
use crate::config::CatalogCacheConfig;
use crate::remote::ApiClient;

/// Catalog lookups against `GET /products/{id}`.
///
/// Products are cached whole, so every variant of a product is served from
/// one fetch. Cheaply cloneable.
#[derive(Clone)]
pub struct CatalogClient {
    api: ApiClient,
    cache: Cache<ProductId, Product>,
}

impl CatalogClient {
    #[must_use]
    pub fn new(api: ApiClient, config: &CatalogCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();

        Self { api, cache }
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` for an unknown id, or `Remote` if the API
    /// request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product, CatalogError> {
        // Check cache
        if let Some(product) = self.cache.get(product_id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let path = format!("products/{product_id}");
        let product: Product = match self
            .api
            .execute::<_, ()>(Method::GET, &path, None, Uuid::new_v4())
            .await
        {
            Ok(product) => product,
            Err(e) if e.is_not_found() => {
                return Err(CatalogError::ProductNotFound(product_id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        // Cache the result
        self.cache.insert(product_id.clone(), product.clone()).await;

        Ok(product)
    }

    /// Invalidate a cached product.
    pub async fn invalidate_product(&self, product_id: &ProductId) {
        self.cache.invalidate(product_id).await;
    }
}

impl CatalogService for CatalogClient {
    async fn get_variant(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<VariantSnapshot, CatalogError> {
        let product = self.get_product(product_id).await?;
        product
            .snapshot(variant_id)
            .ok_or_else(|| match variant_id {
                Some(variant_id) => CatalogError::VariantNotFound {
                    product_id: product_id.clone(),
                    variant_id: variant_id.clone(),
                },
                None => CatalogError::ProductNotFound(product_id.clone()),
            })
    }

    async fn invalidate(&self, product_id: &ProductId) {
        self.invalidate_product(product_id).await;
    }
}
