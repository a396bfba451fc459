//! JSON-over-HTTP client for the Nova-Cart API.
//!
//! [`ApiClient`] holds the shared `reqwest` client, base URL and token and is
//! reused by both [`RemoteClient`] and the catalog client.

use std::sync::Arc;

use nova_cart_core::{
    CollectionKind, CollectionSnapshot, ItemIdentity, LineItem, Price, ProductId, VariantId,
};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::{PersistenceService, RemoteError};
use crate::config::ApiConfig;

/// Longest slice of an error body kept for logs and errors.
const ERROR_BODY_PREVIEW: usize = 200;

// =============================================================================
// ApiClient
// =============================================================================

/// Shared HTTP transport for the Nova-Cart API.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl ApiClient {
    /// Create a new API client.
    #[must_use]
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                token: config.token.clone(),
            }),
        }
    }

    /// Resolve a path relative to the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Send a request and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` for 429 responses, `Status` for any other
    /// non-success status, and `Parse` if the body is not the expected JSON.
    pub async fn execute<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        request_id: Uuid,
    ) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let url = self.endpoint(path)?;

        let mut request = self
            .inner
            .client
            .request(method.clone(), url)
            .bearer_auth(self.inner.token.expose_secret())
            .header("X-Request-Id", request_id.to_string());
        if method != Method::GET {
            request = request.header("Idempotency-Key", request_id.to_string());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            let body = preview(&response_text);
            tracing::warn!(
                status = %status,
                path,
                body = %body,
                "API returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                path,
                body = %preview(&response_text),
                "Failed to parse API response"
            );
            RemoteError::Parse(e)
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}

// =============================================================================
// RemoteClient
// =============================================================================

/// Item payload for create, update and delete requests.
#[derive(Debug, Serialize)]
struct ItemRequest<'a> {
    product_id: &'a ProductId,
    variant_id: Option<&'a VariantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_price: Option<Price>,
}

impl<'a> ItemRequest<'a> {
    const fn identity(identity: &'a ItemIdentity) -> Self {
        Self {
            product_id: &identity.product_id,
            variant_id: identity.variant_id.as_ref(),
            quantity: None,
            unit_price: None,
        }
    }
}

fn items_path(kind: CollectionKind) -> String {
    format!("{}/items", kind.as_str())
}

/// Client for the Remote Persistence Service.
#[derive(Clone)]
pub struct RemoteClient {
    api: ApiClient,
}

impl RemoteClient {
    /// Create a persistence client over a shared transport.
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl PersistenceService for RemoteClient {
    #[instrument(skip(self), fields(kind = %kind))]
    async fn fetch(&self, kind: CollectionKind) -> Result<CollectionSnapshot, RemoteError> {
        self.api
            .execute::<_, ()>(Method::GET, kind.as_str(), None, Uuid::new_v4())
            .await
    }

    #[instrument(skip(self, item), fields(kind = %kind, item = %item.identity()))]
    async fn create_item(
        &self,
        kind: CollectionKind,
        item: &LineItem,
        request_id: Uuid,
    ) -> Result<CollectionSnapshot, RemoteError> {
        let body = ItemRequest {
            quantity: Some(item.quantity()),
            unit_price: Some(item.unit_price()),
            ..ItemRequest::identity(item.identity())
        };
        self.api
            .execute(Method::POST, &items_path(kind), Some(&body), request_id)
            .await
    }

    #[instrument(skip(self), fields(kind = %kind, item = %identity))]
    async fn update_quantity(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        quantity: u32,
        request_id: Uuid,
    ) -> Result<CollectionSnapshot, RemoteError> {
        let body = ItemRequest {
            quantity: Some(quantity),
            ..ItemRequest::identity(identity)
        };
        self.api
            .execute(Method::PATCH, &items_path(kind), Some(&body), request_id)
            .await
    }

    #[instrument(skip(self), fields(kind = %kind, item = %identity))]
    async fn delete_item(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        request_id: Uuid,
    ) -> Result<CollectionSnapshot, RemoteError> {
        let body = ItemRequest::identity(identity);
        match self
            .api
            .execute(Method::DELETE, &items_path(kind), Some(&body), request_id)
            .await
        {
            // Already gone server-side; return the current collection instead.
            Err(e) if e.is_not_found() => {
                debug!("Item already deleted remotely");
                self.fetch(kind).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nova_cart_core::CurrencyCode;

    use super::*;

    fn api(base: &str) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: Url::parse(base).unwrap(),
            token: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
        })
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = api("https://api.nova-cart.test/v1/");
        assert_eq!(
            api.endpoint(&items_path(CollectionKind::Wishlist))
                .unwrap()
                .as_str(),
            "https://api.nova-cart.test/v1/wishlist/items"
        );
        assert_eq!(
            api.endpoint(CollectionKind::Cart.as_str()).unwrap().as_str(),
            "https://api.nova-cart.test/v1/cart"
        );
    }

    #[test]
    fn test_item_request_identity_only() {
        let identity = ItemIdentity::parse("p1", None).unwrap();
        let json = serde_json::to_value(ItemRequest::identity(&identity)).unwrap();
        assert_eq!(json, serde_json::json!({"product_id": "p1", "variant_id": null}));
    }

    #[test]
    fn test_item_request_create_payload() {
        let item = LineItem::single(
            ItemIdentity::parse("p1", Some("v1")).unwrap(),
            Price::from_cents(1250, CurrencyCode::USD).unwrap(),
        );
        let body = ItemRequest {
            quantity: Some(item.quantity()),
            unit_price: Some(item.unit_price()),
            ..ItemRequest::identity(item.identity())
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["variant_id"], "v1");
        assert_eq!(json["quantity"], 1);
        assert_eq!(json["unit_price"]["amount"], "12.50");
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(ERROR_BODY_PREVIEW * 2);
        assert_eq!(preview(&long).len(), ERROR_BODY_PREVIEW);
    }
}
