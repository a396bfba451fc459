//! Remote Persistence Service client.
//!
//! # Architecture
//!
//! - The remote service owns the persisted cart and wishlist; every mutation
//!   returns the authoritative full collection
//! - [`PersistenceService`] is the seam the sync layer depends on, so tests
//!   can swap in an in-memory fake
//! - [`RemoteClient`] is the JSON-over-HTTP implementation built on `reqwest`
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | fetch | `GET /{kind}` |
//! | create | `POST /{kind}/items` |
//! | update quantity | `PATCH /{kind}/items` |
//! | delete | `DELETE /{kind}/items` |
//!
//! `{kind}` is `cart` or `wishlist`.

mod client;

pub use client::{ApiClient, RemoteClient};

use std::future::Future;
use std::time::Duration;

use nova_cart_core::{CollectionKind, CollectionSnapshot, ItemIdentity, LineItem};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when talking to the remote API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The call did not complete within the configured bound.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status >= 500,
            Self::RateLimited(_) | Self::Timeout(_) => true,
            Self::Parse(_) | Self::InvalidUrl(_) => false,
        }
    }

    /// Whether the API reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// The remote store of carts and wishlists.
///
/// Every call returns the full collection as the server now holds it.
/// `request_id` identifies one logical mutation and is reused when that
/// mutation is retried, so the server can deduplicate.
pub trait PersistenceService: Send + Sync {
    /// Fetch the current collection.
    fn fetch(
        &self,
        kind: CollectionKind,
    ) -> impl Future<Output = Result<CollectionSnapshot, RemoteError>> + Send;

    /// Add an item.
    fn create_item(
        &self,
        kind: CollectionKind,
        item: &LineItem,
        request_id: Uuid,
    ) -> impl Future<Output = Result<CollectionSnapshot, RemoteError>> + Send;

    /// Set an item's quantity.
    fn update_quantity(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        quantity: u32,
        request_id: Uuid,
    ) -> impl Future<Output = Result<CollectionSnapshot, RemoteError>> + Send;

    /// Delete an item.
    fn delete_item(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        request_id: Uuid,
    ) -> impl Future<Output = Result<CollectionSnapshot, RemoteError>> + Send;
}
