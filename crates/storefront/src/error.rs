//! Unified error handling.
//!
//! Provides a unified `AppError` type returned by every cart and wishlist
//! operation. Business-rule rejections are values, not panics; callers map
//! them to user-visible text with [`AppError::user_message`].

use nova_cart_core::{CollectionError, CollectionKind, ItemIdentity};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::remote::RemoteError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A collection rule rejected the operation.
    #[error(transparent)]
    Collection(#[from] CollectionError),

    /// The remote service did not confirm the change, even after a retry.
    #[error("Failed to sync {kind}: {source}")]
    RemoteSyncFailed {
        kind: CollectionKind,
        #[source]
        source: RemoteError,
    },

    /// The server accepted the change but its answer does not include the
    /// item, so the session cannot show it.
    #[error("Server accepted {identity} but the {kind} it returned does not contain it")]
    Unconfirmed {
        kind: CollectionKind,
        identity: ItemIdentity,
    },

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A change for this item is still being saved.
    #[error("A change to {0} is already in flight")]
    Busy(ItemIdentity),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Text suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Collection(err) => match err {
                CollectionError::CollectionFull { kind, .. } => match kind {
                    CollectionKind::Cart => "Cart is full".to_string(),
                    CollectionKind::Wishlist => "Wishlist is full".to_string(),
                },
                CollectionError::DuplicateItem(_) => "Item already added".to_string(),
                CollectionError::ItemNotFound(_) => "Item is no longer in the list".to_string(),
                CollectionError::StockExceeded { stock: 0, .. } => "Out of stock".to_string(),
                CollectionError::StockExceeded { stock, .. } => {
                    format!("Only {stock} left in stock")
                }
            },
            Self::RemoteSyncFailed { .. } => {
                "Could not save your changes. Please try again.".to_string()
            }
            Self::Unconfirmed { .. } => {
                "Your change could not be confirmed. Please reload.".to_string()
            }
            Self::Catalog(err) if err.is_not_found() => "Product not available".to_string(),
            Self::Catalog(_) => "Could not load product details. Please try again.".to_string(),
            Self::Busy(_) => "Still saving your previous change".to_string(),
            Self::Internal(_) => "Something went wrong".to_string(),
        }
    }

    /// Whether the caller may offer to repeat the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteSyncFailed { .. })
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
