//! Command implementations.
//!
//! Every command runs against a freshly loaded [`Session`] and returns the
//! JSON document to print.

pub mod cart;
pub mod wishlist;

use nova_cart_core::{AddedSummary, Collection, IdError, ItemIdentity, LineItem, Price};
use nova_cart_storefront::AppError;
use nova_cart_storefront::catalog::CatalogClient;
use nova_cart_storefront::config::{ConfigError, StorefrontConfig};
use nova_cart_storefront::remote::{ApiClient, RemoteClient};
use nova_cart_storefront::services::CartService;
use nova_cart_storefront::state::SessionState;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The product or variant ID is malformed.
    #[error("Invalid ID: {0}")]
    InvalidId(#[from] IdError),

    /// The operation was rejected or could not be saved.
    #[error(transparent)]
    App(#[from] AppError),

    /// Output could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Message for the shopper, without internal detail.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::App(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// A loaded cart service.
pub struct Session {
    service: CartService<RemoteClient, CatalogClient>,
}

impl Session {
    /// Read configuration, build the clients and fetch both collections.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or loading fails.
    pub async fn connect() -> Result<Self, CliError> {
        let config = StorefrontConfig::from_env()?;

        let api = ApiClient::new(&config.api);
        let remote = RemoteClient::new(api.clone());
        let catalog = CatalogClient::new(api, &config.catalog_cache);
        let state = SessionState::new(&config.limits);

        let service = CartService::new(state, remote, catalog, config.sync);
        service.load().await?;

        tracing::debug!(mode = ?config.sync.mode, "Session loaded");
        Ok(Self { service })
    }

    pub const fn service(&self) -> &CartService<RemoteClient, CatalogClient> {
        &self.service
    }
}

/// Parse command-line IDs into an item identity.
///
/// # Errors
///
/// Returns an error if either ID is blank or too long.
pub fn identity(product: &str, variant: Option<&str>) -> Result<ItemIdentity, CliError> {
    Ok(ItemIdentity::parse(product, variant)?)
}

/// A collection as printed by `show` and after each change.
#[derive(Debug, Serialize)]
pub struct CollectionView<'a> {
    pub kind: String,
    pub limit: usize,
    pub items: &'a [LineItem],
    pub total_quantity: u32,
    pub subtotal: Option<Price>,
}

impl<'a> CollectionView<'a> {
    #[must_use]
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            kind: collection.kind().to_string(),
            limit: collection.limit(),
            items: collection.items(),
            total_quantity: collection.total_quantity(),
            subtotal: collection.subtotal(),
        }
    }
}

/// Output of a command that changed a collection.
#[derive(Debug, Serialize)]
pub struct ChangeView<'a> {
    /// The item that was added, changed or removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<LineItem>,
    pub collection: CollectionView<'a>,
    /// Items added to the cart by this command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<AddedSummary>,
}
