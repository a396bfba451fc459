//! Wishlist commands.

use nova_cart_core::{CollectionKind, LineItem};
use serde_json::Value;

use super::{ChangeView, CliError, CollectionView, Session, identity};

/// Print the wishlist.
///
/// # Errors
///
/// Returns an error if the session state is unusable.
pub fn show(session: &Session) -> Result<Value, CliError> {
    let wishlist = session.service().state().snapshot(CollectionKind::Wishlist)?;
    Ok(serde_json::to_value(CollectionView::new(&wishlist))?)
}

/// Save an item.
///
/// # Errors
///
/// Returns an error if the ID is invalid or the wishlist rejects the item.
pub async fn add(session: &Session, product: &str, variant: Option<&str>) -> Result<Value, CliError> {
    let item = session
        .service()
        .add_to_wishlist(identity(product, variant)?)
        .await?;
    changed(session, Some(item))
}

/// Remove an item. Removing an item that is not saved succeeds.
///
/// # Errors
///
/// Returns an error if the removal cannot be saved.
pub async fn remove(
    session: &Session,
    product: &str,
    variant: Option<&str>,
) -> Result<Value, CliError> {
    let removed = session
        .service()
        .remove(CollectionKind::Wishlist, &identity(product, variant)?)
        .await?;
    changed(session, removed)
}

/// Move an item into the cart and print the cart.
///
/// # Errors
///
/// Returns an error if the item is not saved, the cart rejects it, or the
/// move cannot be saved.
pub async fn move_to_cart(
    session: &Session,
    product: &str,
    variant: Option<&str>,
) -> Result<Value, CliError> {
    let item = session
        .service()
        .move_to_cart(&identity(product, variant)?)
        .await?;
    tracing::info!(item = %item.identity(), "Moved to cart");
    super::cart::changed(session, Some(item))
}

fn changed(session: &Session, item: Option<LineItem>) -> Result<Value, CliError> {
    let wishlist = session.service().state().snapshot(CollectionKind::Wishlist)?;
    Ok(serde_json::to_value(ChangeView {
        item,
        collection: CollectionView::new(&wishlist),
        added: None,
    })?)
}
