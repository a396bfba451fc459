//! Cart commands.

use nova_cart_core::{CollectionKind, LineItem};
use serde_json::Value;

use super::{ChangeView, CliError, CollectionView, Session, identity};

/// Print the cart.
///
/// # Errors
///
/// Returns an error if the session state is unusable.
pub fn show(session: &Session) -> Result<Value, CliError> {
    let cart = session.service().state().snapshot(CollectionKind::Cart)?;
    Ok(serde_json::to_value(CollectionView::new(&cart))?)
}

/// Add one unit of an item.
///
/// # Errors
///
/// Returns an error if the ID is invalid or the cart rejects the item.
pub async fn add(session: &Session, product: &str, variant: Option<&str>) -> Result<Value, CliError> {
    let item = session.service().add_to_cart(identity(product, variant)?).await?;
    tracing::info!(item = %item.identity(), "Added to cart");
    changed(session, Some(item))
}

/// Increase an item's quantity by one.
///
/// # Errors
///
/// Returns an error if the item is missing or out of stock.
pub async fn increase(
    session: &Session,
    product: &str,
    variant: Option<&str>,
) -> Result<Value, CliError> {
    let item = session
        .service()
        .increase_quantity(CollectionKind::Cart, &identity(product, variant)?)
        .await?;
    changed(session, Some(item))
}

/// Decrease an item's quantity by one.
///
/// # Errors
///
/// Returns an error if the item is missing or the change cannot be saved.
pub async fn decrease(
    session: &Session,
    product: &str,
    variant: Option<&str>,
) -> Result<Value, CliError> {
    let item = session
        .service()
        .decrease_quantity(CollectionKind::Cart, &identity(product, variant)?)
        .await?;
    changed(session, Some(item))
}

/// Remove an item. Removing an item that is not in the cart succeeds.
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
        .remove(CollectionKind::Cart, &identity(product, variant)?)
        .await?;
    if removed.is_none() {
        tracing::info!("Item was not in the cart");
    }
    changed(session, removed)
}

/// The cart after a change, with the recently added summary.
pub(super) fn changed(session: &Session, item: Option<LineItem>) -> Result<Value, CliError> {
    let state = session.service().state();
    let cart = state.snapshot(CollectionKind::Cart)?;
    let added = state.added()?;

    Ok(serde_json::to_value(ChangeView {
        item,
        collection: CollectionView::new(&cart),
        added: (!added.is_empty()).then(|| added.summary()),
    })?)
}
