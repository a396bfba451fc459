//! Moving items between collections.

use super::CollectionKind;
use super::error::CollectionError;
use super::item::{ItemIdentity, LineItem};
use super::list::Collection;

/// Move a wishlist entry into the cart with quantity 1.
///
/// Either both collections change or neither does: a rejected cart add leaves
/// the wishlist entry in place. Returns the line item that was added to the
/// cart.
///
/// # Errors
///
/// Returns `ItemNotFound` if the wishlist has no such entry, or whatever the
/// cart add is rejected with (`DuplicateItem`, `CollectionFull`).
///
/// # Panics
///
/// Debug builds panic if the collections are passed the wrong way round.
pub fn move_to_cart(
    wishlist: &mut Collection,
    cart: &mut Collection,
    identity: &ItemIdentity,
) -> Result<LineItem, CollectionError> {
    debug_assert_eq!(wishlist.kind(), CollectionKind::Wishlist);
    debug_assert_eq!(cart.kind(), CollectionKind::Cart);

    let moved = wishlist
        .entry(identity)
        .map(LineItem::with_single_quantity)
        .ok_or_else(|| CollectionError::ItemNotFound(identity.clone()))?;

    cart.add(moved.clone())?;
    wishlist.remove(identity);
    Ok(moved)
}
