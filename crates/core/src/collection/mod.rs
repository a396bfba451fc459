//! Cart and wishlist collections.
//!
//! A collection is an ordered list of [`LineItem`]s with two invariants:
//!
//! - no two items share an [`ItemIdentity`]
//! - the number of items never exceeds the collection's capacity limit
//!
//! Every operation here is a synchronous transformation with no I/O. Failed
//! operations return a [`CollectionError`] and leave the collection as it was.
//! Keeping local state in line with the remote copy is the job of the caller,
//! which feeds server responses back through [`Collection::reconcile`].

mod added;
mod error;
mod item;
mod list;
mod transfer;

#[cfg(test)]
mod properties;

pub use added::{AddedEntry, AddedSummary, AddedTracker};
pub use error::{AddCheck, CollectionError, Rejection};
pub use item::{ItemIdentity, LineItem, LineItemError};
pub use list::{Collection, CollectionSnapshot, ReconcileOutcome};
pub use transfer::move_to_cart;

use serde::{Deserialize, Serialize};

/// Capacity used for both the cart and the wishlist unless configured.
pub const DEFAULT_CAPACITY_LIMIT: usize = 10;

/// Which collection an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Cart,
    Wishlist,
}

impl CollectionKind {
    /// Lowercase name, also used as the remote path segment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cart" => Ok(Self::Cart),
            "wishlist" => Ok(Self::Wishlist),
            _ => Err(format!("invalid collection kind: {s}")),
        }
    }
}
