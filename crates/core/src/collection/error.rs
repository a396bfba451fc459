//! Business-rule outcomes of collection operations.

use thiserror::Error;

use super::CollectionKind;
use super::item::ItemIdentity;

/// Expected rejections of collection operations.
///
/// These are recoverable at the call site; the collection is left unchanged
/// whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// The identity is already present.
    #[error("{0} is already in the collection")]
    DuplicateItem(ItemIdentity),

    /// The collection holds `limit` items already.
    #[error("{kind} is full ({limit} items)")]
    CollectionFull {
        /// Which collection rejected the add.
        kind: CollectionKind,
        /// Configured capacity.
        limit: usize,
    },

    /// No entry with this identity exists.
    #[error("{0} is not in the collection")]
    ItemNotFound(ItemIdentity),

    /// Increasing the quantity would exceed available stock.
    #[error("only {stock} of {identity} in stock")]
    StockExceeded {
        /// Item whose quantity was to be increased.
        identity: ItemIdentity,
        /// Units available.
        stock: u32,
    },
}

/// Why an add would be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyExists,
    LimitReached,
}

/// Result of checking whether an identity may be added to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddCheck {
    Allowed,
    Rejected(Rejection),
}

impl AddCheck {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Convert into the error an `add` would return.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateItem` or `CollectionFull` for a rejected check.
    pub fn into_result(
        self,
        kind: CollectionKind,
        limit: usize,
        identity: &ItemIdentity,
    ) -> Result<(), CollectionError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Rejected(Rejection::AlreadyExists) => {
                Err(CollectionError::DuplicateItem(identity.clone()))
            }
            Self::Rejected(Rejection::LimitReached) => {
                Err(CollectionError::CollectionFull { kind, limit })
            }
        }
    }
}
