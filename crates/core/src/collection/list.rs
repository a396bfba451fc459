//! The [`Collection`] container and its operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AddCheck, CollectionError, Rejection};
use super::item::{ItemIdentity, LineItem};
use super::{CollectionKind, DEFAULT_CAPACITY_LIMIT};
use crate::types::Price;

/// A server-confirmed copy of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub items: Vec<LineItem>,
    /// Version stamp from the server, when it provides one.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// What [`Collection::reconcile`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The snapshot replaced local state. `dropped` counts duplicate or
    /// over-capacity entries that were discarded.
    Applied { dropped: usize },
    /// The snapshot is older than what is already held and was ignored.
    Stale,
}

/// An ordered, capacity-limited list of unique line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    kind: CollectionKind,
    limit: usize,
    items: Vec<LineItem>,
    updated_at: Option<DateTime<Utc>>,
}

impl Collection {
    /// Create an empty collection with the given capacity.
    #[must_use]
    pub const fn new(kind: CollectionKind, limit: usize) -> Self {
        Self {
            kind,
            limit,
            items: Vec::new(),
            updated_at: None,
        }
    }

    /// Create an empty collection with [`DEFAULT_CAPACITY_LIMIT`].
    #[must_use]
    pub const fn with_default_limit(kind: CollectionKind) -> Self {
        Self::new(kind, DEFAULT_CAPACITY_LIMIT)
    }

    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        self.kind
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    /// Version stamp of the last applied server snapshot.
    #[must_use]
    pub const fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    #[must_use]
    pub fn position(&self, identity: &ItemIdentity) -> Option<usize> {
        self.items.iter().position(|item| item.identity() == identity)
    }

    #[must_use]
    pub fn entry(&self, identity: &ItemIdentity) -> Option<&LineItem> {
        self.items.iter().find(|item| item.identity() == identity)
    }

    #[must_use]
    pub fn contains(&self, identity: &ItemIdentity) -> bool {
        self.entry(identity).is_some()
    }

    /// The entry and its position, for restoring it later with
    /// [`Collection::restore_entry`].
    #[must_use]
    pub fn entry_with_position(&self, identity: &ItemIdentity) -> Option<(usize, LineItem)> {
        self.items
            .iter()
            .enumerate()
            .find(|(_, item)| item.identity() == identity)
            .map(|(index, item)| (index, item.clone()))
    }

    /// Check whether `identity` could be added.
    ///
    /// Duplicates are reported before capacity.
    #[must_use]
    pub fn can_add(&self, identity: &ItemIdentity) -> AddCheck {
        if self.contains(identity) {
            AddCheck::Rejected(Rejection::AlreadyExists)
        } else if self.is_full() {
            AddCheck::Rejected(Rejection::LimitReached)
        } else {
            AddCheck::Allowed
        }
    }

    /// Append an item.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateItem` if the identity is present, `CollectionFull`
    /// if the collection is at capacity.
    pub fn add(&mut self, item: LineItem) -> Result<(), CollectionError> {
        self.can_add(item.identity())
            .into_result(self.kind, self.limit, item.identity())?;
        self.items.push(item);
        Ok(())
    }

    /// Increment an item's quantity by one.
    ///
    /// `stock` is the number of units available, when known.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` if the identity is absent, `StockExceeded` if the
    /// new quantity would be above `stock`.
    pub fn increase_quantity(
        &mut self,
        identity: &ItemIdentity,
        stock: Option<u32>,
    ) -> Result<&LineItem, CollectionError> {
        let item = self.entry_mut(identity)?;
        let ceiling = stock.unwrap_or(u32::MAX);
        let next = item
            .quantity()
            .checked_add(1)
            .filter(|next| *next <= ceiling)
            .ok_or_else(|| CollectionError::StockExceeded {
                identity: identity.clone(),
                stock: ceiling,
            })?;
        item.set_quantity(next);
        Ok(&*item)
    }

    /// Decrement an item's quantity by one, never below 1.
    ///
    /// Removing an item is a separate operation.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` if the identity is absent.
    pub fn decrease_quantity(
        &mut self,
        identity: &ItemIdentity,
    ) -> Result<&LineItem, CollectionError> {
        let item = self.entry_mut(identity)?;
        let next = item.quantity().saturating_sub(1).max(1);
        item.set_quantity(next);
        Ok(&*item)
    }

    /// Remove an item. Removing an absent identity is a no-op.
    ///
    /// Returns the removed item, if there was one.
    pub fn remove(&mut self, identity: &ItemIdentity) -> Option<LineItem> {
        let index = self.position(identity)?;
        Some(self.items.remove(index))
    }

    /// Put one identity back to an earlier state without touching any other
    /// entry.
    ///
    /// `previous` is what [`Collection::entry_with_position`] returned before
    /// the change: `None` removes the identity, `Some` puts the old entry back
    /// in place (or at its old position if it was removed). Returns `false`
    /// if the entry could not be reinserted because the collection has filled
    /// up in the meantime.
    pub fn restore_entry(
        &mut self,
        identity: &ItemIdentity,
        previous: Option<(usize, LineItem)>,
    ) -> bool {
        let Some((index, item)) = previous else {
            self.remove(identity);
            return true;
        };

        if let Some(current) = self
            .items
            .iter_mut()
            .find(|current| current.identity() == identity)
        {
            *current = item;
            return true;
        }

        if self.is_full() {
            return false;
        }
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        true
    }

    /// Sum of line totals, or `None` when empty or when items are priced in
    /// different currencies.
    #[must_use]
    pub fn subtotal(&self) -> Option<Price> {
        let mut lines = self.items.iter().map(LineItem::line_total);
        let first = lines.next()?;
        lines.try_fold(first, |acc, line| acc.checked_add(&line))
    }

    /// Total units across all items.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity()))
    }

    /// Apply a server-confirmed snapshot.
    ///
    /// When both sides carry a version stamp, an older snapshot is ignored;
    /// otherwise the snapshot wins. Duplicate identities keep their first
    /// occurrence and entries past the capacity limit are dropped.
    pub fn reconcile(&mut self, snapshot: CollectionSnapshot) -> ReconcileOutcome {
        if let (Some(local), Some(remote)) = (self.updated_at, snapshot.updated_at)
            && remote < local
        {
            return ReconcileOutcome::Stale;
        }

        let received = snapshot.items.len();
        let mut items: Vec<LineItem> = Vec::with_capacity(received.min(self.limit));
        for item in snapshot.items {
            if items.len() >= self.limit {
                break;
            }
            if items.iter().any(|kept| kept.identity() == item.identity()) {
                continue;
            }
            items.push(item);
        }

        let dropped = received - items.len();
        self.items = items;
        self.updated_at = snapshot.updated_at.or(self.updated_at);
        ReconcileOutcome::Applied { dropped }
    }

    fn entry_mut(&mut self, identity: &ItemIdentity) -> Result<&mut LineItem, CollectionError> {
        self.items
            .iter_mut()
            .find(|item| item.identity() == identity)
            .ok_or_else(|| CollectionError::ItemNotFound(identity.clone()))
    }
}
