//! Ephemeral record of items added during the current view.
//!
//! Used for "just added" summaries only. It is never persisted and is not
//! consulted for capacity checks.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::item::{ItemIdentity, LineItem};
use super::list::Collection;
use crate::types::Price;

/// One recently added item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedEntry {
    pub identity: ItemIdentity,
    pub quantity: u32,
    pub unit_price: Price,
    pub added_at: DateTime<Utc>,
}

/// Totals over the tracked entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddedSummary {
    pub item_count: usize,
    pub total_quantity: u32,
    /// `None` when nothing is tracked or currencies are mixed.
    pub subtotal: Option<Price>,
}

/// Recently added items, most recent last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddedTracker {
    entries: Vec<AddedEntry>,
}

impl AddedTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Track `item`. Re-recording an identity updates its quantity and moves it
    /// to the end.
    pub fn record(&mut self, item: &LineItem, at: DateTime<Utc>) {
        self.forget(item.identity());
        self.entries.push(AddedEntry {
            identity: item.identity().clone(),
            quantity: item.quantity(),
            unit_price: item.unit_price(),
            added_at: at,
        });
    }

    /// Stop tracking an identity. Returns whether it was tracked.
    pub fn forget(&mut self, identity: &ItemIdentity) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.identity != identity);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop entries whose identity is no longer in `collection`.
    pub fn retain_in(&mut self, collection: &Collection) {
        self.entries
            .retain(|entry| collection.contains(&entry.identity));
    }

    #[must_use]
    pub fn entries(&self) -> &[AddedEntry] {
        &self.entries
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> AddedSummary {
        let mut lines = self
            .entries
            .iter()
            .map(|entry| entry.unit_price.times(entry.quantity));
        let subtotal = lines
            .next()
            .and_then(|first| lines.try_fold(first, |acc, line| acc.checked_add(&line)));

        AddedSummary {
            item_count: self.entries.len(),
            total_quantity: self
                .entries
                .iter()
                .fold(0u32, |acc, entry| acc.saturating_add(entry.quantity)),
            subtotal,
        }
    }
}
