//! Session state shared by the cart service and its views.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nova_cart_core::{
    AddedTracker, Collection, CollectionError, CollectionKind, CollectionSnapshot, ItemIdentity,
    ReconcileOutcome,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::config::LimitsConfig;
use crate::error::{AppError, Result};

/// A collection and an item in it.
pub type InFlightKey = (CollectionKind, ItemIdentity);

/// The shopper's cart, wishlist and recently added items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collections {
    pub cart: Collection,
    pub wishlist: Collection,
    pub added: AddedTracker,
}

impl Collections {
    #[must_use]
    pub const fn new(limits: &LimitsConfig) -> Self {
        Self {
            cart: Collection::new(CollectionKind::Cart, limits.for_kind(CollectionKind::Cart)),
            wishlist: Collection::new(
                CollectionKind::Wishlist,
                limits.for_kind(CollectionKind::Wishlist),
            ),
            added: AddedTracker::new(),
        }
    }

    #[must_use]
    pub const fn get(&self, kind: CollectionKind) -> &Collection {
        match kind {
            CollectionKind::Cart => &self.cart,
            CollectionKind::Wishlist => &self.wishlist,
        }
    }

    pub const fn get_mut(&mut self, kind: CollectionKind) -> &mut Collection {
        match kind {
            CollectionKind::Cart => &mut self.cart,
            CollectionKind::Wishlist => &mut self.wishlist,
        }
    }
}

/// Session state container.
///
/// Owns the collections, the registry of items with a change in flight, the
/// slots held by adds the server has not confirmed yet, and a revision counter that views watch to know when to re-render. Cheaply
/// cloneable via `Arc`; locks are never held across an `.await`.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<SessionStateInner>,
}

struct SessionStateInner {
    collections: Mutex<Collections>,
    in_flight: Mutex<HashSet<InFlightKey>>,
    reserved: Mutex<HashMap<CollectionKind, usize>>,
    revision: watch::Sender<u64>,
}

impl SessionState {
    #[must_use]
    pub fn new(limits: &LimitsConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(SessionStateInner {
                collections: Mutex::new(Collections::new(limits)),
                in_flight: Mutex::new(HashSet::new()),
                reserved: Mutex::new(HashMap::new()),
                revision,
            }),
        }
    }

    /// Read the collections.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a previous holder of the lock panicked.
    pub fn read<R>(&self, f: impl FnOnce(&Collections) -> R) -> Result<R> {
        Ok(f(&*self.lock_collections()?))
    }

    /// Modify the collections and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a previous holder of the lock panicked.
    pub fn update<R>(&self, f: impl FnOnce(&mut Collections) -> R) -> Result<R> {
        let result = f(&mut *self.lock_collections()?);
        self.bump();
        Ok(result)
    }

    /// Copy of one collection.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a previous holder of the lock panicked.
    pub fn snapshot(&self, kind: CollectionKind) -> Result<Collection> {
        self.read(|collections| collections.get(kind).clone())
    }

    /// Copy of the recently added items.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a previous holder of the lock panicked.
    pub fn added(&self) -> Result<AddedTracker> {
        self.read(|collections| collections.added.clone())
    }

    /// Apply a server-confirmed snapshot to one collection.
    ///
    /// With `keep_pending`, entries for other items that still have a change
    /// in flight keep their local value, since the snapshot may predate that
    /// change. `own` names the items of the mutation that produced the
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a previous holder of the lock panicked.
    pub fn reconcile(
        &self,
        kind: CollectionKind,
        snapshot: CollectionSnapshot,
        own: &[ItemIdentity],
        keep_pending: bool,
    ) -> Result<ReconcileOutcome> {
        let outcome = {
            // Lock order: collections, then in_flight.
            let mut collections = self.lock_collections()?;
            let collection = collections.get_mut(kind);

            let pending: Vec<_> = if keep_pending {
                self.lock_in_flight()?
                    .iter()
                    .filter(|(k, id)| *k == kind && !own.contains(id))
                    .map(|(_, id)| (id.clone(), collection.entry_with_position(id)))
                    .collect()
            } else {
                Vec::new()
            };

            let outcome = collection.reconcile(snapshot);
            if matches!(outcome, ReconcileOutcome::Applied { .. }) {
                for (identity, local) in pending {
                    if !collection.restore_entry(&identity, local) {
                        tracing::warn!(%kind, item = %identity, "No room to keep pending item");
                    }
                }
            }
            if kind == CollectionKind::Cart {
                let Collections { cart, added, .. } = &mut *collections;
                added.retain_in(cart);
            }
            outcome
        };
        self.bump();
        Ok(outcome)
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Mark items as having a change in flight.
    ///
    /// Either every key is registered or none is.
    ///
    /// # Errors
    ///
    /// Returns `Busy` with the first item that already has a change in
    /// flight.
    pub fn begin(&self, keys: Vec<InFlightKey>) -> Result<InFlightGuard> {
        {
            let mut in_flight = self.lock_in_flight()?;
            if let Some((_, identity)) = keys.iter().find(|key| in_flight.contains(*key)) {
                return Err(AppError::Busy(identity.clone()));
            }
            in_flight.extend(keys.iter().cloned());
        }
        self.bump();
        Ok(InFlightGuard {
            state: Arc::clone(&self.inner),
            keys,
        })
    }

    /// Hold a slot in a collection for an add that is not applied locally
    /// until the server confirms it.
    ///
    /// Held slots count against the capacity limit, so concurrent adds of
    /// different items cannot together overfill the collection.
    ///
    /// # Errors
    ///
    /// Returns `CollectionFull` if the items plus the held slots already
    /// reach the limit.
    pub fn reserve_slot(&self, kind: CollectionKind) -> Result<SlotReservation> {
        {
            // Lock order: collections, then reserved.
            let collections = self.lock_collections()?;
            let collection = collections.get(kind);
            let mut reserved = self
                .inner
                .reserved
                .lock()
                .map_err(|_| AppError::Internal("slot registry lock poisoned".to_string()))?;
            let held = reserved.entry(kind).or_default();
            if collection.len() + *held >= collection.limit() {
                return Err(CollectionError::CollectionFull {
                    kind,
                    limit: collection.limit(),
                }
                .into());
            }
            *held += 1;
        }
        Ok(SlotReservation {
            state: Arc::clone(&self.inner),
            kind,
        })
    }

    /// Number of slots held by unconfirmed adds.
    #[must_use]
    pub fn reserved_slots(&self, kind: CollectionKind) -> usize {
        self.inner
            .reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    /// Whether a change to this item is still being saved.
    #[must_use]
    pub fn is_pending(&self, kind: CollectionKind, identity: &ItemIdentity) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(k, id)| *k == kind && id == identity)
    }

    fn lock_collections(&self) -> Result<MutexGuard<'_, Collections>> {
        self.inner
            .collections
            .lock()
            .map_err(|_| AppError::Internal("session state lock poisoned".to_string()))
    }

    fn lock_in_flight(&self) -> Result<MutexGuard<'_, HashSet<InFlightKey>>> {
        self.inner
            .in_flight
            .lock()
            .map_err(|_| AppError::Internal("in-flight registry lock poisoned".to_string()))
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

/// Keeps items marked in flight until dropped.
#[must_use = "items stay in flight only while the guard is held"]
pub struct InFlightGuard {
    state: Arc<SessionStateInner>,
    keys: Vec<InFlightKey>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        {
            let mut in_flight = self
                .state
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for key in &self.keys {
                in_flight.remove(key);
            }
        }
        self.state
            .revision
            .send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

/// Holds one slot in a collection until dropped.
#[must_use = "the slot is held only while the reservation is"]
pub struct SlotReservation {
    state: Arc<SessionStateInner>,
    kind: CollectionKind,
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        let mut reserved = self
            .state
            .reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(held) = reserved.get_mut(&self.kind) {
            *held = held.saturating_sub(1);
        }
    }
}
