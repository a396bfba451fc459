//! Cart and wishlist orchestration.
//!
//! [`CartService`] turns a shopper action into a guarded local change plus a
//! remote call, and keeps the session state consistent with what the server
//! confirms.
//!
//! # Sync modes
//!
//! - **Optimistic**: the change is applied to the session first so views
//!   update immediately. If the remote call fails, the affected item (and
//!   only that item) is restored to its previous entry.
//! - **Pessimistic**: the change is validated against a copy, sent, and the
//!   session only ever shows server-confirmed snapshots. `is_pending` drives
//!   the loading indicator.
//!
//! In both modes a second change to an item whose first change is still in
//! flight is rejected with `Busy`, every remote call is bounded by the
//! configured timeout, and a retryable failure is retried exactly once after
//! a short jittered backoff. Pessimistic adds hold a slot in the collection
//! until the server answers, so concurrent adds cannot overfill it.
//!
//! The remote half of a change runs on a spawned task. Dropping the future
//! returned by an operation does not cancel the request; the session still
//! ends up confirmed or rolled back.

use std::future::Future;
use std::slice;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nova_cart_core::{
    Collection, CollectionError, CollectionKind, CollectionSnapshot, ItemIdentity, LineItem,
};
use rand::Rng;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::CatalogService;
use crate::config::{SyncConfig, SyncMode};
use crate::error::{AppError, Result};
use crate::remote::{PersistenceService, RemoteError};
use crate::state::SessionState;

/// A local change to one item.
#[derive(Debug, Clone)]
enum Mutation {
    Add(LineItem),
    Increase { stock: Option<u32> },
    Decrease,
    Remove,
}

/// The remote request that makes a local change durable.
#[derive(Debug, Clone)]
enum RemoteCall {
    Fetch,
    Create(LineItem),
    UpdateQuantity(ItemIdentity, u32),
    Delete(ItemIdentity),
}

/// Outcome of applying a [`Mutation`] locally.
#[derive(Debug)]
struct Change {
    /// `None` when nothing changed and there is nothing to send.
    call: Option<RemoteCall>,
    /// The item after the change, or the removed item.
    entry: Option<LineItem>,
}

fn apply(
    collection: &mut Collection,
    identity: &ItemIdentity,
    mutation: Mutation,
) -> std::result::Result<Change, CollectionError> {
    match mutation {
        Mutation::Add(item) => {
            collection.add(item.clone())?;
            Ok(Change {
                call: Some(RemoteCall::Create(item.clone())),
                entry: Some(item),
            })
        }
        Mutation::Increase { stock } => {
            let item = collection.increase_quantity(identity, stock)?.clone();
            Ok(Change {
                call: Some(RemoteCall::UpdateQuantity(
                    identity.clone(),
                    item.quantity(),
                )),
                entry: Some(item),
            })
        }
        Mutation::Decrease => {
            let before = collection
                .entry(identity)
                .map(LineItem::quantity)
                .ok_or_else(|| CollectionError::ItemNotFound(identity.clone()))?;
            let item = collection.decrease_quantity(identity)?.clone();
            // Already at the floor.
            let call = (item.quantity() != before)
                .then(|| RemoteCall::UpdateQuantity(identity.clone(), item.quantity()));
            Ok(Change {
                call,
                entry: Some(item),
            })
        }
        Mutation::Remove => {
            let removed = collection.remove(identity);
            Ok(Change {
                call: removed
                    .is_some()
                    .then(|| RemoteCall::Delete(identity.clone())),
                entry: removed,
            })
        }
    }
}

/// Delay before the single retry of a failed call.
///
/// The base backoff plus up to half of it again as jitter, raised to the
/// server's `Retry-After` when rate limited, and never longer than one
/// request timeout.
fn retry_delay(sync: &SyncConfig, err: &RemoteError) -> Duration {
    let base = sync.retry_backoff;
    let max_jitter = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
    let jitter = Duration::from_millis(rand::rng().random_range(0..=max_jitter));
    let mut delay = base.saturating_add(jitter);
    if let RemoteError::RateLimited(secs) = err {
        delay = delay.max(Duration::from_secs(*secs));
    }
    delay.min(sync.request_timeout)
}

// =============================================================================
// CartService
// =============================================================================

/// Cart and wishlist operations for one shopper session.
///
/// Cheaply cloneable via `Arc`; clones share the session state and clients.
pub struct CartService<P, C> {
    inner: Arc<CartServiceInner<P, C>>,
}

struct CartServiceInner<P, C> {
    state: SessionState,
    remote: P,
    catalog: C,
    sync: SyncConfig,
}

impl<P, C> Clone for CartService<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Run the remote half of a change on its own task and wait for it.
///
/// The task owns the in-flight guard, so a caller that stops waiting does
/// not cancel the request: the item stays pending until the session shows
/// either the confirmed or the rolled-back state.
async fn detach<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(task.in_current_span())
        .await
        .map_err(|e| AppError::Internal(format!("sync task failed: {e}")))?
}

impl<P, C> CartService<P, C>
where
    P: PersistenceService + 'static,
    C: CatalogService + 'static,
{
    #[must_use]
    pub fn new(state: SessionState, remote: P, catalog: C, sync: SyncConfig) -> Self {
        Self {
            inner: Arc::new(CartServiceInner {
                state,
                remote,
                catalog,
                sync,
            }),
        }
    }

    /// The session state this service updates.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.inner.state
    }

    fn is_optimistic(&self) -> bool {
        self.inner.sync.mode == SyncMode::Optimistic
    }

    /// Fetch both collections from the server and replace local state.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncFailed` if either fetch fails.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<()> {
        let (cart, wishlist) = tokio::join!(
            self.call_remote(CollectionKind::Cart, &RemoteCall::Fetch, Uuid::new_v4()),
            self.call_remote(CollectionKind::Wishlist, &RemoteCall::Fetch, Uuid::new_v4()),
        );
        let cart = cart.map_err(|source| AppError::RemoteSyncFailed {
            kind: CollectionKind::Cart,
            source,
        })?;
        let wishlist = wishlist.map_err(|source| AppError::RemoteSyncFailed {
            kind: CollectionKind::Wishlist,
            source,
        })?;

        let keep_pending = self.is_optimistic();
        let state = self.state();
        state.reconcile(CollectionKind::Cart, cart, &[], keep_pending)?;
        state.reconcile(CollectionKind::Wishlist, wishlist, &[], keep_pending)?;

        info!("Collections loaded");
        Ok(())
    }

    /// Add one unit of a product (or variant) to the cart.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateItem` or `CollectionFull` if the cart rejects the
    /// item, `StockExceeded` if it is sold out, `Catalog` if it cannot be
    /// priced, `Busy`, `RemoteSyncFailed` or `Unconfirmed`.
    pub async fn add_to_cart(&self, identity: ItemIdentity) -> Result<LineItem> {
        self.add(CollectionKind::Cart, identity).await
    }

    /// Save a product (or variant) to the wishlist.
    ///
    /// # Errors
    ///
    /// As [`CartService::add_to_cart`], except that sold-out items are
    /// accepted.
    pub async fn add_to_wishlist(&self, identity: ItemIdentity) -> Result<LineItem> {
        self.add(CollectionKind::Wishlist, identity).await
    }

    #[instrument(skip(self, identity), fields(kind = %kind, item = %identity))]
    async fn add(&self, kind: CollectionKind, identity: ItemIdentity) -> Result<LineItem> {
        // Reject early so a full or duplicate add costs no catalog lookup.
        self.state().read(|c| {
            let collection = c.get(kind);
            collection
                .can_add(&identity)
                .into_result(kind, collection.limit(), &identity)
        })??;

        let catalog = &self.inner.catalog;
        let variant = catalog
            .get_variant(&identity.product_id, identity.variant_id.as_ref())
            .await?;
        if kind == CollectionKind::Cart && !variant.in_stock() {
            // Let the next attempt see a restock.
            catalog.invalidate(&identity.product_id).await;
            return Err(CollectionError::StockExceeded { identity, stock: 0 }.into());
        }

        let item = LineItem::single(identity.clone(), variant.price);
        let added = self.mutate(kind, &identity, Mutation::Add(item)).await?;
        added.ok_or_else(|| AppError::Unconfirmed { kind, identity })
    }

    /// Add one unit, up to the stock the catalog currently reports.
    ///
    /// Stock is read past the product cache. If the catalog is unreachable
    /// the increase goes ahead unbounded and the server has the final say.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound`, `StockExceeded`, `Catalog` for an unknown
    /// product, `Busy`, `RemoteSyncFailed` or `Unconfirmed`.
    #[instrument(skip(self, identity), fields(kind = %kind, item = %identity))]
    pub async fn increase_quantity(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
    ) -> Result<LineItem> {
        if !self.state().read(|c| c.get(kind).contains(identity))? {
            return Err(CollectionError::ItemNotFound(identity.clone()).into());
        }

        let catalog = &self.inner.catalog;
        catalog.invalidate(&identity.product_id).await;
        let stock = match catalog
            .get_variant(&identity.product_id, identity.variant_id.as_ref())
            .await
        {
            Ok(variant) => variant.stock,
            Err(e) if e.is_not_found() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Stock lookup failed, not enforcing a ceiling");
                None
            }
        };

        self.mutate(kind, identity, Mutation::Increase { stock })
            .await?
            .ok_or_else(|| CollectionError::ItemNotFound(identity.clone()).into())
    }

    /// Remove one unit. An item already at quantity 1 stays at 1.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound`, `Busy`, `RemoteSyncFailed` or `Unconfirmed`.
    #[instrument(skip(self, identity), fields(kind = %kind, item = %identity))]
    pub async fn decrease_quantity(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
    ) -> Result<LineItem> {
        self.mutate(kind, identity, Mutation::Decrease)
            .await?
            .ok_or_else(|| CollectionError::ItemNotFound(identity.clone()).into())
    }

    /// Remove an item. Removing an absent item is a no-op.
    ///
    /// Returns the removed item, if there was one.
    ///
    /// # Errors
    ///
    /// Returns `Busy` or `RemoteSyncFailed`.
    #[instrument(skip(self, identity), fields(kind = %kind, item = %identity))]
    pub async fn remove(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
    ) -> Result<Option<LineItem>> {
        self.mutate(kind, identity, Mutation::Remove).await
    }

    /// Forget the recently added items.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the session state is unusable.
    pub fn clear_added(&self) -> Result<()> {
        self.state().update(|c| c.added.clear())
    }

    /// Guarded local change plus remote call for a single item.
    async fn mutate(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        mutation: Mutation,
    ) -> Result<Option<LineItem>> {
        let state = self.state();
        let guard = state.begin(vec![(kind, identity.clone())])?;
        let adds = matches!(mutation, Mutation::Add(_));
        let tracks_added = kind == CollectionKind::Cart
            && (adds || matches!(mutation, Mutation::Increase { .. }));

        let (previous, change, slot) = if self.is_optimistic() {
            let (previous, change) = state.update(|c| {
                let collection = c.get_mut(kind);
                let previous = collection.entry_with_position(identity);
                apply(collection, identity, mutation).map(|change| (previous, change))
            })??;
            (previous, change, None)
        } else {
            let mut scratch = state.snapshot(kind)?;
            let change = apply(&mut scratch, identity, mutation)?;
            // Not applied locally until confirmed, so hold its place.
            let slot = if adds {
                Some(state.reserve_slot(kind)?)
            } else {
                None
            };
            (None, change, slot)
        };

        let Some(call) = change.call else {
            debug!("Nothing to sync");
            return Ok(change.entry);
        };

        let service = self.clone();
        let identity = identity.clone();
        let entry = change.entry;
        detach(async move {
            let _held = (guard, slot);
            service
                .settle(kind, &identity, call, entry, previous, tracks_added)
                .await
        })
        .await
    }

    /// Send a change and make the session show its outcome.
    async fn settle(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        call: RemoteCall,
        entry: Option<LineItem>,
        previous: Option<(usize, LineItem)>,
        tracks_added: bool,
    ) -> Result<Option<LineItem>> {
        let optimistic = self.is_optimistic();
        let snapshot = match self.call_remote(kind, &call, Uuid::new_v4()).await {
            Ok(snapshot) => snapshot,
            Err(source) => {
                if optimistic {
                    self.roll_back(kind, identity, previous)?;
                }
                warn!(error = %source, "Change not saved");
                return Err(AppError::RemoteSyncFailed { kind, source });
            }
        };

        let outcome =
            self.state()
                .reconcile(kind, snapshot, slice::from_ref(identity), optimistic)?;
        debug!(?outcome, "Reconciled");

        if matches!(call, RemoteCall::Delete(_)) {
            info!("Change confirmed");
            return Ok(entry);
        }

        let confirmed = self.state().update(|c| {
            let confirmed = c.get(kind).entry(identity).cloned();
            if tracks_added && let Some(item) = &confirmed {
                c.added.record(item, Utc::now());
            }
            confirmed
        })?;

        match confirmed {
            Some(item) => {
                info!("Change confirmed");
                Ok(Some(item))
            }
            None => {
                warn!("Server answer is missing the item");
                Err(AppError::Unconfirmed {
                    kind,
                    identity: identity.clone(),
                })
            }
        }
    }

    fn roll_back(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        previous: Option<(usize, LineItem)>,
    ) -> Result<()> {
        let restored = self
            .state()
            .update(|c| c.get_mut(kind).restore_entry(identity, previous))?;
        if !restored {
            warn!(%kind, item = %identity, "Could not restore item, collection is full");
        }
        Ok(())
    }

    /// Move a wishlist item into the cart.
    ///
    /// The cart item is created first and the wishlist item deleted second.
    /// If the delete fails, the cart item is deleted again so the item ends up
    /// in exactly one place.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` if the wishlist lacks the item, `DuplicateItem`
    /// or `CollectionFull` if the cart rejects it, `Busy`, `RemoteSyncFailed`
    /// or `Unconfirmed`.
    #[instrument(skip(self, identity), fields(item = %identity))]
    pub async fn move_to_cart(&self, identity: &ItemIdentity) -> Result<LineItem> {
        let state = self.state();
        let guard = state.begin(vec![
            (CollectionKind::Wishlist, identity.clone()),
            (CollectionKind::Cart, identity.clone()),
        ])?;

        let (wishlist_entry, moved, slot) = if self.is_optimistic() {
            let (wishlist_entry, moved) = state.update(|c| {
                let wishlist_entry = c.wishlist.entry_with_position(identity);
                nova_cart_core::move_to_cart(&mut c.wishlist, &mut c.cart, identity)
                    .map(|moved| (wishlist_entry, moved))
            })??;
            (wishlist_entry, moved, None)
        } else {
            let (mut wishlist, mut cart) = state.read(|c| (c.wishlist.clone(), c.cart.clone()))?;
            let moved = nova_cart_core::move_to_cart(&mut wishlist, &mut cart, identity)?;
            let slot = state.reserve_slot(CollectionKind::Cart)?;
            (None, moved, Some(slot))
        };

        let service = self.clone();
        let identity = identity.clone();
        detach(async move {
            let _held = (guard, slot);
            service.settle_move(&identity, moved, wishlist_entry).await
        })
        .await
    }

    /// Remote half of [`CartService::move_to_cart`].
    async fn settle_move(
        &self,
        identity: &ItemIdentity,
        moved: LineItem,
        wishlist_entry: Option<(usize, LineItem)>,
    ) -> Result<LineItem> {
        let optimistic = self.is_optimistic();
        let state = self.state();
        let own = slice::from_ref(identity);

        let cart_snapshot = match self
            .call_remote(
                CollectionKind::Cart,
                &RemoteCall::Create(moved),
                Uuid::new_v4(),
            )
            .await
        {
            Ok(snapshot) => snapshot,
            Err(source) => {
                if optimistic {
                    self.roll_back_move(identity, wishlist_entry)?;
                }
                warn!(error = %source, "Move not saved");
                return Err(AppError::RemoteSyncFailed {
                    kind: CollectionKind::Cart,
                    source,
                });
            }
        };

        let delete = RemoteCall::Delete(identity.clone());
        match self
            .call_remote(CollectionKind::Wishlist, &delete, Uuid::new_v4())
            .await
        {
            Ok(wishlist_snapshot) => {
                state.reconcile(CollectionKind::Cart, cart_snapshot, own, optimistic)?;
                state.reconcile(
                    CollectionKind::Wishlist,
                    wishlist_snapshot,
                    own,
                    optimistic,
                )?;
                let confirmed = state.update(|c| {
                    let confirmed = c.cart.entry(identity).cloned();
                    if let Some(item) = &confirmed {
                        c.added.record(item, Utc::now());
                    }
                    confirmed
                })?;
                confirmed.map_or_else(
                    || {
                        warn!("Server cart is missing the moved item");
                        Err(AppError::Unconfirmed {
                            kind: CollectionKind::Cart,
                            identity: identity.clone(),
                        })
                    },
                    |item| {
                        info!("Moved to cart");
                        Ok(item)
                    },
                )
            }
            Err(source) => {
                warn!(error = %source, "Wishlist delete failed, undoing cart add");
                match self
                    .call_remote(CollectionKind::Cart, &delete, Uuid::new_v4())
                    .await
                {
                    Ok(cart_snapshot) => {
                        if optimistic {
                            self.roll_back_move(identity, wishlist_entry)?;
                        }
                        state.reconcile(CollectionKind::Cart, cart_snapshot, own, optimistic)?;
                    }
                    Err(e) => {
                        // The server now has the item in both collections.
                        error!(error = %e, "Could not undo cart add after failed move");
                        state.reconcile(CollectionKind::Cart, cart_snapshot, own, optimistic)?;
                        if optimistic {
                            let restored = state
                                .update(|c| c.wishlist.restore_entry(identity, wishlist_entry))?;
                            if !restored {
                                warn!("Could not restore wishlist item");
                            }
                        }
                    }
                }
                Err(AppError::RemoteSyncFailed {
                    kind: CollectionKind::Wishlist,
                    source,
                })
            }
        }
    }

    fn roll_back_move(
        &self,
        identity: &ItemIdentity,
        wishlist_entry: Option<(usize, LineItem)>,
    ) -> Result<()> {
        let restored = self.state().update(|c| {
            c.cart.remove(identity);
            c.wishlist.restore_entry(identity, wishlist_entry)
        })?;
        if !restored {
            warn!(item = %identity, "Could not restore wishlist item, wishlist is full");
        }
        Ok(())
    }

    /// Send a request, bounded by the timeout and retried once if the
    /// failure is retryable. Both attempts carry the same `request_id`.
    async fn call_remote(
        &self,
        kind: CollectionKind,
        call: &RemoteCall,
        request_id: Uuid,
    ) -> std::result::Result<CollectionSnapshot, RemoteError> {
        match self.send(kind, call, request_id).await {
            Err(e) if e.is_retryable() => {
                let delay = retry_delay(&self.inner.sync, &e);
                warn!(
                    error = %e,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Remote call failed, retrying once"
                );
                tokio::time::sleep(delay).await;
                self.send(kind, call, request_id).await
            }
            other => other,
        }
    }

    async fn send(
        &self,
        kind: CollectionKind,
        call: &RemoteCall,
        request_id: Uuid,
    ) -> std::result::Result<CollectionSnapshot, RemoteError> {
        let remote = &self.inner.remote;
        let request = async {
            match call {
                RemoteCall::Fetch => remote.fetch(kind).await,
                RemoteCall::Create(item) => remote.create_item(kind, item, request_id).await,
                RemoteCall::UpdateQuantity(identity, quantity) => {
                    remote
                        .update_quantity(kind, identity, *quantity, request_id)
                        .await
                }
                RemoteCall::Delete(identity) => remote.delete_item(kind, identity, request_id).await,
            }
        };

        let timeout = self.inner.sync.request_timeout;
        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| RemoteError::Timeout(timeout))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nova_cart_core::{CurrencyCode, Price};

    use super::*;

    fn id(product: &str) -> ItemIdentity {
        ItemIdentity::parse(product, None).unwrap()
    }

    fn item(product: &str, quantity: u32) -> LineItem {
        LineItem::new(
            id(product),
            quantity,
            Price::from_cents(999, CurrencyCode::USD).unwrap(),
        )
        .unwrap()
    }

    fn cart_with(items: &[LineItem]) -> Collection {
        let mut cart = Collection::with_default_limit(CollectionKind::Cart);
        for item in items {
            cart.add(item.clone()).unwrap();
        }
        cart
    }

    #[test]
    fn test_decrease_at_floor_sends_nothing() {
        let mut cart = cart_with(&[item("p1", 1)]);
        let change = apply(&mut cart, &id("p1"), Mutation::Decrease).unwrap();
        assert!(change.call.is_none());
        assert_eq!(change.entry.unwrap().quantity(), 1);
    }

    #[test]
    fn test_decrease_sends_new_quantity() {
        let mut cart = cart_with(&[item("p1", 3)]);
        let change = apply(&mut cart, &id("p1"), Mutation::Decrease).unwrap();
        assert!(matches!(change.call, Some(RemoteCall::UpdateQuantity(_, 2))));
    }

    #[test]
    fn test_remove_absent_sends_nothing() {
        let mut cart = cart_with(&[item("p1", 1)]);
        let change = apply(&mut cart, &id("p2"), Mutation::Remove).unwrap();
        assert!(change.call.is_none());
        assert!(change.entry.is_none());
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_increase_past_stock_is_rejected() {
        let mut cart = cart_with(&[item("p1", 2)]);
        let err = apply(
            &mut cart,
            &id("p1"),
            Mutation::Increase { stock: Some(2) },
        )
        .unwrap_err();
        assert_eq!(
            err,
            CollectionError::StockExceeded {
                identity: id("p1"),
                stock: 2
            }
        );
    }

    #[test]
    fn test_retry_delay_bounds() {
        let sync = SyncConfig {
            mode: SyncMode::Optimistic,
            request_timeout: Duration::from_secs(2),
            retry_backoff: Duration::from_millis(100),
        };

        let delay = retry_delay(&sync, &RemoteError::Timeout(Duration::from_secs(2)));
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(150));

        // Retry-After is honoured but capped at the request timeout.
        let delay = retry_delay(&sync, &RemoteError::RateLimited(30));
        assert_eq!(delay, Duration::from_secs(2));
    }
}
