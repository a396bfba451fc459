//! Integration tests for Nova-Cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p nova-cart-integration-tests
//! ```
//!
//! The tests drive [`CartService`] against in-memory stand-ins for the
//! remote persistence service and the product catalog, so they need no
//! network. [`FakeRemote`] can be told to fail, stall or answer with an old
//! snapshot for a specific call.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use nova_cart_core::{
    CollectionKind, CollectionSnapshot, CurrencyCode, ItemIdentity, LineItem, Price, ProductId,
    VariantId, VariantSnapshot,
};
use nova_cart_storefront::catalog::{CatalogError, CatalogService};
use nova_cart_storefront::config::{LimitsConfig, SyncConfig, SyncMode};
use nova_cart_storefront::remote::{PersistenceService, RemoteError};
use nova_cart_storefront::services::CartService;
use nova_cart_storefront::state::SessionState;
use uuid::Uuid;

/// Service under test.
pub type TestService = CartService<FakeRemote, FakeCatalog>;

/// Price every fake product sells for.
pub const UNIT_PRICE_CENTS: i64 = 1000;

/// Timeout used by [`sync_config`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(200);

/// Install a test log writer. Safe to call from every test.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("nova_cart_storefront=debug")
        .with_test_writer()
        .try_init();
}

#[must_use]
pub fn id(product: &str) -> ItemIdentity {
    ItemIdentity::parse(product, None).unwrap()
}

#[must_use]
pub fn variant(product: &str, variant: &str) -> ItemIdentity {
    ItemIdentity::parse(product, Some(variant)).unwrap()
}

#[must_use]
pub fn unit_price() -> Price {
    Price::from_cents(UNIT_PRICE_CENTS, CurrencyCode::USD).unwrap()
}

#[must_use]
pub fn item(identity: ItemIdentity, quantity: u32) -> LineItem {
    LineItem::new(identity, quantity, unit_price()).unwrap()
}

/// Short timeouts so failure paths finish quickly.
#[must_use]
pub const fn sync_config(mode: SyncMode) -> SyncConfig {
    SyncConfig {
        mode,
        request_timeout: REQUEST_TIMEOUT,
        retry_backoff: Duration::from_millis(10),
    }
}

/// A service over fresh fakes, with handles to the fakes.
#[must_use]
pub fn service(mode: SyncMode) -> (TestService, FakeRemote, FakeCatalog) {
    init_logging();
    let remote = FakeRemote::new();
    let catalog = FakeCatalog::new();
    let state = SessionState::new(&LimitsConfig::default());
    let service = CartService::new(state, remote.clone(), catalog.clone(), sync_config(mode));
    (service, remote, catalog)
}

// =============================================================================
// FakeRemote
// =============================================================================

/// Remote operation, for targeting faults and counting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Fetch,
    Create,
    Update,
    Delete,
}

/// How a targeted call misbehaves.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail with this HTTP status without touching the store.
    Status(u16),
    /// Fail with a rate limit.
    RateLimited(u64),
    /// Wait this long before handling the call.
    Delay(Duration),
    /// Apply the call but answer with a snapshot stamped in the past.
    StaleResponse,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CollectionKind,
    pub op: Op,
    pub request_id: Option<Uuid>,
}

#[derive(Default)]
struct Store {
    cart: Vec<LineItem>,
    wishlist: Vec<LineItem>,
    version: i64,
    faults: Vec<(CollectionKind, Op, Fault)>,
    calls: Vec<Call>,
}

impl Store {
    fn items_mut(&mut self, kind: CollectionKind) -> &mut Vec<LineItem> {
        match kind {
            CollectionKind::Cart => &mut self.cart,
            CollectionKind::Wishlist => &mut self.wishlist,
        }
    }

    fn snapshot(&mut self, kind: CollectionKind) -> CollectionSnapshot {
        self.version += 1;
        CollectionSnapshot {
            items: self.items_mut(kind).clone(),
            updated_at: Some(stamp(self.version)),
        }
    }

    fn take_fault(&mut self, kind: CollectionKind, op: Op) -> Option<Fault> {
        let index = self
            .faults
            .iter()
            .position(|(k, o, _)| *k == kind && *o == op)?;
        Some(self.faults.remove(index).2)
    }
}

fn stamp(version: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + version, 0).unwrap()
}

/// In-memory remote persistence service.
///
/// Each successful call bumps a version counter used as `updated_at`.
#[derive(Clone, Default)]
pub struct FakeRemote {
    store: Arc<Mutex<Store>>,
}

impl FakeRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put items straight into the remote store.
    pub fn seed(&self, kind: CollectionKind, items: Vec<LineItem>) {
        *self.store.lock().unwrap().items_mut(kind) = items;
    }

    /// Make the next matching call misbehave. Faults queue up in order.
    pub fn fail_next(&self, kind: CollectionKind, op: Op, fault: Fault) {
        self.store.lock().unwrap().faults.push((kind, op, fault));
    }

    /// What the server currently holds.
    #[must_use]
    pub fn items(&self, kind: CollectionKind) -> Vec<LineItem> {
        self.store.lock().unwrap().items_mut(kind).clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.store.lock().unwrap().calls.clone()
    }

    /// Number of calls of one kind, including failed attempts.
    #[must_use]
    pub fn count(&self, kind: CollectionKind, op: Op) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.kind == kind && call.op == op)
            .count()
    }

    /// Number of mutating calls, including failed attempts.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.op != Op::Fetch)
            .count()
    }

    async fn handle(
        &self,
        kind: CollectionKind,
        op: Op,
        request_id: Option<Uuid>,
        apply: impl FnOnce(&mut Vec<LineItem>) -> Result<(), RemoteError> + Send,
    ) -> Result<CollectionSnapshot, RemoteError> {
        let fault = {
            let mut store = self.store.lock().unwrap();
            store.calls.push(Call {
                kind,
                op,
                request_id,
            });
            store.take_fault(kind, op)
        };

        let stale = match fault {
            Some(Fault::Status(status)) => {
                return Err(RemoteError::Status {
                    status,
                    body: "injected".to_string(),
                });
            }
            Some(Fault::RateLimited(secs)) => return Err(RemoteError::RateLimited(secs)),
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                false
            }
            Some(Fault::StaleResponse) => true,
            None => false,
        };

        let mut store = self.store.lock().unwrap();
        apply(store.items_mut(kind))?;
        let mut snapshot = store.snapshot(kind);
        if stale {
            snapshot.updated_at = Some(stamp(0));
        }
        Ok(snapshot)
    }
}

fn not_found(identity: &ItemIdentity) -> RemoteError {
    RemoteError::Status {
        status: 404,
        body: format!("{identity} not found"),
    }
}

impl PersistenceService for FakeRemote {
    async fn fetch(&self, kind: CollectionKind) -> Result<CollectionSnapshot, RemoteError> {
        self.handle(kind, Op::Fetch, None, |_| Ok(())).await
    }

    async fn create_item(
        &self,
        kind: CollectionKind,
        item: &LineItem,
        request_id: Uuid,
    ) -> Result<CollectionSnapshot, RemoteError> {
        let item = item.clone();
        self.handle(kind, Op::Create, Some(request_id), move |items| {
            if items.iter().any(|i| i.identity() == item.identity()) {
                return Err(RemoteError::Status {
                    status: 409,
                    body: "duplicate".to_string(),
                });
            }
            items.push(item);
            Ok(())
        })
        .await
    }

    async fn update_quantity(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        quantity: u32,
        request_id: Uuid,
    ) -> Result<CollectionSnapshot, RemoteError> {
        let identity = identity.clone();
        self.handle(kind, Op::Update, Some(request_id), move |items| {
            let entry = items
                .iter_mut()
                .find(|i| i.identity() == &identity)
                .ok_or_else(|| not_found(&identity))?;
            *entry = LineItem::new(identity.clone(), quantity, entry.unit_price()).map_err(
                |_| RemoteError::Status {
                    status: 422,
                    body: "quantity".to_string(),
                },
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_item(
        &self,
        kind: CollectionKind,
        identity: &ItemIdentity,
        request_id: Uuid,
    ) -> Result<CollectionSnapshot, RemoteError> {
        let identity = identity.clone();
        self.handle(kind, Op::Delete, Some(request_id), move |items| {
            items.retain(|i| i.identity() != &identity);
            Ok(())
        })
        .await
    }
}

// =============================================================================
// FakeCatalog
// =============================================================================

#[derive(Default)]
struct Catalog {
    stock: HashMap<ProductId, u32>,
    /// Stock as of the last lookup, served until invalidated.
    cached: HashMap<ProductId, Option<u32>>,
    missing: HashSet<ProductId>,
    unavailable: bool,
    invalidations: usize,
}

/// In-memory catalog.
///
/// Every product sells for [`UNIT_PRICE_CENTS`] with untracked stock unless
/// told otherwise. Variants are `v1` and `v2`. Like the real client it
/// remembers the stock it last answered with until the product is
/// invalidated, so a changed stock level is only seen after invalidation.
#[derive(Clone, Default)]
pub struct FakeCatalog {
    inner: Arc<Mutex<Catalog>>,
}

impl FakeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stock(&self, product: &str, stock: u32) {
        self.inner
            .lock()
            .unwrap()
            .stock
            .insert(ProductId::parse(product).unwrap(), stock);
    }

    pub fn remove_product(&self, product: &str) {
        self.inner
            .lock()
            .unwrap()
            .missing
            .insert(ProductId::parse(product).unwrap());
    }

    /// Number of cache invalidations requested.
    #[must_use]
    pub fn invalidations(&self) -> usize {
        self.inner.lock().unwrap().invalidations
    }

    /// Make every lookup fail as if the catalog were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }
}

impl CatalogService for FakeCatalog {
    async fn get_variant(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<VariantSnapshot, CatalogError> {
        let mut catalog = self.inner.lock().unwrap();
        if catalog.unavailable {
            return Err(RemoteError::Timeout(REQUEST_TIMEOUT).into());
        }
        if catalog.missing.contains(product_id) {
            return Err(CatalogError::ProductNotFound(product_id.clone()));
        }
        if let Some(variant_id) = variant_id
            && !matches!(variant_id.as_str(), "v1" | "v2")
        {
            return Err(CatalogError::VariantNotFound {
                product_id: product_id.clone(),
                variant_id: variant_id.clone(),
            });
        }
        let current = catalog.stock.get(product_id).copied();
        let stock = *catalog
            .cached
            .entry(product_id.clone())
            .or_insert(current);
        Ok(VariantSnapshot {
            price: unit_price(),
            stock,
            images: Vec::new(),
        })
    }

    async fn invalidate(&self, product_id: &ProductId) {
        let mut catalog = self.inner.lock().unwrap();
        catalog.cached.remove(product_id);
        catalog.invalidations += 1;
    }
}
