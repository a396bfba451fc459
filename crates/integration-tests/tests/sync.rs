//! Remote sync behaviour: rollback, retry, timeout, in-flight guard and
//! stale responses.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use nova_cart_core::CollectionKind;
use nova_cart_integration_tests::{Fault, Op, REQUEST_TIMEOUT, id, item, service};
use nova_cart_storefront::AppError;
use nova_cart_storefront::config::SyncMode;
use nova_cart_storefront::remote::RemoteError;

// =============================================================================
// Optimistic rollback
// =============================================================================

#[tokio::test]
async fn test_failed_add_is_rolled_back() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.seed(CollectionKind::Cart, vec![item(id("p1"), 1)]);
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Cart, Op::Create, Fault::Status(422));

    let err = service.add_to_cart(id("p2")).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::RemoteSyncFailed {
            kind: CollectionKind::Cart,
            source: RemoteError::Status { status: 422, .. }
        }
    ));
    assert_eq!(
        err.user_message(),
        "Could not save your changes. Please try again."
    );
    let cart = service.state().snapshot(CollectionKind::Cart).unwrap();
    assert_eq!(cart.len(), 1);
    assert!(!cart.contains(&id("p2")));
    assert!(service.state().added().unwrap().is_empty());
    assert!(!service.state().is_pending(CollectionKind::Cart, &id("p2")));
}

#[tokio::test]
async fn test_failed_quantity_change_restores_previous_quantity() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.seed(CollectionKind::Cart, vec![item(id("p1"), 2)]);
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Cart, Op::Update, Fault::Status(400));

    service
        .increase_quantity(CollectionKind::Cart, &id("p1"))
        .await
        .unwrap_err();

    let cart = service.state().snapshot(CollectionKind::Cart).unwrap();
    assert_eq!(cart.entry(&id("p1")).unwrap().quantity(), 2);
}

#[tokio::test]
async fn test_failed_remove_restores_item_in_place() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.seed(
        CollectionKind::Wishlist,
        vec![item(id("p1"), 1), item(id("p2"), 1), item(id("p3"), 1)],
    );
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Wishlist, Op::Delete, Fault::Status(400));

    service
        .remove(CollectionKind::Wishlist, &id("p2"))
        .await
        .unwrap_err();

    let wishlist = service.state().snapshot(CollectionKind::Wishlist).unwrap();
    assert_eq!(wishlist.position(&id("p2")), Some(1));
    assert_eq!(wishlist.len(), 3);
}

#[tokio::test]
async fn test_rollback_only_touches_the_failed_item() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    remote.fail_next(
        CollectionKind::Cart,
        Op::Create,
        Fault::Delay(Duration::from_millis(50)),
    );
    // The second create fails; the first one is still in flight when it does.
    remote.fail_next(CollectionKind::Cart, Op::Create, Fault::Status(400));

    let (first, second) = tokio::join!(service.add_to_cart(id("p1")), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.add_to_cart(id("p2")).await
    });

    first.unwrap();
    second.unwrap_err();
    let cart = service.state().snapshot(CollectionKind::Cart).unwrap();
    assert!(cart.contains(&id("p1")));
    assert!(!cart.contains(&id("p2")));
}

// =============================================================================
// Retry and timeout
// =============================================================================

#[tokio::test]
async fn test_transient_failure_is_retried_once_with_same_request_id() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Cart, Op::Create, Fault::Status(503));

    service.add_to_cart(id("p1")).await.unwrap();

    let creates: Vec<_> = remote
        .calls()
        .into_iter()
        .filter(|call| call.op == Op::Create)
        .collect();
    assert_eq!(creates.len(), 2);
    assert!(creates[0].request_id.is_some());
    assert_eq!(creates[0].request_id, creates[1].request_id);
    assert_eq!(remote.items(CollectionKind::Cart).len(), 1);
}

#[tokio::test]
async fn test_rate_limit_is_retried_once() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Wishlist, Op::Create, Fault::RateLimited(0));

    service.add_to_wishlist(id("p1")).await.unwrap();
    assert_eq!(remote.count(CollectionKind::Wishlist, Op::Create), 2);
}

#[tokio::test]
async fn test_no_second_retry() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    for _ in 0..3 {
        remote.fail_next(CollectionKind::Cart, Op::Create, Fault::Status(502));
    }

    let err = service.add_to_cart(id("p1")).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(remote.count(CollectionKind::Cart, Op::Create), 2);
    assert!(
        service
            .state()
            .snapshot(CollectionKind::Cart)
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Cart, Op::Create, Fault::Status(409));

    service.add_to_cart(id("p1")).await.unwrap_err();
    assert_eq!(remote.count(CollectionKind::Cart, Op::Create), 1);
}

#[tokio::test]
async fn test_hung_call_times_out_and_rolls_back() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    let hang = Fault::Delay(REQUEST_TIMEOUT * 5);
    remote.fail_next(CollectionKind::Cart, Op::Create, hang.clone());
    remote.fail_next(CollectionKind::Cart, Op::Create, hang);

    let err = service.add_to_cart(id("p1")).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::RemoteSyncFailed {
            source: RemoteError::Timeout(_),
            ..
        }
    ));
    assert_eq!(remote.count(CollectionKind::Cart, Op::Create), 2);
    assert!(
        service
            .state()
            .snapshot(CollectionKind::Cart)
            .unwrap()
            .is_empty()
    );
    // Abandoned calls never reached the store.
    assert!(remote.items(CollectionKind::Cart).is_empty());
}

#[tokio::test]
async fn test_load_failure_is_reported() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.fail_next(CollectionKind::Wishlist, Op::Fetch, Fault::Status(500));
    remote.fail_next(CollectionKind::Wishlist, Op::Fetch, Fault::Status(500));

    let err = service.load().await.unwrap_err();
    assert!(matches!(
        err,
        AppError::RemoteSyncFailed {
            kind: CollectionKind::Wishlist,
            ..
        }
    ));
}

// =============================================================================
// In-flight guard
// =============================================================================

#[tokio::test]
async fn test_second_change_to_pending_item_is_busy() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.seed(CollectionKind::Cart, vec![item(id("p1"), 1)]);
    service.load().await.unwrap();
    remote.fail_next(
        CollectionKind::Cart,
        Op::Update,
        Fault::Delay(Duration::from_millis(60)),
    );

    let p1 = id("p1");

    let (first, second) = tokio::join!(
        service.increase_quantity(CollectionKind::Cart, &p1),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(service.state().is_pending(CollectionKind::Cart, &p1));
            service.decrease_quantity(CollectionKind::Cart, &p1).await
        }
    );

    assert_eq!(first.unwrap().quantity(), 2);
    let err = second.unwrap_err();
    assert!(matches!(err, AppError::Busy(_)));
    assert_eq!(err.user_message(), "Still saving your previous change");
    assert_eq!(remote.count(CollectionKind::Cart, Op::Update), 1);
    assert!(!service.state().is_pending(CollectionKind::Cart, &id("p1")));

    // The control is usable again once the first change settles.
    service
        .decrease_quantity(CollectionKind::Cart, &p1)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_changes_to_different_items_run_concurrently() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    remote.fail_next(
        CollectionKind::Cart,
        Op::Create,
        Fault::Delay(Duration::from_millis(40)),
    );

    let (first, second) = tokio::join!(service.add_to_cart(id("p1")), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.add_to_cart(id("p2")).await
    });

    first.unwrap();
    second.unwrap();
    let cart = service.state().snapshot(CollectionKind::Cart).unwrap();
    assert_eq!(cart.len(), 2);
    assert_eq!(remote.items(CollectionKind::Cart).len(), 2);
}

// =============================================================================
// Abandoned callers
// =============================================================================

#[tokio::test]
async fn test_abandoned_add_still_reaches_the_server() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    remote.fail_next(
        CollectionKind::Cart,
        Op::Create,
        Fault::Delay(Duration::from_millis(100)),
    );

    // The caller gives up while the create is still in flight.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), service.add_to_cart(id("p1"))).await;
    assert!(abandoned.is_err());
    assert!(service.state().is_pending(CollectionKind::Cart, &id("p1")));

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(!service.state().is_pending(CollectionKind::Cart, &id("p1")));
    assert!(
        service
            .state()
            .snapshot(CollectionKind::Cart)
            .unwrap()
            .contains(&id("p1"))
    );
    assert_eq!(remote.items(CollectionKind::Cart).len(), 1);
    assert_eq!(service.state().added().unwrap().entries().len(), 1);
}

#[tokio::test]
async fn test_abandoned_failing_add_is_still_rolled_back() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    remote.fail_next(
        CollectionKind::Cart,
        Op::Create,
        Fault::Delay(REQUEST_TIMEOUT * 5),
    );
    remote.fail_next(
        CollectionKind::Cart,
        Op::Create,
        Fault::Delay(REQUEST_TIMEOUT * 5),
    );

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), service.add_to_cart(id("p1"))).await;
    assert!(abandoned.is_err());
    // Still shown optimistically while the call is outstanding.
    assert!(
        service
            .state()
            .snapshot(CollectionKind::Cart)
            .unwrap()
            .contains(&id("p1"))
    );

    // Two timed-out attempts plus the retry backoff.
    tokio::time::sleep(REQUEST_TIMEOUT * 3).await;

    assert!(!service.state().is_pending(CollectionKind::Cart, &id("p1")));
    assert!(
        service
            .state()
            .snapshot(CollectionKind::Cart)
            .unwrap()
            .is_empty()
    );
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_stale_response_is_ignored() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    service.load().await.unwrap();
    service.add_to_cart(id("p1")).await.unwrap();
    remote.fail_next(CollectionKind::Cart, Op::Create, Fault::StaleResponse);

    service.add_to_cart(id("p2")).await.unwrap();

    // The old snapshot is dropped and the optimistic change stays.
    let cart = service.state().snapshot(CollectionKind::Cart).unwrap();
    assert!(cart.contains(&id("p1")));
    assert!(cart.contains(&id("p2")));
}

#[tokio::test]
async fn test_load_dedupes_and_truncates_server_state() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    let mut items: Vec<_> = (0..12).map(|n| item(id(&format!("p{n}")), 1)).collect();
    items.insert(1, item(id("p0"), 5));
    remote.seed(CollectionKind::Cart, items);

    service.load().await.unwrap();

    let cart = service.state().snapshot(CollectionKind::Cart).unwrap();
    assert_eq!(cart.len(), 10);
    assert_eq!(cart.entry(&id("p0")).unwrap().quantity(), 1);
}

#[tokio::test]
async fn test_subscribers_see_changes() {
    let (service, _remote, _catalog) = service(SyncMode::Optimistic);
    let mut changes = service.state().subscribe();
    service.load().await.unwrap();
    let _ = changes.borrow_and_update();

    service.add_to_wishlist(id("p1")).await.unwrap();
    assert!(changes.has_changed().unwrap());
}
