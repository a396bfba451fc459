//! Moving wishlist items into the cart when the remote calls fail.

#![allow(clippy::unwrap_used)]

use nova_cart_core::CollectionKind;
use nova_cart_integration_tests::{Fault, Op, item, service, variant};
use nova_cart_storefront::AppError;
use nova_cart_storefront::config::SyncMode;

#[tokio::test]
async fn test_failed_cart_create_leaves_item_in_wishlist() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.seed(CollectionKind::Wishlist, vec![item(variant("p1", "v1"), 1)]);
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Cart, Op::Create, Fault::Status(400));

    let err = service
        .move_to_cart(&variant("p1", "v1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::RemoteSyncFailed {
            kind: CollectionKind::Cart,
            ..
        }
    ));
    let state = service.state();
    assert!(
        state
            .snapshot(CollectionKind::Wishlist)
            .unwrap()
            .contains(&variant("p1", "v1"))
    );
    assert!(state.snapshot(CollectionKind::Cart).unwrap().is_empty());
    assert_eq!(remote.count(CollectionKind::Wishlist, Op::Delete), 0);
}

#[tokio::test]
async fn test_failed_wishlist_delete_undoes_cart_add() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.seed(
        CollectionKind::Wishlist,
        vec![
            item(variant("p0", "v1"), 1),
            item(variant("p1", "v1"), 1),
            item(variant("p2", "v1"), 1),
        ],
    );
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Wishlist, Op::Delete, Fault::Status(400));

    let err = service
        .move_to_cart(&variant("p1", "v1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::RemoteSyncFailed {
            kind: CollectionKind::Wishlist,
            ..
        }
    ));
    assert_eq!(remote.count(CollectionKind::Cart, Op::Delete), 1);
    assert!(remote.items(CollectionKind::Cart).is_empty());
    assert_eq!(remote.items(CollectionKind::Wishlist).len(), 3);

    let state = service.state();
    let wishlist = state.snapshot(CollectionKind::Wishlist).unwrap();
    assert_eq!(wishlist.position(&variant("p1", "v1")), Some(1));
    assert!(state.snapshot(CollectionKind::Cart).unwrap().is_empty());
    assert!(state.added().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_undo_shows_what_the_server_holds() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.seed(CollectionKind::Wishlist, vec![item(variant("p1", "v1"), 1)]);
    service.load().await.unwrap();
    remote.fail_next(CollectionKind::Wishlist, Op::Delete, Fault::Status(400));
    remote.fail_next(CollectionKind::Cart, Op::Delete, Fault::Status(400));

    service
        .move_to_cart(&variant("p1", "v1"))
        .await
        .unwrap_err();

    // Local state matches the server, which kept the item in both places.
    let state = service.state();
    assert!(
        state
            .snapshot(CollectionKind::Cart)
            .unwrap()
            .contains(&variant("p1", "v1"))
    );
    assert!(
        state
            .snapshot(CollectionKind::Wishlist)
            .unwrap()
            .contains(&variant("p1", "v1"))
    );
    assert_eq!(remote.items(CollectionKind::Cart).len(), 1);
    assert_eq!(remote.items(CollectionKind::Wishlist).len(), 1);
}

#[tokio::test]
async fn test_move_of_pending_item_is_busy() {
    let (service, remote, _catalog) = service(SyncMode::Optimistic);
    remote.seed(CollectionKind::Wishlist, vec![item(variant("p1", "v1"), 1)]);
    service.load().await.unwrap();
    remote.fail_next(
        CollectionKind::Cart,
        Op::Create,
        Fault::Delay(std::time::Duration::from_millis(50)),
    );

    let p1 = variant("p1", "v1");

    let (first, second) = tokio::join!(service.move_to_cart(&p1), async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        service.remove(CollectionKind::Wishlist, &p1).await
    });

    first.unwrap();
    assert!(matches!(second.unwrap_err(), AppError::Busy(_)));
}
