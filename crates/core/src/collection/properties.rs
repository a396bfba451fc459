//! Property tests for the collection invariants.

use std::collections::HashSet;

use proptest::prelude::*;

use super::*;
use crate::types::{CurrencyCode, Price};

#[derive(Debug, Clone)]
enum Op {
    Add(u8, Option<u8>),
    Increase(u8, Option<u8>, Option<u32>),
    Decrease(u8, Option<u8>),
    Remove(u8, Option<u8>),
}

fn identity(product: u8, variant: Option<u8>) -> ItemIdentity {
    let product = format!("p{product}");
    let variant = variant.map(|v| format!("v{v}"));
    ItemIdentity::parse(&product, variant.as_deref()).expect("generated ids are non-empty")
}

fn line(product: u8, variant: Option<u8>) -> LineItem {
    LineItem::single(
        identity(product, variant),
        Price::from_cents(199, CurrencyCode::USD).expect("non-negative"),
    )
}

fn product() -> impl Strategy<Value = u8> {
    // A small id space so duplicates and removals of present items are common.
    0u8..15
}

fn variant() -> impl Strategy<Value = Option<u8>> {
    proptest::option::of(0u8..2)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (product(), variant()).prop_map(|(p, v)| Op::Add(p, v)),
        2 => (product(), variant(), proptest::option::of(1u32..6))
            .prop_map(|(p, v, s)| Op::Increase(p, v, s)),
        2 => (product(), variant()).prop_map(|(p, v)| Op::Decrease(p, v)),
        1 => (product(), variant()).prop_map(|(p, v)| Op::Remove(p, v)),
    ]
}

fn apply(collection: &mut Collection, op: &Op) {
    match op {
        Op::Add(p, v) => {
            let before = collection.clone();
            if collection.add(line(*p, *v)).is_err() {
                assert_eq!(*collection, before, "rejected add must not change state");
            }
        }
        Op::Increase(p, v, stock) => {
            let _ = collection.increase_quantity(&identity(*p, *v), *stock);
        }
        Op::Decrease(p, v) => {
            let _ = collection.decrease_quantity(&identity(*p, *v));
        }
        Op::Remove(p, v) => {
            collection.remove(&identity(*p, *v));
        }
    }
}

proptest! {
    #[test]
    fn identities_stay_unique_and_within_limit(
        limit in 1usize..12,
        ops in proptest::collection::vec(op(), 0..80),
    ) {
        let mut collection = Collection::new(CollectionKind::Cart, limit);
        for op in &ops {
            apply(&mut collection, op);

            let unique: HashSet<_> = collection.items().iter().map(LineItem::identity).collect();
            prop_assert_eq!(unique.len(), collection.len());
            prop_assert!(collection.len() <= limit);
            prop_assert!(collection.items().iter().all(|item| item.quantity() >= 1));
        }
    }

    #[test]
    fn add_beyond_limit_is_always_rejected(limit in 0usize..12, extra in 1usize..5) {
        let mut collection = Collection::new(CollectionKind::Wishlist, limit);
        for n in 0..limit {
            let product = u8::try_from(n).expect("limit is small");
            prop_assert!(collection.add(line(product, None)).is_ok());
        }
        for n in 0..extra {
            let product = u8::try_from(100 + n).expect("small");
            let result = collection.add(line(product, None));
            prop_assert_eq!(
                result,
                Err(CollectionError::CollectionFull { kind: CollectionKind::Wishlist, limit })
            );
            prop_assert_eq!(collection.len(), limit);
        }
    }

    #[test]
    fn remove_is_idempotent(
        ops in proptest::collection::vec(op(), 0..40),
        p in product(),
        v in variant(),
    ) {
        let mut collection = Collection::with_default_limit(CollectionKind::Cart);
        for op in &ops {
            apply(&mut collection, op);
        }
        let id = identity(p, v);

        let mut once = collection.clone();
        once.remove(&id);
        let mut twice = once.clone();
        twice.remove(&id);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn decrease_never_goes_below_one(start in 1u32..20, times in 0usize..40) {
        let mut collection = Collection::with_default_limit(CollectionKind::Cart);
        let id = identity(1, None);
        collection
            .add(LineItem::new(id.clone(), start, Price::zero(CurrencyCode::USD)).expect("start >= 1"))
            .expect("empty collection");

        for _ in 0..times {
            let quantity = collection.decrease_quantity(&id).expect("present").quantity();
            prop_assert!(quantity >= 1);
        }
        let expected = start.saturating_sub(u32::try_from(times).expect("small")).max(1);
        prop_assert_eq!(collection.entry(&id).map(LineItem::quantity), Some(expected));
    }

    #[test]
    fn move_to_cart_is_all_or_nothing(
        cart_fill in 0usize..=10,
        in_cart_already in any::<bool>(),
        in_wishlist in any::<bool>(),
    ) {
        let id = identity(200, Some(1));
        let mut wishlist = Collection::with_default_limit(CollectionKind::Wishlist);
        let mut cart = Collection::with_default_limit(CollectionKind::Cart);
        if in_wishlist {
            wishlist.add(line(200, Some(1))).expect("empty wishlist");
        }
        if in_cart_already {
            cart.add(line(200, Some(1))).expect("empty cart");
        }
        for n in cart.len()..cart_fill {
            let product = u8::try_from(n).expect("small");
            cart.add(line(product, None)).expect("below limit");
        }
        let (wishlist_before, cart_before) = (wishlist.clone(), cart.clone());

        match move_to_cart(&mut wishlist, &mut cart, &id) {
            Ok(_) => {
                prop_assert!(cart.contains(&id));
                prop_assert!(!wishlist.contains(&id));
            }
            Err(_) => {
                prop_assert_eq!(wishlist, wishlist_before);
                prop_assert_eq!(cart, cart_before);
            }
        }
    }
}
