//! Offer remainder invariants under arbitrary reserve / release sequences.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use proptest::prelude::*;
use settle_offerbook::OfferBook;
use settle_store::MemoryStore;
use settle_store::prelude::*;
use settle_types::{
    Amount, AssetRecord, CrossingId, ManualClock, Offer, OfferStatus, SettlementStatus,
    TransactionId,
};

fn book() -> OfferBook {
    let store = MemoryStore::new();
    store.migrate().unwrap();
    store
        .insert_asset(&AssetRecord {
            asset: "i1@m1:A1.0".parse().unwrap(),
            owner: "i1@m1".parse().unwrap(),
            created: Utc::now(),
        })
        .unwrap();
    OfferBook::new(Arc::new(store), Arc::new(ManualClock::starting_now()), "m1")
}

fn create(book: &OfferBook, amount: u64) -> Offer {
    book.create_offer(
        &"u1@m1".parse().unwrap(),
        "i1@m1:A1.0/i0@m0:A0.0".parse().unwrap(),
        "1/1".parse().unwrap(),
        Amount::from(amount),
    )
    .unwrap()
}

#[derive(Debug, Clone)]
enum Step {
    Reserve(u64),
    Release(usize),
    Close,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (1u64..40).prop_map(Step::Reserve),
        3 => (0usize..16).prop_map(Step::Release),
        1 => Just(Step::Close),
    ]
}

proptest! {
    #[test]
    fn remainder_tracks_reserved_crossings(amount in 1u64..100, steps in prop::collection::vec(step(), 1..40)) {
        let book = book();
        let offer = create(&book, amount);
        let mut reserved: BTreeMap<CrossingId, u64> = BTreeMap::new();
        let mut made: Vec<CrossingId> = Vec::new();
        let mut closed = false;

        for s in steps {
            match s {
                Step::Reserve(n) => {
                    if let Ok(c) = book.reserve_crossing(offer.id, TransactionId::new(), 1, Amount::from(n)) {
                        reserved.insert(c.id, n);
                        made.push(c.id);
                    }
                }
                Step::Release(i) => {
                    if let Some(id) = made.get(i % made.len().max(1)).copied() {
                        let c = book.release_crossing(id).unwrap();
                        prop_assert_eq!(c.status, SettlementStatus::Canceled);
                        reserved.remove(&id);
                    }
                }
                Step::Close => {
                    if book.close_offer(&"u1@m1".parse().unwrap(), offer.id).is_ok() {
                        closed = true;
                    }
                }
            }

            let current = book.get_offer(offer.id).unwrap();
            let outstanding: u64 = reserved.values().sum();
            prop_assert!(current.remainder <= current.amount);
            prop_assert_eq!(current.remainder, Amount::from(amount - outstanding));
            prop_assert_eq!(current.status == OfferStatus::Consumed, current.remainder.is_zero() && !closed);
            prop_assert_eq!(current.status == OfferStatus::Closed, closed);
        }
    }
}

#[test]
fn concurrent_reservations_never_overdraw() {
    let book = Arc::new(book());
    let offer = create(&book, 100);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let book = Arc::clone(&book);
            thread::spawn(move || {
                let mut won = 0u64;
                for _ in 0..30 {
                    if book
                        .reserve_crossing(offer.id, TransactionId::new(), 1, Amount::from(1u64))
                        .is_ok()
                    {
                        won += 1;
                    }
                }
                won
            })
        })
        .collect();

    let won: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let current = book.get_offer(offer.id).unwrap();
    assert!(won <= 100);
    assert_eq!(current.remainder, Amount::from(100 - won));
}
