//! Transaction lifecycle on one mint, and across two mints with tasks
//! handed over by hand.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use settle_engine::{SettleRequest, SettlementEngine, TransactionRequest};
use settle_store::MemoryStore;
use settle_store::prelude::*;
use settle_types::{
    Address, Amount, Asset, Clock, HopReservation, ManualClock, MintConfig, Offer, OfferId,
    OfferStatus, SecretReveal, SettlementStatus, TaskKind, TaskStatus,
};

fn mint(name: &str, clock: &Arc<ManualClock>) -> SettlementEngine {
    let store = MemoryStore::new();
    store.migrate().unwrap();
    SettlementEngine::new(MintConfig::new(name), Arc::new(store), clock.clone()).unwrap()
}

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

fn asset(s: &str) -> Asset {
    s.parse().unwrap()
}

fn request(owner: &str, pair: &str, amount: u64, destination: &str, path: Vec<OfferId>) -> TransactionRequest {
    TransactionRequest {
        owner: addr(owner),
        pair: pair.parse().unwrap(),
        amount: Amount::from(amount),
        destination: addr(destination),
        path,
        expiry: None,
    }
}

fn pending_tasks(engine: &SettlementEngine) -> Vec<TaskKind> {
    engine
        .store()
        .tasks_by_status(TaskStatus::Pending)
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

// ---------------------------------------------------------------------------
// Single mint
// ---------------------------------------------------------------------------

/// Mint `m` issuing A, B and C, with X selling B for A and Y selling C for B.
struct Chain {
    engine: SettlementEngine,
    clock: Arc<ManualClock>,
    x: Offer,
    y: Offer,
}

fn chain(y_amount: u64) -> Chain {
    let clock = Arc::new(ManualClock::starting_now());
    let engine = mint("m", &clock);
    for (issuer, code) in [("a@m", "A"), ("b@m", "B"), ("c@m", "C")] {
        engine.register_asset(&addr(issuer), code, 0).unwrap();
    }
    let x = engine
        .create_offer(&addr("b@m"), "b@m:B.0/a@m:A.0".parse().unwrap(), "1/1".parse().unwrap(), Amount::from(100u64))
        .unwrap();
    let y = engine
        .create_offer(&addr("c@m"), "c@m:C.0/b@m:B.0".parse().unwrap(), "1/1".parse().unwrap(), Amount::from(y_amount))
        .unwrap();
    Chain { engine, clock, x, y }
}

#[test]
fn direct_transfer_settles_one_operation() {
    let clock = Arc::new(ManualClock::starting_now());
    let m0 = mint("m0", &clock);
    m0.register_asset(&addr("i0@m0"), "A0", 0).unwrap();

    let created = m0
        .create_transaction(request("i0@m0", "i0@m0:A0.0/i0@m0:A0.0", 5, "u1@m0", vec![]))
        .unwrap();
    let tx = &created.view.transaction;
    assert_eq!(tx.status, SettlementStatus::Reserved);
    assert!(tx.hop_locks.is_empty());
    assert!(created.view.crossings.is_empty());
    assert_eq!(created.view.operations.len(), 1);

    let view = m0
        .settle(tx.id, SettleRequest::Initiator { secret: created.secret.clone() })
        .unwrap();
    assert_eq!(view.transaction.status, SettlementStatus::Settled);
    let op = &view.operations[0];
    assert_eq!(op.hop, 0);
    assert_eq!(op.status, SettlementStatus::Settled);
    assert_eq!(op.asset, asset("i0@m0:A0.0"));
    assert_eq!(op.source, addr("i0@m0"));
    assert_eq!(op.destination, addr("u1@m0"));
    assert_eq!(op.amount, Amount::from(5u64));
    assert_eq!(op.transaction, tx.id);

    assert_eq!(m0.balance(&op.asset, &addr("u1@m0")).unwrap(), Decimal::from(5));
    m0.verify_supply(&op.asset).unwrap();
    assert!(pending_tasks(&m0).is_empty());
}

#[test]
fn settling_twice_applies_effects_once() {
    let Chain { engine, x, y, .. } = chain(50);
    let created = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, y.id]))
        .unwrap();
    let id = created.view.transaction.id;
    let settle = || engine.settle(id, SettleRequest::Initiator { secret: created.secret.clone() });

    let first = settle().unwrap();
    let second = settle().unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.balance(&asset("c@m:C.0"), &addr("d@m")).unwrap(), Decimal::from(5));
    assert_eq!(engine.balance(&asset("a@m:A.0"), &addr("b@m")).unwrap(), Decimal::from(5));
    for code in ["a@m:A.0", "b@m:B.0", "c@m:C.0"] {
        engine.verify_supply(&asset(code)).unwrap();
    }
}

#[test]
fn local_path_settles_every_hop() {
    let Chain { engine, x, y, .. } = chain(50);
    let created = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, y.id]))
        .unwrap();
    let view = &created.view;
    assert_eq!(view.operations.len(), 3);
    assert_eq!(view.crossings.len(), 2);
    assert_eq!(view.transaction.hop_locks.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(engine.get_offer(x.id).unwrap().remainder, Amount::from(95u64));

    let settled = engine
        .settle(view.transaction.id, SettleRequest::Initiator { secret: created.secret.clone() })
        .unwrap();
    assert!(settled.operations.iter().all(|o| o.status == SettlementStatus::Settled));
    assert!(settled.crossings.iter().all(|c| c.status == SettlementStatus::Settled));
    assert_eq!(engine.balance(&asset("b@m:B.0"), &addr("c@m")).unwrap(), Decimal::from(5));
    assert_eq!(engine.get_offer(x.id).unwrap().remainder, Amount::from(95u64));
    assert!(
        pending_tasks(&engine)
            .iter()
            .all(|k| matches!(k, TaskKind::PropagateOffer { .. }))
    );
}

#[test]
fn wrong_secret_changes_nothing() {
    let Chain { engine, x, y, .. } = chain(50);
    let created = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, y.id]))
        .unwrap();
    let id = created.view.transaction.id;

    let err = engine
        .settle(id, SettleRequest::Initiator { secret: "foo".into() })
        .unwrap_err();
    assert_eq!(err.code(), "secret_invalid");
    let err = engine
        .settle(id, SettleRequest::Hop { hop: 1, secret: created.secret.clone() })
        .unwrap_err();
    assert_eq!(err.code(), "secret_invalid");

    let view = engine.get_transaction(id).unwrap();
    assert_eq!(view, created.view);
    assert_eq!(engine.balance(&asset("c@m:C.0"), &addr("d@m")).unwrap(), Decimal::ZERO);
}

#[test]
fn short_offer_mid_path_rolls_back_earlier_crossings() {
    let Chain { engine, x, y, .. } = chain(5);
    let err = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 10, "d@m", vec![x.id, y.id]))
        .unwrap_err();
    assert_eq!(err.code(), "offer_insufficient_remainder");

    let x_now = engine.get_offer(x.id).unwrap();
    assert_eq!(x_now.remainder, Amount::from(100u64));
    assert_eq!(x_now.status, OfferStatus::Active);
    assert_eq!(engine.get_offer(y.id).unwrap().remainder, Amount::from(5u64));
    assert!(
        engine
            .store()
            .transactions_by_status(SettlementStatus::Reserved)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn late_settlement_cancels_and_fails() {
    let Chain { engine, clock, x, y } = chain(50);
    let created = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, y.id]))
        .unwrap();
    let id = created.view.transaction.id;

    clock.advance(Duration::hours(2));
    let err = engine
        .settle(id, SettleRequest::Initiator { secret: created.secret.clone() })
        .unwrap_err();
    assert_eq!(err.code(), "settlement_failed");

    let view = engine.get_transaction(id).unwrap();
    assert_eq!(view.transaction.status, SettlementStatus::Canceled);
    assert!(view.operations.iter().all(|o| o.status == SettlementStatus::Canceled));
    assert!(view.crossings.iter().all(|c| c.status == SettlementStatus::Canceled));
    assert_eq!(engine.get_offer(x.id).unwrap().remainder, Amount::from(100u64));
    assert_eq!(engine.sweep_expired().unwrap(), 0);

    let err = engine
        .settle(id, SettleRequest::Initiator { secret: created.secret })
        .unwrap_err();
    assert_eq!(err.code(), "transaction_canceled");
}

#[test]
fn sweep_cancels_only_expired_transactions() {
    let Chain { engine, clock, x, y } = chain(50);
    let old = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, y.id]))
        .unwrap();
    clock.advance(Duration::minutes(50));
    let fresh = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 3, "d@m", vec![x.id, y.id]))
        .unwrap();
    clock.advance(Duration::minutes(20));

    assert_eq!(engine.sweep_expired().unwrap(), 1);
    assert_eq!(
        engine.get_transaction(old.view.transaction.id).unwrap().transaction.status,
        SettlementStatus::Canceled
    );
    assert_eq!(
        engine.get_transaction(fresh.view.transaction.id).unwrap().transaction.status,
        SettlementStatus::Reserved
    );
    assert_eq!(engine.get_offer(x.id).unwrap().remainder, Amount::from(97u64));

    let view = engine.cancel(old.view.transaction.id).unwrap();
    assert_eq!(view.transaction.status, SettlementStatus::Canceled);
}

#[test]
fn creation_is_validated_before_any_write() {
    let Chain { engine, clock, x, y } = chain(50);

    let mut too_soon = request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, y.id]);
    too_soon.expiry = Some(clock.now() + Duration::seconds(1));
    let err = engine.create_transaction(too_soon).unwrap_err();
    assert_eq!(err.code(), "expiry_buffer_violation");

    let err = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, OfferId::new()]))
        .unwrap_err();
    assert_eq!(err.code(), "offer_not_found");

    let err = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![y.id, x.id]))
        .unwrap_err();
    assert_eq!(err.code(), "path_invalid");

    let err = engine
        .create_transaction(request("u@other", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, y.id]))
        .unwrap_err();
    assert_eq!(err.code(), "invalid_request");

    engine.close_offer(&addr("c@m"), y.id).unwrap();
    let err = engine
        .create_transaction(request("a@m", "a@m:A.0/c@m:C.0", 5, "d@m", vec![x.id, y.id]))
        .unwrap_err();
    assert_eq!(err.code(), "offer_not_active");

    assert_eq!(engine.get_offer(x.id).unwrap().remainder, Amount::from(100u64));
    assert!(engine.store().transactions_by_status(SettlementStatus::Reserved).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Two mints
// ---------------------------------------------------------------------------

struct TwoMints {
    m0: SettlementEngine,
    m1: SettlementEngine,
    clock: Arc<ManualClock>,
    o1: Offer,
}

fn two_mints() -> TwoMints {
    let clock = Arc::new(ManualClock::starting_now());
    let m0 = mint("m0", &clock);
    let m1 = mint("m1", &clock);
    m0.register_asset(&addr("i0@m0"), "A0", 0).unwrap();
    m1.register_asset(&addr("i1@m1"), "A1", 0).unwrap();
    let o1 = m1
        .create_offer(
            &addr("i1@m1"),
            "i1@m1:A1.0/i0@m0:A0.0".parse().unwrap(),
            "1/1".parse().unwrap(),
            Amount::from(100u64),
        )
        .unwrap();
    assert!(m0.receive_offer(&o1.to_propagated()).unwrap());
    TwoMints { m0, m1, clock, o1 }
}

fn reservation(engine: &SettlementEngine) -> (String, HopReservation) {
    pending_tasks(engine)
        .into_iter()
        .find_map(|k| match k {
            TaskKind::ReserveHop { target, request } => Some((target, request)),
            _ => None,
        })
        .expect("a hop reservation task")
}

fn reveal(engine: &SettlementEngine) -> (String, SecretReveal) {
    pending_tasks(engine)
        .into_iter()
        .find_map(|k| match k {
            TaskKind::RevealSecret { target, reveal } => Some((target, reveal)),
            _ => None,
        })
        .expect("a secret reveal task")
}

#[test]
fn remote_hop_is_reserved_and_settled_by_relay() {
    let TwoMints { m0, m1, o1, .. } = two_mints();
    let created = m0
        .create_transaction(request("i0@m0", "i0@m0:A0.0/i1@m1:A1.0", 10, "d1@m1", vec![o1.id]))
        .unwrap();
    let id = created.view.transaction.id;
    assert_eq!(created.view.operations.len(), 1);
    assert!(created.view.crossings.is_empty());

    let (target, request) = reservation(&m0);
    assert_eq!(target, "m1");
    assert!(request.transaction.hop_locks.is_empty());
    assert!(request.transaction.awaiting_hops.is_empty());
    assert_eq!(created.view.transaction.awaiting_hops.iter().copied().collect::<Vec<_>>(), vec![1]);

    let view = m1.reserve_hop(request.clone()).unwrap();
    assert_eq!(view.operations.len(), 1);
    assert_eq!(view.crossings.len(), 1);
    let op = &view.operations[0];
    assert_eq!((op.hop, op.amount), (1, Amount::from(10u64)));
    assert_eq!(op.source, addr("i1@m1"));
    assert_eq!(op.destination, addr("d1@m1"));
    assert_eq!(m1.get_offer(o1.id).unwrap().remainder, Amount::from(90u64));

    // redelivery lands on the same records
    assert_eq!(m1.reserve_hop(request).unwrap(), view);
    assert_eq!(m1.get_offer(o1.id).unwrap().remainder, Amount::from(90u64));

    let err = m1
        .settle(id, SettleRequest::Hop { hop: 1, secret: "foo".into() })
        .unwrap_err();
    assert_eq!(err.code(), "secret_invalid");
    let err = m1
        .settle(id, SettleRequest::Initiator { secret: created.secret.clone() })
        .unwrap_err();
    assert_eq!(err.code(), "invalid_request");

    // m0 has not heard back from m1 yet
    let err = m0
        .settle(id, SettleRequest::Initiator { secret: created.secret.clone() })
        .unwrap_err();
    assert_eq!(err.code(), "hops_unconfirmed");
    assert_eq!(m0.get_transaction(id).unwrap().transaction.status, SettlementStatus::Reserved);

    let confirmed = m0.confirm_hop(id, 1).unwrap();
    assert!(confirmed.transaction.awaiting_hops.is_empty());
    assert_eq!(m0.confirm_hop(id, 1).unwrap(), confirmed);
    assert_eq!(m1.confirm_hop(id, 1).unwrap_err().code(), "invalid_request");

    m0.settle(id, SettleRequest::Initiator { secret: created.secret }).unwrap();
    let (target, relay) = reveal(&m0);
    assert_eq!((target.as_str(), relay.hop), ("m1", 1));

    let settled = m1.reveal_secret(relay.clone()).unwrap();
    assert_eq!(settled.transaction.status, SettlementStatus::Settled);
    assert!(settled.crossings.iter().all(|c| c.status == SettlementStatus::Settled));
    assert_eq!(m1.reveal_secret(relay).unwrap(), settled);

    assert_eq!(m1.balance(&asset("i1@m1:A1.0"), &addr("d1@m1")).unwrap(), Decimal::TEN);
    assert_eq!(m0.balance(&asset("i0@m0:A0.0"), &addr("i1@m1")).unwrap(), Decimal::TEN);
    m0.verify_supply(&asset("i0@m0:A0.0")).unwrap();
    m1.verify_supply(&asset("i1@m1:A1.0")).unwrap();
}

#[test]
fn remote_hop_rejects_bad_reservations() {
    let TwoMints { m0, m1, clock, o1 } = two_mints();
    m0.create_transaction(request("i0@m0", "i0@m0:A0.0/i1@m1:A1.0", 10, "d1@m1", vec![o1.id]))
        .unwrap();
    let (_, request) = reservation(&m0);

    let mut wrong_offer = request.clone();
    wrong_offer.offer = OfferId::new();
    assert_eq!(m1.reserve_hop(wrong_offer).unwrap_err().code(), "path_invalid");

    let mut wrong_hop = request.clone();
    wrong_hop.hop = 2;
    assert_eq!(m1.reserve_hop(wrong_hop).unwrap_err().code(), "invalid_request");

    m1.reserve_hop(request.clone()).unwrap();
    clock.advance(Duration::hours(2));
    assert_eq!(m1.sweep_expired().unwrap(), 1);
    assert_eq!(m1.get_offer(o1.id).unwrap().remainder, Amount::from(100u64));
    assert_eq!(m1.reserve_hop(request).unwrap_err().code(), "transaction_canceled");
}

#[test]
fn reservation_too_close_to_expiry_is_refused() {
    let TwoMints { m0, m1, clock, o1 } = two_mints();
    m0.create_transaction(request("i0@m0", "i0@m0:A0.0/i1@m1:A1.0", 10, "d1@m1", vec![o1.id]))
        .unwrap();
    let (_, request) = reservation(&m0);

    clock.advance(Duration::minutes(59) + Duration::seconds(30));
    let err = m1.reserve_hop(request).unwrap_err();
    assert_eq!(err.code(), "expiry_buffer_violation");
    assert_eq!(m1.get_offer(o1.id).unwrap().remainder, Amount::from(100u64));
}

#[test]
fn conflicting_redelivery_leaves_the_hop_untouched() {
    let TwoMints { m0, m1, o1, .. } = two_mints();
    let created = m0
        .create_transaction(request("i0@m0", "i0@m0:A0.0/i1@m1:A1.0", 10, "d1@m1", vec![o1.id]))
        .unwrap();
    let (_, request) = reservation(&m0);
    let view = m1.reserve_hop(request.clone()).unwrap();

    let mut more = request.clone();
    more.amount_in = Amount::from(20u64);
    assert_eq!(m1.reserve_hop(more).unwrap_err().code(), "reservation_conflict");

    let mut other_lock = request.clone();
    other_lock.hop_lock = "00".repeat(32);
    assert_eq!(m1.reserve_hop(other_lock).unwrap_err().code(), "reservation_conflict");

    let mut other_recipient = request.clone();
    other_recipient.recipient = addr("x1@m1");
    assert_eq!(m1.reserve_hop(other_recipient).unwrap_err().code(), "reservation_conflict");

    let mut other_transaction = request.clone();
    other_transaction.transaction.lock = "11".repeat(32);
    assert_eq!(m1.reserve_hop(other_transaction).unwrap_err().code(), "reservation_conflict");

    assert_eq!(m1.get_transaction(created.view.transaction.id).unwrap(), view);
    assert_eq!(m1.get_offer(o1.id).unwrap().remainder, Amount::from(90u64));
    assert_eq!(m1.reserve_hop(request).unwrap(), view);
}

#[test]
fn failed_outbox_write_cancels_the_new_transaction() {
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(MemoryStore::new());
    store.migrate().unwrap();
    let m0 = SettlementEngine::new(MintConfig::new("m0"), store.clone(), clock.clone()).unwrap();
    let m1 = mint("m1", &clock);
    m0.register_asset(&addr("i0@m0"), "A0", 0).unwrap();
    m1.register_asset(&addr("i1@m1"), "A1", 0).unwrap();
    let o1 = m1
        .create_offer(
            &addr("i1@m1"),
            "i1@m1:A1.0/i0@m0:A0.0".parse().unwrap(),
            "1/1".parse().unwrap(),
            Amount::from(100u64),
        )
        .unwrap();
    m0.receive_offer(&o1.to_propagated()).unwrap();

    store.fail_task_writes(true);
    let err = m0
        .create_transaction(request("i0@m0", "i0@m0:A0.0/i1@m1:A1.0", 10, "d1@m1", vec![o1.id]))
        .unwrap_err();
    assert_eq!(err.code(), "store_unavailable");

    assert!(store.transactions_by_status(SettlementStatus::Reserved).unwrap().is_empty());
    let canceled = store.transactions_by_status(SettlementStatus::Canceled).unwrap();
    assert_eq!(canceled.len(), 1);
    let view = m0.get_transaction(canceled[0].id).unwrap();
    assert!(view.operations.iter().all(|o| o.status == SettlementStatus::Canceled));
    assert!(store.tasks_by_status(TaskStatus::Pending).unwrap().is_empty());

    store.fail_task_writes(false);
    m0.create_transaction(request("i0@m0", "i0@m0:A0.0/i1@m1:A1.0", 10, "d1@m1", vec![o1.id]))
        .unwrap();
    assert_eq!(store.transactions_by_status(SettlementStatus::Reserved).unwrap().len(), 1);
}
