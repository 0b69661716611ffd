//! Transaction creation on the initiating mint and hop reservation on the
//! mints along the path.
//!
//! ```text
//!  initiating mint                               mint of hop i
//!  ───────────────                               ─────────────
//!  validate request + path
//!  reserve local crossings ──(fail)──▶ release, return error
//!  persist operations, then transaction
//!  enqueue ReserveHop(i) ─────────── task ─────▶ reserve_hop(i)
//!  enqueue PropagateOffer                           reserve crossing, operation
//!                                                   persist local copy + hop lock
//!  confirm_hop(i) ◀──────────────── task ok ──────
//!  reject_hop(i) ◀───────────── task failed ──────  (transaction canceled)
//! ```
//!
//! The initiator only accepts the secret once every remote hop is confirmed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use settle_offerbook::{HopPlan, plan_route};
use settle_store::prelude::*;
use settle_types::{
    CrossingId, HopReservation, Offer, OfferId, Operation, Result, SettleError, SettlementStatus,
    Transaction, TransactionId, TransactionView,
};
use tracing::{debug, info, warn};

use crate::engine::{CreatedTransaction, SettlementEngine, TransactionRequest};
use crate::lock::{generate_secret, hop_lock, lock_for};

impl SettlementEngine {
    // =================================================================
    // Initiating mint
    // =================================================================

    /// Reserve a transaction and hand its secret to the initiator.
    ///
    /// All validation happens before the first write. A failure while
    /// reserving local crossings releases the ones already taken.
    pub fn create_transaction(&self, request: TransactionRequest) -> Result<CreatedTransaction> {
        let now = self.clock.now();
        if request.owner.mint() != self.mint() {
            return Err(SettleError::InvalidRequest {
                reason: format!("initiator {} does not belong to mint {}", request.owner, self.mint()),
            });
        }

        let expiry = request
            .expiry
            .unwrap_or_else(|| now + Duration::milliseconds(self.config.transaction.expiry_ms));
        let remaining_ms = (expiry - now).num_milliseconds();
        if remaining_ms < self.config.transaction.expiry_buffer_ms {
            return Err(SettleError::ExpiryBufferViolation {
                remaining_ms,
                buffer_ms: self.config.transaction.expiry_buffer_ms,
            });
        }

        let mut offers = Vec::with_capacity(request.path.len());
        for id in &request.path {
            let offer = self
                .store
                .load_offer(*id)?
                .ok_or(SettleError::OfferNotFound(*id))?;
            if !offer.is_active() {
                return Err(SettleError::OfferNotActive(*id));
            }
            offers.push(offer);
        }

        let route = plan_route(
            &request.owner,
            &request.pair,
            request.amount,
            &request.destination,
            &offers,
        )?;
        if self.store.load_asset(&request.pair.base)?.is_none() {
            return Err(SettleError::AssetNotFound(request.pair.base.to_string()));
        }

        // Remote hops are checked against the last propagated snapshot only.
        for hop in route.hops.iter().filter(|h| h.mint != self.mint()) {
            let Some(offer) = &hop.offer else { continue };
            if offer.remainder < hop.amount {
                return Err(SettleError::OfferInsufficientRemainder {
                    offer: offer.id,
                    needed: hop.amount,
                    remainder: offer.remainder,
                });
            }
        }

        let id = TransactionId::new();
        let secret = generate_secret();
        let mut transaction = Transaction {
            id,
            created: now,
            owner: request.owner,
            mint: self.mint().to_owned(),
            pair: request.pair,
            amount: request.amount,
            destination: request.destination,
            path: request.path,
            status: SettlementStatus::Reserved,
            expiry,
            lock: lock_for(&secret),
            hop_locks: BTreeMap::new(),
            awaiting_hops: route
                .hops
                .iter()
                .filter(|h| h.mint != self.mint() && h.offer.is_some())
                .map(|h| h.hop)
                .collect(),
        };

        let local: Vec<&HopPlan> = route.hops_on(self.mint()).collect();
        let mut crossings: Vec<CrossingId> = Vec::new();
        if let Err(err) = self.reserve_local_hops(&transaction, &local, &mut crossings) {
            warn!(tx = %id, error = %err, released = crossings.len(), "transaction rejected, rolling back");
            self.roll_back(id, &crossings);
            return Err(err);
        }

        for hop in local.iter().filter(|h| h.hop > 0) {
            transaction
                .hop_locks
                .insert(hop.hop, hop_lock(&secret, id, hop.hop)?);
        }
        if !self.store.insert_transaction(&transaction)? {
            self.roll_back(id, &crossings);
            return Err(SettleError::Internal(format!("transaction {id} already exists")));
        }

        if let Err(err) = self.announce(&transaction, &route.hops, &secret) {
            warn!(tx = %id, error = %err, "outbox write failed, canceling transaction");
            self.roll_back(id, &crossings);
            match self.store.swap_transaction_status(
                id,
                SettlementStatus::Reserved,
                SettlementStatus::Canceled,
            ) {
                Ok(true) => {}
                Ok(false) => warn!(tx = %id, "transaction left reserved state during rollback"),
                Err(cancel) => warn!(tx = %id, error = %cancel, "rollback could not cancel transaction"),
            }
            return Err(err);
        }

        info!(
            tx = %id,
            owner = %transaction.owner,
            amount = %transaction.amount,
            delivered = %route.delivered(),
            hops = route.hops.len(),
            expiry = %transaction.expiry,
            "transaction reserved"
        );
        Ok(CreatedTransaction {
            view: self.view(transaction)?,
            secret,
        })
    }

    /// Record that the mint of `hop` acknowledged its reservation.
    ///
    /// Confirming a hop twice, or confirming on a transaction that already
    /// reached a terminal state, changes nothing.
    pub fn confirm_hop(&self, id: TransactionId, hop: u8) -> Result<TransactionView> {
        let transaction = self.load_transaction(id)?;
        if transaction.mint != self.mint() {
            return Err(SettleError::InvalidRequest {
                reason: format!("transaction {id} was initiated on {}", transaction.mint),
            });
        }
        if transaction.status == SettlementStatus::Reserved && self.store.confirm_hop(id, hop)? {
            info!(tx = %id, hop, "hop reservation confirmed");
        }
        self.get_transaction(id)
    }

    /// The mint of `hop` refused its reservation, or could not be reached
    /// within the retry bound. The transaction can no longer settle, so it is
    /// canceled here.
    pub fn reject_hop(&self, id: TransactionId, hop: u8, error: &SettleError) -> Result<TransactionView> {
        warn!(tx = %id, hop, code = error.code(), error = %error, "hop reservation rejected, canceling transaction");
        self.cancel(id)
    }

    /// Enqueue the reservation of every remote hop and the propagation of
    /// every local offer crossed.
    fn announce(&self, transaction: &Transaction, hops: &[HopPlan], secret: &str) -> Result<()> {
        let mut snapshot = transaction.clone();
        snapshot.hop_locks.clear();
        snapshot.awaiting_hops = BTreeSet::new();
        for hop in hops.iter().filter(|h| h.mint != self.mint()) {
            let Some(offer) = &hop.offer else { continue };
            self.outbox.reserve_hop(
                &hop.mint,
                HopReservation {
                    transaction: snapshot.clone(),
                    hop: hop.hop,
                    offer: offer.id,
                    amount_in: hop.amount_in,
                    recipient: hop.destination.clone(),
                    hop_lock: hop_lock(secret, transaction.id, hop.hop)?,
                },
            )?;
        }
        for hop in hops.iter().filter(|h| h.mint == self.mint()) {
            if let Some(offer) = &hop.offer {
                self.outbox.propagate_offer(offer)?;
            }
        }
        Ok(())
    }

    fn reserve_local_hops(
        &self,
        transaction: &Transaction,
        hops: &[&HopPlan],
        crossings: &mut Vec<CrossingId>,
    ) -> Result<()> {
        let now = self.clock.now();
        for hop in hops {
            if let Some(offer) = &hop.offer {
                let crossing =
                    self.book
                        .reserve_crossing(offer.id, transaction.id, hop.hop, hop.amount)?;
                crossings.push(crossing.id);
            }
        }
        for hop in hops {
            let op = Operation::reserved(
                transaction.id,
                hop.hop,
                hop.asset.clone(),
                hop.source.clone(),
                hop.destination.clone(),
                hop.amount,
                now,
            );
            self.store.insert_operation(&op)?;
        }
        Ok(())
    }

    /// Undo the local writes of a rejected creation.
    fn roll_back(&self, id: TransactionId, crossings: &[CrossingId]) {
        for crossing in crossings {
            if let Err(err) = self.book.release_crossing(*crossing) {
                warn!(tx = %id, %crossing, error = %err, "rollback could not release crossing");
            }
        }
        let operations = match self.store.operations_for_transaction(id) {
            Ok(operations) => operations,
            Err(err) => {
                warn!(tx = %id, error = %err, "rollback could not list operations");
                return;
            }
        };
        for op in operations {
            if let Err(err) = self.store.swap_operation_status(
                op.id,
                SettlementStatus::Reserved,
                SettlementStatus::Canceled,
            ) {
                warn!(tx = %id, op = %op.id, error = %err, "rollback could not cancel operation");
            }
        }
    }

    // =================================================================
    // Mint of a remote hop
    // =================================================================

    /// Receiving end of a hop reservation request.
    ///
    /// Re-delivery of the same `(transaction, hop)` lands on the records the
    /// first delivery wrote and returns the current view. A re-delivery that
    /// disagrees with those records fails with `ReservationConflict` and
    /// leaves them untouched.
    pub fn reserve_hop(&self, request: HopReservation) -> Result<TransactionView> {
        let HopReservation {
            transaction: remote,
            hop,
            offer: offer_id,
            amount_in,
            recipient,
            hop_lock,
        } = request;
        let id = remote.id;

        if let Some(local) = self.store.load_transaction(id)? {
            match local.status {
                SettlementStatus::Canceled => return Err(SettleError::TransactionCanceled(id)),
                SettlementStatus::Settled => return self.view(local),
                SettlementStatus::Reserved => {}
            }
            let conflict = if local.lock != remote.lock
                || local.mint != remote.mint
                || local.path != remote.path
            {
                Some("transaction differs from the copy held")
            } else if local.hop_lock(hop).is_some_and(|held| held != hop_lock) {
                Some("hop lock differs from the one held")
            } else {
                None
            };
            if let Some(reason) = conflict {
                warn!(tx = %id, hop, reason, "conflicting hop reservation");
                return Err(SettleError::ReservationConflict {
                    transaction: id,
                    hop,
                    reason: reason.to_owned(),
                });
            }
        }

        let redelivered = self
            .store
            .load_crossing(CrossingId::for_hop(id, hop))?
            .is_some();
        if !redelivered {
            remote.ensure_expiry_buffer(self.clock.now(), self.config.transaction.expiry_buffer_ms)?;
        }

        let offer = self.hop_offer(&remote, hop, offer_id)?;
        if hop_lock.is_empty() {
            return Err(SettleError::InvalidRequest {
                reason: format!("reservation of hop {hop} of {id} carries no lock"),
            });
        }
        let amount = offer.price.apply(amount_in)?;
        if amount.is_zero() {
            return Err(SettleError::PathInvalid {
                reason: format!("offer {offer_id} pays nothing for {amount_in} at {}", offer.price),
            });
        }

        let crossing = self.book.reserve_crossing(offer_id, id, hop, amount)?;
        let op = Operation::reserved(
            id,
            hop,
            offer.pair.base.clone(),
            offer.owner.clone(),
            recipient,
            amount,
            self.clock.now(),
        );
        if !self.store.insert_operation(&op)? {
            if let Some(held) = self.store.load_operation(op.id)? {
                if held.destination != op.destination || held.amount != op.amount {
                    return Err(SettleError::ReservationConflict {
                        transaction: id,
                        hop,
                        reason: format!("hop already pays {} to {}", held.amount, held.destination),
                    });
                }
            }
        }

        let mut copy = remote;
        copy.status = SettlementStatus::Reserved;
        copy.hop_locks = BTreeMap::from([(hop, hop_lock.clone())]);
        copy.awaiting_hops.clear();
        if !self.store.insert_transaction(&copy)? {
            self.store.add_hop_lock(id, hop, &hop_lock)?;
        }

        let current = self.load_transaction(id)?;
        if current.status == SettlementStatus::Canceled {
            // Canceled between the status check and the writes above.
            self.cancel(id)?;
            return Err(SettleError::TransactionCanceled(id));
        }

        if !redelivered {
            self.outbox.propagate_offer(&self.book.get_offer(offer_id)?)?;
            info!(tx = %id, hop, crossing = %crossing.id, offer = %offer_id, amount = %amount, "hop reserved");
        } else {
            debug!(tx = %id, hop, "hop reservation redelivered");
        }
        self.view(current)
    }

    /// The canonical offer crossed by `hop`, checked against the path.
    fn hop_offer(&self, transaction: &Transaction, hop: u8, offer_id: OfferId) -> Result<Offer> {
        let index = usize::from(hop);
        if index == 0 || index > transaction.path.len() {
            return Err(SettleError::InvalidRequest {
                reason: format!("hop {hop} outside the path of {}", transaction.id),
            });
        }
        if transaction.path[index - 1] != offer_id {
            return Err(SettleError::PathInvalid {
                reason: format!("offer {offer_id} is not at hop {hop} of {}", transaction.id),
            });
        }
        let offer = self.book.get_offer(offer_id)?;
        if !offer.is_canonical() {
            return Err(SettleError::PathInvalid {
                reason: format!("offer {offer_id} is not canonical on mint {}", self.mint()),
            });
        }
        Ok(offer)
    }
}
