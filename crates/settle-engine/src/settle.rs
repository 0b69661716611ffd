//! Settlement by secret reveal.
//!
//! ```text
//!  settle(tx, request)
//!    SETTLED   ──▶ finish leftover local records, return view
//!    CANCELED  ──▶ TransactionCanceled
//!    expired   ──▶ cancel, SettlementFailed
//!    bad hash  ──▶ SecretInvalid (nothing written)
//!    remote hop not yet confirmed ──▶ HopsUnconfirmed (nothing written)
//!    Initiator ──▶ CAS reserved→settled, settle every local record,
//!                  enqueue RevealSecret(s_i) per remote hop
//!    Hop(i)    ──▶ settle the records of hop i,
//!                  CAS reserved→settled once nothing local is reserved
//! ```
//!
//! Nothing here waits on another mint.

use settle_store::prelude::*;
use settle_types::{
    Result, SecretReveal, SettleError, SettlementStatus, Transaction, TransactionId,
    TransactionView,
};
use tracing::{debug, info, warn};

use crate::engine::{SettleRequest, SettlementEngine};
use crate::lock::{hop_secret, opens};

impl SettlementEngine {
    /// Settle a transaction, or one of its hops, by revealing a secret.
    pub fn settle(&self, id: TransactionId, request: SettleRequest) -> Result<TransactionView> {
        let transaction = self.load_transaction(id)?;
        let scope = match &request {
            SettleRequest::Initiator { .. } => None,
            SettleRequest::Hop { hop, .. } => Some(*hop),
        };
        match transaction.status {
            SettlementStatus::Settled => {
                self.settle_local_records(&transaction, scope)?;
                return self.get_transaction(id);
            }
            SettlementStatus::Canceled => return Err(SettleError::TransactionCanceled(id)),
            SettlementStatus::Reserved => {}
        }

        if transaction.is_expired(self.clock.now()) {
            self.cancel(id)?;
            return Err(SettleError::SettlementFailed {
                reason: format!("transaction {id} expired at {}", transaction.expiry),
            });
        }

        match request {
            SettleRequest::Initiator { secret } => self.settle_as_initiator(transaction, &secret),
            SettleRequest::Hop { hop, secret } => self.settle_hop(transaction, hop, &secret),
        }
    }

    /// Receiving end of a secret relay.
    pub fn reveal_secret(&self, reveal: SecretReveal) -> Result<TransactionView> {
        self.settle(
            reveal.transaction,
            SettleRequest::Hop {
                hop: reveal.hop,
                secret: reveal.secret,
            },
        )
    }

    fn settle_as_initiator(&self, transaction: Transaction, secret: &str) -> Result<TransactionView> {
        let id = transaction.id;
        if transaction.mint != self.mint() {
            return Err(SettleError::InvalidRequest {
                reason: format!(
                    "transaction {id} was initiated on {}, settle it there",
                    transaction.mint
                ),
            });
        }
        if !opens(secret, &transaction.lock) {
            warn!(tx = %id, "secret does not open the transaction lock");
            return Err(SettleError::SecretInvalid(id));
        }
        if let Err(err) = transaction.ensure_hops_confirmed() {
            debug!(tx = %id, awaiting = ?transaction.awaiting_hops, "settlement before every hop was confirmed");
            return Err(err);
        }

        if !self.store.swap_transaction_status(
            id,
            SettlementStatus::Reserved,
            SettlementStatus::Settled,
        )? {
            let current = self.load_transaction(id)?;
            return match current.status {
                SettlementStatus::Settled => {
                    self.settle_local_records(&current, None)?;
                    self.view(current)
                }
                SettlementStatus::Canceled => Err(SettleError::TransactionCanceled(id)),
                SettlementStatus::Reserved => Err(SettleError::StoreConflict {
                    entity: format!("transaction {id}"),
                }),
            };
        }

        let applied = self.settle_local_records(&transaction, None)?;

        let mut reveals = 0;
        for (i, offer_id) in transaction.path.iter().enumerate() {
            let offer = self.book.get_offer(*offer_id)?;
            if offer.mint() == self.mint() {
                continue;
            }
            let hop = u8::try_from(i + 1)
                .map_err(|_| SettleError::Internal(format!("hop index {} overflows", i + 1)))?;
            self.outbox.reveal_secret(
                offer.mint(),
                SecretReveal {
                    transaction: id,
                    hop,
                    secret: hop_secret(secret, id, hop)?,
                },
            )?;
            reveals += 1;
        }

        info!(tx = %id, applied, reveals, "transaction settled");
        self.get_transaction(id)
    }

    fn settle_hop(&self, transaction: Transaction, hop: u8, secret: &str) -> Result<TransactionView> {
        let id = transaction.id;
        let Some(lock) = transaction.hop_lock(hop) else {
            return Err(SettleError::InvalidRequest {
                reason: format!("hop {hop} of {id} is not kept by mint {}", self.mint()),
            });
        };
        if !opens(secret, lock) {
            warn!(tx = %id, hop, "secret does not open the hop lock");
            return Err(SettleError::SecretInvalid(id));
        }

        let applied = self.settle_local_records(&transaction, Some(hop))?;

        let pending_ops = self
            .store
            .operations_for_transaction(id)?
            .iter()
            .any(|op| op.status == SettlementStatus::Reserved);
        let pending_crossings = self
            .store
            .crossings_for_transaction(id)?
            .iter()
            .any(|c| c.status == SettlementStatus::Reserved);
        let drained = !pending_ops && !pending_crossings;
        if drained
            && self.store.swap_transaction_status(
                id,
                SettlementStatus::Reserved,
                SettlementStatus::Settled,
            )?
        {
            info!(tx = %id, "local copy settled");
        }

        info!(tx = %id, hop, applied, "hop settled");
        self.get_transaction(id)
    }

    /// Settle the reserved operations and crossings of `transaction` kept on
    /// this mint, all of them or only those of one hop, and apply the
    /// balance effects of every settled operation in scope.
    ///
    /// Returns how many balance legs were applied by this call.
    pub(crate) fn settle_local_records(
        &self,
        transaction: &Transaction,
        hop: Option<u8>,
    ) -> Result<usize> {
        let in_scope = |h: u8| hop.is_none_or(|only| only == h);

        let mut applied = 0;
        for op in self.store.operations_for_transaction(transaction.id)? {
            if !in_scope(op.hop) || op.status == SettlementStatus::Canceled {
                continue;
            }
            let mut settled = op;
            if settled.status == SettlementStatus::Reserved
                && !self.store.swap_operation_status(
                    settled.id,
                    SettlementStatus::Reserved,
                    SettlementStatus::Settled,
                )?
            {
                match self.store.load_operation(settled.id)? {
                    Some(current) if current.status == SettlementStatus::Settled => {}
                    _ => {
                        debug!(op = %settled.id, "operation left reserved state concurrently");
                        continue;
                    }
                }
            }
            settled.status = SettlementStatus::Settled;
            applied += self.ledger.apply_settled_operation(&settled)?;
        }

        for crossing in self.store.crossings_for_transaction(transaction.id)? {
            if in_scope(crossing.hop) && crossing.status == SettlementStatus::Reserved {
                self.book.settle_crossing(crossing.id)?;
            }
        }
        Ok(applied)
    }
}
