//! Cancellation and the expiry sweep.
//!
//! Canceling is local to the mint doing it: each mint along a path sweeps
//! its own copy of the transaction once the shared expiry has passed.

use std::collections::BTreeSet;

use settle_store::prelude::*;
use settle_types::{
    OfferId, Result, SettleError, SettlementStatus, Transaction, TransactionId, TransactionView,
};
use tracing::{info, warn};

use crate::engine::SettlementEngine;

impl SettlementEngine {
    /// Cancel a reserved transaction and release everything it holds here.
    ///
    /// Settled transactions are returned unchanged. Canceling a canceled
    /// transaction releases any record a previous attempt left behind.
    pub fn cancel(&self, id: TransactionId) -> Result<TransactionView> {
        let transaction = self.load_transaction(id)?;
        match transaction.status {
            SettlementStatus::Settled => return self.view(transaction),
            SettlementStatus::Canceled => {
                self.release_local_records(&transaction)?;
                return self.get_transaction(id);
            }
            SettlementStatus::Reserved => {}
        }

        if !self.store.swap_transaction_status(
            id,
            SettlementStatus::Reserved,
            SettlementStatus::Canceled,
        )? {
            let current = self.load_transaction(id)?;
            if current.status == SettlementStatus::Settled {
                return self.view(current);
            }
        }

        let released = self.release_local_records(&transaction)?;
        info!(tx = %id, released, "transaction canceled");
        self.get_transaction(id)
    }

    /// Cancel every reserved transaction whose expiry has passed.
    ///
    /// Returns how many were canceled by this sweep.
    pub fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut canceled = 0;
        for transaction in self.store.transactions_by_status(SettlementStatus::Reserved)? {
            if !transaction.is_expired(now) {
                continue;
            }
            match self.cancel(transaction.id) {
                Ok(view) if view.transaction.status == SettlementStatus::Canceled => canceled += 1,
                Ok(_) => {}
                Err(err) => {
                    warn!(tx = %transaction.id, error = %err, "expiry sweep could not cancel");
                }
            }
        }
        if canceled > 0 {
            info!(canceled, "expired transactions swept");
        }
        Ok(canceled)
    }

    /// Cancel reserved operations, release reserved crossings and queue a
    /// refresh of every offer whose remainder came back.
    fn release_local_records(&self, transaction: &Transaction) -> Result<usize> {
        let id = transaction.id;
        for op in self.store.operations_for_transaction(id)? {
            if op.status == SettlementStatus::Reserved {
                self.store.swap_operation_status(
                    op.id,
                    SettlementStatus::Reserved,
                    SettlementStatus::Canceled,
                )?;
            }
        }

        let mut touched: BTreeSet<OfferId> = BTreeSet::new();
        for crossing in self.store.crossings_for_transaction(id)? {
            if crossing.status != SettlementStatus::Reserved {
                continue;
            }
            match self.book.release_crossing(crossing.id) {
                Ok(_) => {
                    touched.insert(crossing.offer);
                }
                // settled by a concurrent hop reveal
                Err(SettleError::InvalidRequest { reason }) => {
                    warn!(tx = %id, crossing = %crossing.id, %reason, "crossing not released");
                }
                Err(err) => return Err(err),
            }
        }

        for offer in &touched {
            self.outbox.propagate_offer(&self.book.get_offer(*offer)?)?;
        }
        Ok(touched.len())
    }
}
