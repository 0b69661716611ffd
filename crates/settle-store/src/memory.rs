//! In-memory ledger store.
//!
//! All tables sit behind one `parking_lot::RwLock`, so every trait call is a
//! single atomic step, the in-process analogue of one database transaction.
//! The tables do not exist until [`LedgerStore::migrate`] creates them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use settle_types::{
    Address, Asset, AssetRecord, Balance, BalanceEffect, BalanceToken, Crossing, CrossingId,
    Offer, OfferId, Operation, OperationId, Pair, Propagation, Result, SettleError,
    SettlementStatus, Task, TaskId, TaskStatus, Transaction, TransactionId,
};
use tracing::{debug, info, warn};

use crate::{
    AssetStore, BalanceStore, CrossingWrite, LedgerStore, OfferStore, RecordStore, TaskStore,
    TransactionStore,
};

#[derive(Debug, Default)]
struct Tables {
    assets: BTreeMap<Asset, AssetRecord>,
    offers: BTreeMap<OfferId, Offer>,
    operations: BTreeMap<OperationId, Operation>,
    crossings: BTreeMap<CrossingId, Crossing>,
    transactions: BTreeMap<TransactionId, Transaction>,
    /// Primary key `(owner, token)`.
    balances: BTreeMap<(Address, BalanceToken), Balance>,
    /// Unique index `(asset, holder)` into `balances`.
    balance_index: HashMap<(Asset, Address), (Address, BalanceToken)>,
    effects: HashSet<String>,
    tasks: BTreeMap<TaskId, Task>,
}

/// Ledger store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Option<Tables>>,
    /// When set, task inserts fail as if the backend were down.
    task_writes_failing: AtomicBool,
}

impl MemoryStore {
    /// An empty store. Call [`LedgerStore::migrate`] before use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R> {
        let guard = self.tables.read();
        guard.as_ref().map(f).ok_or_else(not_migrated)
    }

    /// Make every following `insert_task` fail with `StoreUnavailable`.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn fail_task_writes(&self, failing: bool) {
        self.task_writes_failing.store(failing, Ordering::SeqCst);
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> Result<R> {
        let mut guard = self.tables.write();
        guard.as_mut().map(f).ok_or_else(not_migrated)
    }
}

fn not_migrated() -> SettleError {
    SettleError::StoreUnavailable {
        reason: "schema not migrated".into(),
    }
}

impl LedgerStore for MemoryStore {
    fn migrate(&self) -> Result<()> {
        let mut guard = self.tables.write();
        if guard.is_none() {
            *guard = Some(Tables::default());
            info!("memory store schema created");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

impl AssetStore for MemoryStore {
    fn insert_asset(&self, record: &AssetRecord) -> Result<bool> {
        self.write(|t| {
            if t.assets.contains_key(&record.asset) {
                return false;
            }
            t.assets.insert(record.asset.clone(), record.clone());
            true
        })
    }

    fn load_asset(&self, asset: &Asset) -> Result<Option<AssetRecord>> {
        self.read(|t| t.assets.get(asset).cloned())
    }

    fn list_assets(&self) -> Result<Vec<AssetRecord>> {
        self.read(|t| t.assets.values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

impl OfferStore for MemoryStore {
    fn insert_offer(&self, offer: &Offer) -> Result<()> {
        self.write(|t| {
            if t.offers.contains_key(&offer.id) {
                return Err(SettleError::StoreConflict {
                    entity: format!("offer {}", offer.id),
                });
            }
            t.offers.insert(offer.id, offer.clone());
            Ok(())
        })?
    }

    fn load_offer(&self, id: OfferId) -> Result<Option<Offer>> {
        self.read(|t| t.offers.get(&id).cloned())
    }

    fn list_offers(&self) -> Result<Vec<Offer>> {
        self.read(|t| t.offers.values().cloned().collect())
    }

    fn offers_for_pair(&self, pair: &Pair) -> Result<Vec<Offer>> {
        self.read(|t| {
            t.offers
                .values()
                .filter(|o| &o.pair == pair)
                .cloned()
                .collect()
        })
    }

    fn swap_offer(&self, expected_revision: u64, updated: &Offer) -> Result<bool> {
        self.write(|t| {
            let stored = t
                .offers
                .get_mut(&updated.id)
                .ok_or(SettleError::OfferNotFound(updated.id))?;
            if !stored.is_canonical() {
                return Err(SettleError::OfferNotCanonical(updated.id));
            }
            if stored.revision != expected_revision {
                return Ok(false);
            }
            *stored = updated.clone();
            Ok(true)
        })?
    }

    fn upsert_propagated(&self, snapshot: &Offer) -> Result<bool> {
        let mut mirror = snapshot.clone();
        mirror.propagation = Propagation::Propagated;
        self.write(|t| match t.offers.get(&mirror.id) {
            Some(existing) if existing.is_canonical() => false,
            Some(existing) if existing.revision >= mirror.revision => false,
            _ => {
                t.offers.insert(mirror.id, mirror);
                true
            }
        })
    }

    fn cross_offer(
        &self,
        expected_revision: u64,
        offer: &Offer,
        crossing: &Crossing,
    ) -> Result<CrossingWrite> {
        self.write(|t| {
            if let Some(existing) = t.crossings.get(&crossing.id) {
                return Ok(CrossingWrite::Existing(existing.clone()));
            }
            let stored = t
                .offers
                .get_mut(&offer.id)
                .ok_or(SettleError::OfferNotFound(offer.id))?;
            if !stored.is_canonical() {
                return Err(SettleError::OfferNotCanonical(offer.id));
            }
            if stored.revision != expected_revision {
                return Ok(CrossingWrite::Stale);
            }
            *stored = offer.clone();
            t.crossings.insert(crossing.id, crossing.clone());
            debug!(crossing = %crossing.id, offer = %offer.id, remainder = %offer.remainder, "crossing stored");
            Ok(CrossingWrite::Applied)
        })?
    }

    fn uncross_offer(
        &self,
        expected_revision: u64,
        offer: &Offer,
        crossing: CrossingId,
    ) -> Result<CrossingWrite> {
        self.write(|t| -> Result<CrossingWrite> {
            let stored_crossing = t
                .crossings
                .get(&crossing)
                .ok_or_else(|| SettleError::Internal(format!("crossing {crossing} not found")))?;
            if stored_crossing.status != SettlementStatus::Reserved {
                return Ok(CrossingWrite::Existing(stored_crossing.clone()));
            }
            let stored = t
                .offers
                .get_mut(&offer.id)
                .ok_or(SettleError::OfferNotFound(offer.id))?;
            if stored.revision != expected_revision {
                return Ok(CrossingWrite::Stale);
            }
            *stored = offer.clone();
            if let Some(c) = t.crossings.get_mut(&crossing) {
                c.status = SettlementStatus::Canceled;
            }
            Ok(CrossingWrite::Applied)
        })?
    }
}

// ---------------------------------------------------------------------------
// Operations & crossings
// ---------------------------------------------------------------------------

impl RecordStore for MemoryStore {
    fn insert_operation(&self, op: &Operation) -> Result<bool> {
        self.write(|t| {
            if t.operations.contains_key(&op.id) {
                return false;
            }
            t.operations.insert(op.id, op.clone());
            true
        })
    }

    fn load_operation(&self, id: OperationId) -> Result<Option<Operation>> {
        self.read(|t| t.operations.get(&id).cloned())
    }

    fn operations_for_transaction(&self, tx: TransactionId) -> Result<Vec<Operation>> {
        self.read(|t| {
            let mut ops: Vec<Operation> = t
                .operations
                .values()
                .filter(|op| op.transaction == tx)
                .cloned()
                .collect();
            ops.sort_by_key(|op| op.hop);
            ops
        })
    }

    fn settled_operations_for_asset(&self, asset: &Asset) -> Result<Vec<Operation>> {
        self.read(|t| {
            t.operations
                .values()
                .filter(|op| &op.asset == asset && op.status == SettlementStatus::Settled)
                .cloned()
                .collect()
        })
    }

    fn swap_operation_status(
        &self,
        id: OperationId,
        expected: SettlementStatus,
        to: SettlementStatus,
    ) -> Result<bool> {
        self.write(|t| match t.operations.get_mut(&id) {
            Some(op) if op.status == expected => {
                op.status = to;
                true
            }
            _ => false,
        })
    }

    fn load_crossing(&self, id: CrossingId) -> Result<Option<Crossing>> {
        self.read(|t| t.crossings.get(&id).cloned())
    }

    fn crossings_for_transaction(&self, tx: TransactionId) -> Result<Vec<Crossing>> {
        self.read(|t| {
            let mut crossings: Vec<Crossing> = t
                .crossings
                .values()
                .filter(|c| c.transaction == tx)
                .cloned()
                .collect();
            crossings.sort_by_key(|c| c.hop);
            crossings
        })
    }

    fn swap_crossing_status(
        &self,
        id: CrossingId,
        expected: SettlementStatus,
        to: SettlementStatus,
    ) -> Result<bool> {
        self.write(|t| match t.crossings.get_mut(&id) {
            Some(c) if c.status == expected => {
                c.status = to;
                true
            }
            _ => false,
        })
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

impl TransactionStore for MemoryStore {
    fn insert_transaction(&self, tx: &Transaction) -> Result<bool> {
        self.write(|t| {
            if t.transactions.contains_key(&tx.id) {
                return false;
            }
            t.transactions.insert(tx.id, tx.clone());
            true
        })
    }

    fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.read(|t| t.transactions.get(&id).cloned())
    }

    fn swap_transaction_status(
        &self,
        id: TransactionId,
        expected: SettlementStatus,
        to: SettlementStatus,
    ) -> Result<bool> {
        self.write(|t| -> Result<bool> {
            let tx = t
                .transactions
                .get_mut(&id)
                .ok_or(SettleError::TransactionNotFound(id))?;
            if tx.status != expected {
                return Ok(false);
            }
            tx.status = to;
            Ok(true)
        })?
    }

    fn add_hop_lock(&self, id: TransactionId, hop: u8, lock: &str) -> Result<bool> {
        self.write(|t| -> Result<bool> {
            let tx = t
                .transactions
                .get_mut(&id)
                .ok_or(SettleError::TransactionNotFound(id))?;
            if tx.hop_locks.contains_key(&hop) {
                return Ok(false);
            }
            tx.hop_locks.insert(hop, lock.to_owned());
            Ok(true)
        })?
    }

    fn confirm_hop(&self, id: TransactionId, hop: u8) -> Result<bool> {
        self.write(|t| -> Result<bool> {
            let tx = t
                .transactions
                .get_mut(&id)
                .ok_or(SettleError::TransactionNotFound(id))?;
            Ok(tx.awaiting_hops.remove(&hop))
        })?
    }

    fn transactions_by_status(&self, status: SettlementStatus) -> Result<Vec<Transaction>> {
        self.read(|t| {
            t.transactions
                .values()
                .filter(|tx| tx.status == status)
                .cloned()
                .collect()
        })
    }
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

impl BalanceStore for MemoryStore {
    fn load_balance(&self, asset: &Asset, holder: &Address) -> Result<Option<Balance>> {
        self.read(|t| {
            t.balance_index
                .get(&(asset.clone(), holder.clone()))
                .and_then(|key| t.balances.get(key))
                .cloned()
        })
    }

    fn balances_for_asset(&self, asset: &Asset) -> Result<Vec<Balance>> {
        self.read(|t| {
            t.balances
                .values()
                .filter(|b| &b.asset == asset)
                .cloned()
                .collect()
        })
    }

    fn apply_effect(&self, effect: &BalanceEffect, now: DateTime<Utc>) -> Result<bool> {
        self.write(|t| -> Result<bool> {
            if t.effects.contains(&effect.key) {
                return Ok(false);
            }
            let index_key = (effect.asset.clone(), effect.holder.clone());
            let row_key = match t.balance_index.get(&index_key) {
                Some(key) => key.clone(),
                None => {
                    let row = Balance::empty(effect.asset.clone(), effect.holder.clone(), now);
                    let key = (row.owner.clone(), row.token);
                    t.balances.insert(key.clone(), row);
                    t.balance_index.insert(index_key, key.clone());
                    key
                }
            };
            let row = t
                .balances
                .get_mut(&row_key)
                .ok_or_else(|| SettleError::Internal(format!("balance index dangling for {}", effect.holder)))?;
            row.value = row.value.checked_add(effect.delta).ok_or_else(|| {
                SettleError::Internal(format!("balance overflow for {}", effect.holder))
            })?;
            t.effects.insert(effect.key.clone());
            Ok(true)
        })?
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

impl TaskStore for MemoryStore {
    fn insert_task(&self, task: &Task) -> Result<()> {
        if self.task_writes_failing.load(Ordering::SeqCst) {
            return Err(SettleError::StoreUnavailable {
                reason: "task table is not writable".into(),
            });
        }
        self.write(|t| {
            if t.tasks.contains_key(&task.id) {
                return Err(SettleError::StoreConflict {
                    entity: format!("task {}", task.id),
                });
            }
            t.tasks.insert(task.id, task.clone());
            Ok(())
        })?
    }

    fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.read(|t| t.tasks.get(&id).cloned())
    }

    fn claim_due_task(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Task>> {
        self.write(|t| {
            let id = t
                .tasks
                .values()
                .filter(|task| task.is_claimable(now, stale_before))
                .min_by_key(|task| (task.scheduled_at, task.id))
                .map(|task| task.id)?;
            let task = t.tasks.get_mut(&id)?;
            if task.status == TaskStatus::InFlight {
                warn!(task = %task.id, kind = task.kind.name(), claimed_at = ?task.claimed_at, "reclaiming abandoned task");
            }
            task.status = TaskStatus::InFlight;
            task.claimed_at = Some(now);
            Some(task.clone())
        })
    }

    fn finish_task(&self, task: &Task) -> Result<bool> {
        self.write(|t| match t.tasks.get_mut(&task.id) {
            Some(stored)
                if stored.status == TaskStatus::InFlight && stored.claimed_at == task.claimed_at =>
            {
                *stored = task.clone();
                true
            }
            _ => false,
        })
    }

    fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        self.read(|t| {
            t.tasks
                .values()
                .filter(|task| task.status == status)
                .cloned()
                .collect()
        })
    }
}
