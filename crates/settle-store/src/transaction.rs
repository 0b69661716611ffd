//! Transaction storage trait.

use settle_types::{Result, SettlementStatus, Transaction, TransactionId};

pub trait TransactionStore {
    /// Returns `false` if the transaction already exists.
    fn insert_transaction(&self, tx: &Transaction) -> Result<bool>;
    fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Move a transaction from `expected` to `to`. Returns `false` if the
    /// stored status was not `expected`.
    fn swap_transaction_status(
        &self,
        id: TransactionId,
        expected: SettlementStatus,
        to: SettlementStatus,
    ) -> Result<bool>;

    /// Record the lock of a hop held on this mint. Existing locks are kept.
    fn add_hop_lock(&self, id: TransactionId, hop: u8, lock: &str) -> Result<bool>;

    /// Drop `hop` from the hops awaiting confirmation. Returns `false` if it
    /// was not awaited.
    fn confirm_hop(&self, id: TransactionId, hop: u8) -> Result<bool>;

    fn transactions_by_status(&self, status: SettlementStatus) -> Result<Vec<Transaction>>;
}
