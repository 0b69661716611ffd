//! Operation and crossing storage trait.

use settle_types::{
    Asset, Crossing, CrossingId, Operation, OperationId, Result, SettlementStatus, TransactionId,
};

pub trait RecordStore {
    /// Returns `false` if an operation with this id already exists.
    fn insert_operation(&self, op: &Operation) -> Result<bool>;
    fn load_operation(&self, id: OperationId) -> Result<Option<Operation>>;
    /// Ordered by hop.
    fn operations_for_transaction(&self, tx: TransactionId) -> Result<Vec<Operation>>;
    /// Settled operations of an asset, for supply audits.
    fn settled_operations_for_asset(&self, asset: &Asset) -> Result<Vec<Operation>>;
    fn swap_operation_status(
        &self,
        id: OperationId,
        expected: SettlementStatus,
        to: SettlementStatus,
    ) -> Result<bool>;

    fn load_crossing(&self, id: CrossingId) -> Result<Option<Crossing>>;
    /// Ordered by hop.
    fn crossings_for_transaction(&self, tx: TransactionId) -> Result<Vec<Crossing>>;
    fn swap_crossing_status(
        &self,
        id: CrossingId,
        expected: SettlementStatus,
        to: SettlementStatus,
    ) -> Result<bool>;
}
