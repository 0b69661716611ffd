//! Per-hop ledger records: operations (asset movements) and crossings
//! (consumption of an offer's remainder).
//!
//! Both share the transaction's [`SettlementStatus`] state machine and are
//! keyed by `(transaction, hop)` through their deterministic ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Address, Amount, Asset, CrossingId, OfferId, OperationId, SettlementStatus, TransactionId,
};

/// Movement of `amount` of `asset` from `source` to `destination`.
///
/// The amount is fixed at reservation and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub created: DateTime<Utc>,
    /// Issuer of `asset`, i.e. the mint owner keeping this ledger.
    pub owner: Address,
    pub asset: Asset,
    pub source: Address,
    pub destination: Address,
    pub amount: Amount,
    pub status: SettlementStatus,
    pub transaction: TransactionId,
    pub hop: u8,
}

impl Operation {
    #[must_use]
    pub fn reserved(
        transaction: TransactionId,
        hop: u8,
        asset: Asset,
        source: Address,
        destination: Address,
        amount: Amount,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OperationId::for_hop(transaction, hop),
            created,
            owner: asset.issuer().clone(),
            asset,
            source,
            destination,
            amount,
            status: SettlementStatus::Reserved,
            transaction,
            hop,
        }
    }
}

/// Consumption of `amount` from an offer's remainder on behalf of a hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossing {
    pub id: CrossingId,
    pub created: DateTime<Utc>,
    /// Owner of the crossed offer.
    pub owner: Address,
    pub offer: OfferId,
    pub amount: Amount,
    pub status: SettlementStatus,
    pub transaction: TransactionId,
    pub hop: u8,
}

impl Crossing {
    #[must_use]
    pub fn reserved(
        transaction: TransactionId,
        hop: u8,
        offer: OfferId,
        owner: Address,
        amount: Amount,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CrossingId::for_hop(transaction, hop),
            created,
            owner,
            offer,
            amount,
            status: SettlementStatus::Reserved,
            transaction,
            hop,
        }
    }
}
