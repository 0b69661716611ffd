//! Payloads exchanged between mints.
//!
//! Every message is idempotent at the receiver: re-delivering a reservation
//! lands on the same `(transaction, hop)` records, re-delivering a reveal
//! finds them already settled.

use serde::{Deserialize, Serialize};

use crate::{Address, Amount, OfferId, Transaction, TransactionId};

/// Ask the mint owning a path offer to reserve its hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopReservation {
    /// Snapshot of the transaction as created by the initiating mint.
    /// Its `hop_locks` are not shipped; `hop_lock` carries the one for this hop.
    pub transaction: Transaction,
    pub hop: u8,
    pub offer: OfferId,
    /// Amount of the offer's quote asset flowing into the hop.
    pub amount_in: Amount,
    /// Who receives the offer's base asset.
    pub recipient: Address,
    pub hop_lock: String,
}

/// Relay of a hop secret after the initiating mint settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReveal {
    pub transaction: TransactionId,
    pub hop: u8,
    pub secret: String,
}
