//! Transactions and the settlement state machine shared by transactions,
//! operations and crossings.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────────┐  secret revealed   ┌─────────┐
//!   │ RESERVED ├───────────────────▶│ SETTLED │
//!   └────┬─────┘                    └─────────┘
//!        │ cancel / expiry sweep
//!        ▼
//!   ┌──────────┐
//!   │ CANCELED │
//!   └──────────┘
//! ```
//!
//! Exactly one transition ever happens. Re-entering the terminal state the
//! record is already in is a no-op for callers.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, Amount, Crossing, OfferId, Operation, Pair, Result, SettleError, TransactionId};

/// Status of a transaction, operation or crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Reserved,
    Settled,
    Canceled,
}

impl SettlementStatus {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Reserved, Self::Settled | Self::Canceled))
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Reserved)
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reserved => write!(f, "reserved"),
            Self::Settled => write!(f, "settled"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// An end-to-end transfer from `owner` to `destination` along `path`.
///
/// Every mint on the path keeps its own copy under the same id. Only the
/// initiating mint (`mint`) ever learns the transaction secret; the others
/// hold the lock of their own hops in `hop_locks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub created: DateTime<Utc>,
    /// The initiator.
    pub owner: Address,
    /// The initiating mint.
    pub mint: String,
    /// Source asset / destination asset.
    pub pair: Pair,
    pub amount: Amount,
    pub destination: Address,
    pub path: Vec<OfferId>,
    pub status: SettlementStatus,
    pub expiry: DateTime<Utc>,
    /// `hex(SHA-256(domain ‖ secret))`.
    pub lock: String,
    /// Locks of the hops whose records live on this mint.
    #[serde(default)]
    pub hop_locks: BTreeMap<u8, String>,
    /// Remote hops whose mint has not yet acknowledged its reservation.
    /// Only the initiating mint fills this; settlement waits for it to drain.
    #[serde(default)]
    pub awaiting_hops: BTreeSet<u8>,
}

impl Transaction {
    /// Number of hops: one per path offer plus the initiator's own leg.
    #[must_use]
    pub fn hop_count(&self) -> usize {
        self.path.len() + 1
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }

    #[must_use]
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.expiry - now).num_milliseconds()
    }

    /// Reject work on a transaction with less than `buffer_ms` left.
    pub fn ensure_expiry_buffer(&self, now: DateTime<Utc>, buffer_ms: i64) -> Result<()> {
        let remaining_ms = self.remaining_ms(now);
        if remaining_ms < buffer_ms {
            return Err(SettleError::ExpiryBufferViolation {
                remaining_ms,
                buffer_ms,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn hop_lock(&self, hop: u8) -> Option<&str> {
        self.hop_locks.get(&hop).map(String::as_str)
    }

    /// Fail with `HopsUnconfirmed` while a remote reservation is outstanding.
    pub fn ensure_hops_confirmed(&self) -> Result<()> {
        if self.awaiting_hops.is_empty() {
            return Ok(());
        }
        Err(SettleError::HopsUnconfirmed {
            transaction: self.id,
            hops: self.awaiting_hops.iter().copied().collect(),
        })
    }
}

/// A transaction together with the records this mint keeps for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub transaction: Transaction,
    pub operations: Vec<Operation>,
    pub crossings: Vec<Crossing>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tx(expiry: DateTime<Utc>) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            created: Utc::now(),
            owner: "u0@m0".parse().unwrap(),
            mint: "m0".into(),
            pair: "i0@m0:A0.0/i0@m0:A0.0".parse().unwrap(),
            amount: Amount::from(1u64),
            destination: "u1@m0".parse().unwrap(),
            path: Vec::new(),
            status: SettlementStatus::Reserved,
            expiry,
            lock: "00".into(),
            hop_locks: BTreeMap::new(),
            awaiting_hops: BTreeSet::new(),
        }
    }

    #[test]
    fn valid_transitions() {
        let r = SettlementStatus::Reserved;
        assert!(r.can_transition_to(SettlementStatus::Settled));
        assert!(r.can_transition_to(SettlementStatus::Canceled));
        assert!(!r.can_transition_to(SettlementStatus::Reserved));
    }

    #[test]
    fn terminal_states_are_final() {
        for s in [SettlementStatus::Settled, SettlementStatus::Canceled] {
            assert!(s.is_terminal());
            assert!(!s.can_transition_to(SettlementStatus::Reserved));
            assert!(!s.can_transition_to(SettlementStatus::Settled));
            assert!(!s.can_transition_to(SettlementStatus::Canceled));
        }
    }

    #[test]
    fn expiry_buffer() {
        let now = Utc::now();
        let t = tx(now + Duration::seconds(30));
        let err = t.ensure_expiry_buffer(now, 60_000).unwrap_err();
        assert!(matches!(err, SettleError::ExpiryBufferViolation { remaining_ms: 30_000, .. }));
        assert!(t.ensure_expiry_buffer(now, 10_000).is_ok());
        assert!(!t.is_expired(now));
        assert!(t.is_expired(now + Duration::seconds(31)));
    }

    #[test]
    fn hop_count_includes_initiator_leg() {
        let mut t = tx(Utc::now());
        assert_eq!(t.hop_count(), 1);
        t.path = vec![OfferId::new(), OfferId::new()];
        assert_eq!(t.hop_count(), 3);
    }

    #[test]
    fn settlement_waits_for_every_remote_hop() {
        let mut t = tx(Utc::now());
        assert!(t.ensure_hops_confirmed().is_ok());
        t.awaiting_hops = BTreeSet::from([2, 1]);
        let err = t.ensure_hops_confirmed().unwrap_err();
        assert_eq!(err.code(), "hops_unconfirmed");
        assert!(matches!(err, SettleError::HopsUnconfirmed { ref hops, .. } if hops == &[1, 2]));
    }

    #[test]
    fn older_snapshots_decode_without_awaiting_hops() {
        let mut json = serde_json::to_value(tx(Utc::now())).unwrap();
        json.as_object_mut().unwrap().remove("awaiting_hops");
        let decoded: Transaction = serde_json::from_value(json).unwrap();
        assert!(decoded.awaiting_hops.is_empty());
    }
}
