//! Globally unique identifiers used throughout Settle.
//!
//! Transactions, offers, tasks and balance rows use UUIDv7 for time-ordered
//! lexicographic sorting. Operations and crossings are derived
//! deterministically from their `(transaction, hop)` so that every re-delivery
//! of a hop reservation lands on the same row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::SettleError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = SettleError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| SettleError::invalid(format!("bad {}: {e}", stringify!($name))))
            }
        }
    };
}

uuid_id!(
    /// Identifier of an end-to-end transaction, shared by every mint on its path.
    TransactionId
);

uuid_id!(
    /// Identifier of an offer, shared by the canonical offer and its mirrors.
    OfferId
);

uuid_id!(
    /// Identifier of a propagation task.
    TaskId
);

uuid_id!(
    /// Row token of a balance (second half of its `(owner, token)` key).
    BalanceToken
);

/// Deterministic 16-byte digest of `(domain, transaction, hop)`.
fn hop_digest(domain: &[u8], transaction: TransactionId, hop: u8) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(transaction.0.as_bytes());
    hasher.update([hop]);
    let hash = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    bytes
}

// ---------------------------------------------------------------------------
// OperationId
// ---------------------------------------------------------------------------

/// Identifier of an operation. One per `(transaction, hop)` on a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub Uuid);

impl OperationId {
    /// Every mint derives the **same** id for the same hop, which makes
    /// re-delivered reservations collide on the store's primary key.
    #[must_use]
    pub fn for_hop(transaction: TransactionId, hop: u8) -> Self {
        Self(Uuid::from_bytes(hop_digest(
            b"settle:operation:v0:",
            transaction,
            hop,
        )))
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// CrossingId
// ---------------------------------------------------------------------------

/// Identifier of a crossing. One per `(transaction, hop)` on a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrossingId(pub Uuid);

impl CrossingId {
    #[must_use]
    pub fn for_hop(transaction: TransactionId, hop: u8) -> Self {
        Self(Uuid::from_bytes(hop_digest(
            b"settle:crossing:v0:",
            transaction,
            hop,
        )))
    }
}

impl fmt::Display for CrossingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cx:{}", self.0)
    }
}
