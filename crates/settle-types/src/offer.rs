//! Standing exchange offers.
//!
//! ## State Machine
//!
//! ```text
//!              last crossing           release
//!   ┌────────┐ ───────────────▶ ┌──────────┐ ─────────▶ ACTIVE
//!   │ ACTIVE │                  │ CONSUMED │
//!   └───┬────┘                  └──────────┘
//!       │ close (remainder > 0)
//!       ▼
//!   ┌────────┐
//!   │ CLOSED │
//!   └────────┘
//! ```
//!
//! Only the canonical copy on the owner's mint ever mutates. Every mutation
//! bumps [`Offer::revision`], which doubles as the compare-and-swap token in
//! the store and as the ordering key of propagated snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, Amount, OfferId, Pair, Price, Result, SettleError};

/// Lifecycle status of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Closed,
    Consumed,
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
            Self::Consumed => write!(f, "consumed"),
        }
    }
}

/// Whether this mint holds the authoritative copy of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Held by the owner's mint; the only copy crossings run against.
    Canonical,
    /// Read-only mirror received from the canonical mint.
    Propagated,
}

/// A standing offer: the owner sells `pair.base` and buys `pair.quote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub created: DateTime<Utc>,
    pub owner: Address,
    pub pair: Pair,
    pub price: Price,
    pub amount: Amount,
    pub remainder: Amount,
    pub status: OfferStatus,
    pub propagation: Propagation,
    pub revision: u64,
}

impl Offer {
    /// A fresh canonical offer with its full amount available.
    #[must_use]
    pub fn canonical(
        owner: Address,
        pair: Pair,
        price: Price,
        amount: Amount,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OfferId::new(),
            created,
            owner,
            pair,
            price,
            amount,
            remainder: amount,
            status: OfferStatus::Active,
            propagation: Propagation::Canonical,
            revision: 0,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == OfferStatus::Active
    }

    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.propagation == Propagation::Canonical
    }

    /// The mint holding the canonical copy.
    #[must_use]
    pub fn mint(&self) -> &str {
        self.owner.mint()
    }

    /// Consume `amount` of the remainder. Reaching zero marks it consumed.
    pub fn take(&mut self, amount: Amount) -> Result<()> {
        if !self.is_active() {
            return Err(SettleError::OfferNotActive(self.id));
        }
        let left = self.remainder.checked_sub(amount).ok_or(
            SettleError::OfferInsufficientRemainder {
                offer: self.id,
                needed: amount,
                remainder: self.remainder,
            },
        )?;
        self.remainder = left;
        if left.is_zero() {
            self.status = OfferStatus::Consumed;
        }
        self.revision += 1;
        Ok(())
    }

    /// Give back `amount` released by a canceled crossing.
    ///
    /// A consumed offer becomes active again; a closed one stays closed.
    pub fn restore(&mut self, amount: Amount) -> Result<()> {
        let back = self.remainder.try_add(amount)?;
        if back > self.amount {
            return Err(SettleError::Internal(format!(
                "offer {} remainder {back} would exceed amount {}",
                self.id, self.amount
            )));
        }
        self.remainder = back;
        if self.status == OfferStatus::Consumed && !back.is_zero() {
            self.status = OfferStatus::Active;
        }
        self.revision += 1;
        Ok(())
    }

    /// Withdraw the offer.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_active() || self.remainder.is_zero() {
            return Err(SettleError::OfferNotActive(self.id));
        }
        self.status = OfferStatus::Closed;
        self.revision += 1;
        Ok(())
    }

    /// The snapshot shipped to other mints.
    #[must_use]
    pub fn to_propagated(&self) -> Self {
        Self {
            propagation: Propagation::Propagated,
            ..self.clone()
        }
    }
}
