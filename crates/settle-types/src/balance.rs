//! Balances kept by an issuing mint for the holders of its assets.
//!
//! A balance row is keyed `(owner, token)` and unique on `(asset, holder)`.
//! Values are signed whole numbers: the issuer never holds its own asset, and
//! holder balances are not checked for sufficiency on settlement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, Asset, BalanceToken, OperationId};

/// A single balance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Issuer of `asset`.
    pub owner: Address,
    pub token: BalanceToken,
    pub created: DateTime<Utc>,
    pub asset: Asset,
    pub holder: Address,
    pub value: Decimal,
}

impl Balance {
    /// An empty balance for `holder`, created on first effect.
    #[must_use]
    pub fn empty(asset: Asset, holder: Address, created: DateTime<Utc>) -> Self {
        Self {
            owner: asset.issuer().clone(),
            token: BalanceToken::new(),
            created,
            asset,
            holder,
            value: Decimal::ZERO,
        }
    }
}

/// Which leg of an operation a balance effect applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectLeg {
    Credit,
    Debit,
}

impl std::fmt::Display for EffectLeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credit => write!(f, "credit"),
            Self::Debit => write!(f, "debit"),
        }
    }
}

/// One balance delta, applied at most once per `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEffect {
    /// `"{operation}:{leg}"`.
    pub key: String,
    pub asset: Asset,
    pub holder: Address,
    pub delta: Decimal,
}

impl BalanceEffect {
    #[must_use]
    pub fn new(operation: OperationId, leg: EffectLeg, asset: Asset, holder: Address, delta: Decimal) -> Self {
        Self {
            key: format!("{operation}:{leg}"),
            asset,
            holder,
            delta,
        }
    }
}
