//! Balance ledger: the only writer of balances.
//!
//! A settled operation moves its amount from `source` to `destination`:
//! ```text
//! credit  "{op}:credit"   destination += amount   (skipped if destination is the issuer)
//! debit   "{op}:debit"    source      -= amount   (skipped if source is the issuer)
//! ```
//! The issuer mints on the way out and burns on the way in, so it never holds
//! a balance of its own asset. Each leg carries a unique key the store applies
//! at most once, which makes re-settling an operation harmless.
//!
//! Supply conservation, checked by [`BalanceLedger::verify_supply`]:
//! ```text
//! ∀ asset: Σ holder balances == Σ issued - Σ redeemed   (over settled operations)
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use settle_store::prelude::*;
use settle_types::{
    Address, Asset, BalanceEffect, Clock, EffectLeg, Operation, Result, SettleError,
    SettlementStatus,
};
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct BalanceLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl BalanceLedger {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply the balance effects of a settled operation.
    ///
    /// Returns how many legs were applied by this call (0 on a repeat).
    pub fn apply_settled_operation(&self, op: &Operation) -> Result<usize> {
        if op.status != SettlementStatus::Settled {
            return Err(SettleError::Internal(format!(
                "operation {} is {}, not settled",
                op.id, op.status
            )));
        }
        let issuer = op.asset.issuer();
        let amount = op.amount.as_decimal();
        let now = self.clock.now();

        let mut applied = 0;
        if &op.destination != issuer {
            let credit = BalanceEffect::new(
                op.id,
                EffectLeg::Credit,
                op.asset.clone(),
                op.destination.clone(),
                amount,
            );
            applied += usize::from(self.store.apply_effect(&credit, now)?);
        }
        if &op.source != issuer {
            let debit = BalanceEffect::new(
                op.id,
                EffectLeg::Debit,
                op.asset.clone(),
                op.source.clone(),
                -amount,
            );
            applied += usize::from(self.store.apply_effect(&debit, now)?);
        }
        debug!(op = %op.id, asset = %op.asset, amount = %op.amount, applied, "balance effects applied");
        Ok(applied)
    }

    /// Current value of `holder`'s balance in `asset` (zero if never touched).
    pub fn balance(&self, asset: &Asset, holder: &Address) -> Result<Decimal> {
        Ok(self
            .store
            .load_balance(asset, holder)?
            .map_or(Decimal::ZERO, |b| b.value))
    }

    /// Net issuance of `asset`: issued minus redeemed over settled operations.
    pub fn expected_supply(&self, asset: &Asset) -> Result<Decimal> {
        let issuer = asset.issuer();
        let mut supply = Decimal::ZERO;
        for op in self.store.settled_operations_for_asset(asset)? {
            let amount = op.amount.as_decimal();
            if &op.source == issuer {
                supply += amount;
            }
            if &op.destination == issuer {
                supply -= amount;
            }
        }
        Ok(supply)
    }

    /// Check that holder balances of `asset` add up to its net issuance.
    pub fn verify_supply(&self, asset: &Asset) -> Result<()> {
        let expected = self.expected_supply(asset)?;
        let actual: Decimal = self
            .store
            .balances_for_asset(asset)?
            .iter()
            .map(|b| b.value)
            .sum();
        if actual != expected {
            error!(asset = %asset, %actual, %expected, "supply invariant violated");
            return Err(SettleError::SupplyInvariantViolation {
                reason: format!("asset {asset}: balances sum to {actual}, net issuance is {expected}"),
            });
        }
        Ok(())
    }
}
