//! Balance storage trait.

use chrono::{DateTime, Utc};
use settle_types::{Address, Asset, Balance, BalanceEffect, Result};

pub trait BalanceStore {
    fn load_balance(&self, asset: &Asset, holder: &Address) -> Result<Option<Balance>>;
    fn balances_for_asset(&self, asset: &Asset) -> Result<Vec<Balance>>;

    /// Apply an effect once. A key seen before is ignored and yields `false`.
    /// The balance row is created on first use.
    fn apply_effect(&self, effect: &BalanceEffect, now: DateTime<Utc>) -> Result<bool>;
}
