//! Asset registry storage trait.

use settle_types::{Asset, AssetRecord, Result};

/// Assets issued on this mint.
pub trait AssetStore {
    /// Register an asset. Returns `false` if it already exists.
    fn insert_asset(&self, record: &AssetRecord) -> Result<bool>;
    fn load_asset(&self, asset: &Asset) -> Result<Option<AssetRecord>>;
    fn list_assets(&self) -> Result<Vec<AssetRecord>>;
}
