//! # settle-store
//!
//! The ledger store contract of a Settle mint.
//!
//! Every backend implements the per-entity traits below; the rest of the
//! workspace depends only on [`LedgerStore`], handed around explicitly as an
//! `Arc<dyn LedgerStore>`. All mutual exclusion on business state goes through
//! the conditional writes these traits expose (offer revision, record status,
//! task claim). [`MemoryStore`] is the in-process backend.

pub mod asset;
pub mod balance;
pub mod memory;
pub mod offer;
pub mod record;
pub mod task;
pub mod transaction;

pub use asset::AssetStore;
pub use balance::BalanceStore;
pub use memory::MemoryStore;
pub use offer::{CrossingWrite, OfferStore};
pub use record::RecordStore;
pub use task::TaskStore;
pub use transaction::TransactionStore;

use settle_types::Result;

/// Every store trait, for callers that talk to a [`LedgerStore`].
pub mod prelude {
    pub use crate::{
        AssetStore, BalanceStore, LedgerStore, OfferStore, RecordStore, TaskStore,
        TransactionStore,
    };
}

/// The full store a mint runs on.
pub trait LedgerStore:
    AssetStore
    + OfferStore
    + RecordStore
    + TransactionStore
    + BalanceStore
    + TaskStore
    + Send
    + Sync
    + std::fmt::Debug
{
    /// Create every table and index if missing. Idempotent; must run before
    /// any other call, which fails with `StoreUnavailable` until it has.
    fn migrate(&self) -> Result<()>;
}
