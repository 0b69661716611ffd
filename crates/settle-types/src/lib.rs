//! # settle-types
//!
//! Shared types, errors, and configuration for **Settle** mints.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TransactionId`], [`OfferId`], [`OperationId`], [`CrossingId`], [`TaskId`], [`BalanceToken`]
//! - **Naming**: [`Address`], [`Asset`], [`AssetRecord`], [`Pair`]
//! - **Quantities**: [`Amount`], [`Price`]
//! - **Offer model**: [`Offer`], [`OfferStatus`], [`Propagation`]
//! - **Settlement model**: [`Transaction`], [`TransactionView`], [`SettlementStatus`], [`Operation`], [`Crossing`]
//! - **Balance model**: [`Balance`], [`BalanceEffect`], [`EffectLeg`]
//! - **Tasks and wire payloads**: [`Task`], [`TaskKind`], [`TaskStatus`], [`HopReservation`], [`SecretReveal`]
//! - **Configuration**: [`MintConfig`], [`TransactionConfig`], [`SchedulerConfig`], [`LogConfig`], [`Environment`]
//! - **Time**: [`Clock`], [`SystemClock`] (and `ManualClock` with `test-helpers`)
//! - **Errors**: [`SettleError`] with `ST_ERR_` prefix codes
//! - **Constants**: protocol-wide limits and defaults

pub mod address;
pub mod amount;
pub mod balance;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod offer;
pub mod operation;
pub mod task;
pub mod transaction;
pub mod wire;

// Re-export all primary types at crate root for ergonomic imports:
//   use settle_types::{Offer, Transaction, Amount, ...};

pub use address::*;
pub use amount::*;
pub use balance::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use offer::*;
pub use operation::*;
pub use task::*;
pub use transaction::*;
pub use wire::*;

// Constants are accessed via `settle_types::constants::FOO`
// (not re-exported to avoid name collisions).
