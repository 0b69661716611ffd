//! # settle-engine
//!
//! Transaction state machine of a Settle mint.
//!
//! - [`SettlementEngine`]: creation, remote hop reservation, settlement,
//!   cancellation and the expiry sweep
//! - [`BalanceLedger`]: idempotent balance effects and the supply check
//! - [`Outbox`]: tasks left for the propagation scheduler
//! - [`lock`]: hash locks and per-hop secret derivation
//!
//! ## A transaction across three mints
//!
//! ```text
//!   M0 (initiator)          M1 (offer O1)            M2 (offer O2)
//!   ──────────────          ─────────────            ─────────────
//!   create  hop 0 ──ReserveHop(1)──▶ hop 1
//!                 ──ReserveHop(2)─────────────────────▶ hop 2
//!   settle(s) ─────RevealSecret(s_1)──▶ settle hop 1
//!             ─────RevealSecret(s_2)────────────────────▶ settle hop 2
//! ```
//!
//! Each mint only ever writes its own store. Everything crossing a mint
//! boundary goes through a task.

mod cancel;
pub mod engine;
pub mod ledger;
pub mod lock;
pub mod outbox;
mod reserve;
mod settle;

pub use engine::{CreatedTransaction, SettleRequest, SettlementEngine, TransactionRequest};
pub use ledger::BalanceLedger;
pub use outbox::Outbox;
