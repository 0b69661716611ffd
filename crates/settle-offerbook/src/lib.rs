//! # settle-offerbook
//!
//! **Standing offers of a Settle mint.**
//!
//! The book owns the lifecycle of canonical offers (create, close, cross,
//! release), keeps read-only mirrors of remote offers current, answers
//! quotes, and plans the hop-by-hop layout of a transaction path.
//!
//! - **Optimistic concurrency**: every remainder change is a
//!   revision-checked write in the store; nothing is locked in process
//! - **Idempotent crossings**: one crossing per `(transaction, hop)`
//! - **Pure route planning**: [`plan_route`] only reads the offers it is given

pub mod book;
pub mod route;

pub use book::{OfferBook, Quote};
pub use route::{HopPlan, Route, plan_route};
