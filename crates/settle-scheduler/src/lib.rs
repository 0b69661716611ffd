//! # settle-scheduler
//!
//! **Propagation plane** of a Settle mint: everything that crosses a mint
//! boundary runs here, after the client call that caused it has returned.
//!
//! - [`TaskQueue`]: durable queue with atomic claim and bounded backoff
//! - [`PropagationScheduler`]: executes offer propagation, hop reservation,
//!   secret relay and the expiry sweep
//! - [`MintRpc`]: transport between mints; [`LocalFederation`] routes it
//!   in process
//! - [`run_worker`] / [`spawn_worker`]: tokio loop draining the queue
//! - [`telemetry`]: log subscriber setup
//!
//! ## Task flow
//!
//! ```text
//!   engine ──writes──▶ Task(PENDING) ──claim──▶ IN_FLIGHT ──rpc──▶ remote mint
//!                           ▲                       │
//!                           └── retry + backoff ────┤
//!                                                   ├──▶ SUCCEEDED
//!                                                   └──▶ FAILED (logged)
//! ```

pub mod queue;
pub mod rpc;
pub mod scheduler;
pub mod telemetry;
pub mod worker;

pub use queue::{RetryPolicy, TaskOutcome, TaskQueue};
pub use rpc::{LocalFederation, MintRpc};
pub use scheduler::PropagationScheduler;
pub use telemetry::init_tracing;
pub use worker::{WorkerHandle, run_worker, spawn_worker};
