//! Background worker driving a [`PropagationScheduler`] on a tokio interval.
//!
//! ```text
//!   loop {
//!       tick ──▶ blocking pool: re-seed expiry sweep, drain due tasks
//!       shutdown signal ──▶ return
//!   }
//! ```

use std::sync::Arc;
use std::time::Duration;

use settle_types::{Result, SettleError, constants};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::rpc::MintRpc;
use crate::scheduler::PropagationScheduler;

/// Run until `shutdown` turns `true` or its sender is dropped.
///
/// Each pass runs [`PropagationScheduler::tick`] on the blocking pool, so
/// synchronous transports never stall the runtime. Returns how many tasks
/// ran.
pub async fn run_worker(
    scheduler: Arc<PropagationScheduler>,
    rpc: Arc<dyn MintRpc>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<usize> {
    let poll = Duration::from_millis(scheduler.engine().config().scheduler.poll_interval_ms);
    let mint = scheduler.engine().mint().to_owned();
    info!(%mint, version = constants::VERSION, poll_ms = poll.as_millis(), "propagation worker starting");

    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ran = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
        let pass = {
            let scheduler = Arc::clone(&scheduler);
            let rpc = Arc::clone(&rpc);
            tokio::task::spawn_blocking(move || scheduler.tick(rpc.as_ref())).await
        };
        match pass {
            Ok(Ok(n)) => ran += n,
            Ok(Err(err)) => warn!(%mint, error = %err, "task bookkeeping failed"),
            Err(e) => {
                return Err(SettleError::Internal(format!("propagation pass panicked: {e}")));
            }
        }
    }

    info!(%mint, ran, "propagation worker stopped");
    Ok(ran)
}

/// A spawned worker and the switch that stops it.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<Result<usize>>,
}

impl WorkerHandle {
    /// Signal shutdown and wait for the worker to finish its current pass.
    pub async fn stop(self) -> Result<usize> {
        // the worker also stops if the receiver is already gone
        let _ = self.shutdown.send(true);
        self.join
            .await
            .map_err(|e| SettleError::Internal(format!("propagation worker panicked: {e}")))?
    }
}

/// Spawn [`run_worker`] on the current tokio runtime.
pub fn spawn_worker(scheduler: Arc<PropagationScheduler>, rpc: Arc<dyn MintRpc>) -> WorkerHandle {
    let (shutdown, receiver) = watch::channel(false);
    let join = tokio::spawn(run_worker(scheduler, rpc, receiver));
    WorkerHandle { shutdown, join }
}
