//! Executes the tasks a mint's engine leaves behind.

use std::sync::Arc;

use settle_engine::SettlementEngine;
use settle_types::{Result, SettleError, Task, TaskKind, TaskStatus};
use tracing::{debug, error, info};

use crate::queue::{RetryPolicy, TaskOutcome, TaskQueue};
use crate::rpc::MintRpc;

#[derive(Debug, Clone)]
pub struct PropagationScheduler {
    engine: Arc<SettlementEngine>,
    queue: TaskQueue,
}

impl PropagationScheduler {
    #[must_use]
    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        let queue = TaskQueue::new(
            Arc::clone(engine.store()),
            Arc::clone(engine.clock()),
            RetryPolicy::from_config(&engine.config().scheduler),
        );
        Self { engine, queue }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<SettlementEngine> {
        &self.engine
    }

    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn enqueue(&self, kind: TaskKind) -> Result<Task> {
        self.queue.enqueue(kind)
    }

    /// Seed the self-rescheduling expiry sweep unless one is already queued.
    ///
    /// Returns whether a sweep was seeded.
    pub fn ensure_sweep(&self) -> Result<bool> {
        for status in [TaskStatus::Pending, TaskStatus::InFlight] {
            if self
                .queue
                .tasks(status)?
                .iter()
                .any(|t| t.kind == TaskKind::ExpirySweep)
            {
                return Ok(false);
            }
        }
        self.queue.enqueue(TaskKind::ExpirySweep)?;
        info!(mint = self.engine.mint(), "expiry sweep seeded");
        Ok(true)
    }

    /// Claim and execute one due task.
    ///
    /// A hop reservation that ends up parked cancels its transaction on this
    /// mint, since that hop can no longer be confirmed.
    pub fn run_one(&self, rpc: &dyn MintRpc) -> Result<Option<TaskOutcome>> {
        let Some(task) = self.queue.claim()? else {
            return Ok(None);
        };
        debug!(task = %task.id, kind = task.kind.name(), retries = task.retries, "task claimed");
        let kind = task.kind.clone();
        let outcome = match self.execute(&kind, rpc) {
            Ok(()) => self.queue.succeed(task)?,
            Err(err) => self.queue.fail(task, err)?,
        };
        if let (TaskKind::ReserveHop { request, .. }, TaskOutcome::Failed { error }) = (&kind, &outcome) {
            let id = request.transaction.id;
            if let Err(err) = self.engine.reject_hop(id, request.hop, error) {
                // the expiry sweep cancels it later
                error!(tx = %id, hop = request.hop, error = %err, "could not cancel transaction after rejected hop");
            }
        }
        Ok(Some(outcome))
    }

    /// One worker pass: make sure the expiry sweep is queued, then run due
    /// tasks until none is left.
    ///
    /// Returns how many ran.
    pub fn tick(&self, rpc: &dyn MintRpc) -> Result<usize> {
        self.ensure_sweep()?;
        let mut ran = 0;
        while self.run_one(rpc)?.is_some() {
            ran += 1;
        }
        Ok(ran)
    }

    /// Run due tasks until none is left or `limit` were executed.
    ///
    /// Returns how many ran.
    pub fn run_until_idle(&self, rpc: &dyn MintRpc, limit: usize) -> Result<usize> {
        let mut ran = 0;
        while ran < limit && self.run_one(rpc)?.is_some() {
            ran += 1;
        }
        Ok(ran)
    }

    fn execute(&self, kind: &TaskKind, rpc: &dyn MintRpc) -> Result<()> {
        match kind {
            TaskKind::PropagateOffer { offer, target } => {
                // Always ship what the offer looks like now.
                let current = self.engine.get_offer(*offer)?;
                if !current.is_canonical() {
                    return Err(SettleError::OfferNotCanonical(*offer));
                }
                rpc.deliver_offer(target, &current.to_propagated())?;
            }
            TaskKind::ReserveHop { target, request } => {
                rpc.request_hop_reservation(target, request)?;
                self.engine.confirm_hop(request.transaction.id, request.hop)?;
            }
            TaskKind::RevealSecret { target, reveal } => {
                rpc.reveal_secret(target, reveal)?;
            }
            TaskKind::ExpirySweep => {
                self.engine.sweep_expired()?;
                self.engine
                    .outbox()
                    .schedule_sweep(self.engine.config().scheduler.expiry_sweep_interval_ms)?;
            }
        }
        Ok(())
    }
}
