//! Durable task queue over the ledger store.
//!
//! Claiming is a compare-and-swap in the store, so any number of workers
//! may drain the same queue. A failed attempt is written back as pending
//! with a later `scheduled_at`:
//!
//! ```text
//!   backoff(retries) = min(base * 2^retries, max)
//! ```
//!
//! A task is attempted at most `1 + max_retries` times. A claim left
//! unfinished for longer than `claim_timeout_ms` is handed to the next
//! claimer.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use settle_store::prelude::*;
use settle_types::{
    Clock, Result, SchedulerConfig, SettleError, Task, TaskKind, TaskStatus,
};
use tracing::{debug, error, warn};

/// Retry bound, backoff curve and claim lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: i64,
    pub backoff_max_ms: i64,
    pub claim_timeout_ms: i64,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
            backoff_max_ms: config.backoff_max_ms,
            claim_timeout_ms: config.claim_timeout_ms,
        }
    }

    /// Delay before the attempt following `retries` failed ones.
    #[must_use]
    pub fn backoff(&self, retries: u32) -> Duration {
        let factor = 1i64.checked_shl(retries).filter(|f| *f > 0);
        let ms = factor
            .and_then(|f| self.backoff_base_ms.checked_mul(f))
            .map_or(self.backoff_max_ms, |ms| ms.min(self.backoff_max_ms));
        Duration::milliseconds(ms)
    }
}

/// What became of a claimed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    /// Written back as pending, due at `next_at`.
    Retrying { retries: u32, next_at: DateTime<Utc> },
    /// Parked for an operator.
    Failed { error: SettleError },
}

#[derive(Debug, Clone)]
pub struct TaskQueue {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl TaskQueue {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Queue a task due now.
    pub fn enqueue(&self, kind: TaskKind) -> Result<Task> {
        self.enqueue_at(kind, self.clock.now())
    }

    pub fn enqueue_at(&self, kind: TaskKind, at: DateTime<Utc>) -> Result<Task> {
        let task = Task::pending(kind, at, self.clock.now());
        self.store.insert_task(&task)?;
        debug!(task = %task.id, kind = task.kind.name(), scheduled_at = %at, "task enqueued");
        Ok(task)
    }

    /// Claim the earliest due task, if any. Tasks whose claim outlived the
    /// lease count as due.
    pub fn claim(&self) -> Result<Option<Task>> {
        let now = self.clock.now();
        self.store
            .claim_due_task(now, now - Duration::milliseconds(self.policy.claim_timeout_ms))
    }

    pub fn succeed(&self, mut task: Task) -> Result<TaskOutcome> {
        task.status = TaskStatus::Succeeded;
        task.last_error = None;
        self.finish(&task)?;
        debug!(task = %task.id, kind = task.kind.name(), "task succeeded");
        Ok(TaskOutcome::Succeeded)
    }

    /// Record a failed attempt: reschedule it, or park it once retrying is
    /// pointless or the bound is reached.
    pub fn fail(&self, mut task: Task, err: SettleError) -> Result<TaskOutcome> {
        task.last_error = Some(err.to_string());

        if !err.is_retryable() {
            task.status = TaskStatus::Failed;
            self.finish(&task)?;
            error!(task = %task.id, kind = task.kind.name(), target = task.kind.target().unwrap_or("-"), code = err.code(), error = %err, "task rejected");
            return Ok(TaskOutcome::Failed { error: err });
        }

        if task.retries >= self.policy.max_retries {
            task.status = TaskStatus::Failed;
            self.finish(&task)?;
            let exhausted = SettleError::TaskRetriesExhausted {
                task: task.id,
                retries: task.retries,
                last_error: err.to_string(),
            };
            error!(task = %task.id, kind = task.kind.name(), target = task.kind.target().unwrap_or("-"), error = %exhausted, "task parked");
            return Ok(TaskOutcome::Failed { error: exhausted });
        }

        let next_at = self.clock.now() + self.policy.backoff(task.retries);
        task.retries += 1;
        task.status = TaskStatus::Pending;
        task.scheduled_at = next_at;
        self.finish(&task)?;
        warn!(task = %task.id, kind = task.kind.name(), retries = task.retries, next_at = %next_at, error = %err, "task rescheduled");
        Ok(TaskOutcome::Retrying {
            retries: task.retries,
            next_at,
        })
    }

    pub fn tasks(&self, status: TaskStatus) -> Result<Vec<Task>> {
        self.store.tasks_by_status(status)
    }

    fn finish(&self, task: &Task) -> Result<()> {
        if self.store.finish_task(task)? {
            Ok(())
        } else {
            Err(SettleError::StoreConflict {
                entity: format!("task {}", task.id),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_store::MemoryStore;
    use settle_types::ManualClock;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff_base_ms: 500,
            backoff_max_ms: 60_000,
            claim_timeout_ms: 30_000,
        }
    }

    fn queue() -> (TaskQueue, Arc<ManualClock>) {
        let store = MemoryStore::new();
        store.migrate().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        (TaskQueue::new(Arc::new(store), clock.clone(), policy()), clock)
    }

    fn offline() -> SettleError {
        SettleError::MintUnreachable {
            mint: "m1".into(),
            reason: "offline".into(),
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let p = policy();
        assert_eq!(p.backoff(0).num_milliseconds(), 500);
        assert_eq!(p.backoff(1).num_milliseconds(), 1_000);
        assert_eq!(p.backoff(6).num_milliseconds(), 32_000);
        assert_eq!(p.backoff(7).num_milliseconds(), 60_000);
        assert_eq!(p.backoff(200).num_milliseconds(), 60_000);
    }

    #[test]
    fn retryable_failure_reschedules_until_the_bound() {
        let (queue, clock) = queue();
        queue.enqueue(TaskKind::ExpirySweep).unwrap();

        let task = queue.claim().unwrap().unwrap();
        let TaskOutcome::Retrying { retries, next_at } = queue.fail(task, offline()).unwrap() else {
            panic!("expected a retry");
        };
        assert_eq!(retries, 1);
        assert!(queue.claim().unwrap().is_none(), "not due before backoff");

        clock.set(next_at);
        let task = queue.claim().unwrap().unwrap();
        assert!(matches!(queue.fail(task, offline()).unwrap(), TaskOutcome::Retrying { retries: 2, .. }));

        clock.advance(Duration::seconds(1));
        let task = queue.claim().unwrap().unwrap();
        let outcome = queue.fail(task, offline()).unwrap();
        let TaskOutcome::Failed { error } = outcome else {
            panic!("expected the task to be parked");
        };
        assert_eq!(error.code(), "task_retries_exhausted");

        let failed = queue.tasks(TaskStatus::Failed).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].retries, 2);
        assert!(failed[0].last_error.as_deref().unwrap().contains("ST_ERR_501"));
    }

    #[test]
    fn rejection_is_not_retried() {
        let (queue, _) = queue();
        queue.enqueue(TaskKind::ExpirySweep).unwrap();
        let task = queue.claim().unwrap().unwrap();
        let err = SettleError::PathInvalid {
            reason: "gap".into(),
        };
        assert!(matches!(queue.fail(task, err).unwrap(), TaskOutcome::Failed { .. }));
        assert!(queue.tasks(TaskStatus::Pending).unwrap().is_empty());
    }

    #[test]
    fn abandoned_claim_is_reclaimed_after_the_lease() {
        let (queue, clock) = queue();
        let queued = queue.enqueue(TaskKind::ExpirySweep).unwrap();

        // a worker claims the task, then dies without finishing it
        let abandoned = queue.claim().unwrap().unwrap();
        clock.advance(Duration::seconds(29));
        assert!(queue.claim().unwrap().is_none(), "lease still held");

        clock.advance(Duration::seconds(2));
        let reclaimed = queue.claim().unwrap().unwrap();
        assert_eq!(reclaimed.id, queued.id);
        assert_eq!(reclaimed.status, TaskStatus::InFlight);

        // the late holder can no longer write an outcome
        assert_eq!(queue.succeed(abandoned).unwrap_err().code(), "store_conflict");
        assert_eq!(queue.succeed(reclaimed).unwrap(), TaskOutcome::Succeeded);
        assert_eq!(queue.tasks(TaskStatus::Succeeded).unwrap().len(), 1);
    }

    #[test]
    fn success_is_final() {
        let (queue, _) = queue();
        queue.enqueue(TaskKind::ExpirySweep).unwrap();
        let task = queue.claim().unwrap().unwrap();
        assert_eq!(queue.succeed(task.clone()).unwrap(), TaskOutcome::Succeeded);
        assert!(queue.claim().unwrap().is_none());
        // a second outcome for the same claim is a conflict
        assert_eq!(queue.succeed(task).unwrap_err().code(), "store_conflict");
    }
}
