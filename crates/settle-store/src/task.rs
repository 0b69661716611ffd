//! Task queue storage trait.

use chrono::{DateTime, Utc};
use settle_types::{Result, Task, TaskId, TaskStatus};

pub trait TaskStore {
    fn insert_task(&self, task: &Task) -> Result<()>;
    fn load_task(&self, id: TaskId) -> Result<Option<Task>>;

    /// Atomically claim the earliest claimable task: a due pending one, or an
    /// in-flight one whose claim was taken at or before `stale_before`. The
    /// claim is stamped with `now`.
    fn claim_due_task(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Task>>;

    /// Write the outcome of a claimed task. Returns `false` if the stored
    /// task is no longer `in_flight` under the claim `task` carries.
    fn finish_task(&self, task: &Task) -> Result<bool>;

    fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>>;
}
