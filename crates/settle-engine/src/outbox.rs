//! Tasks the engine leaves for the propagation scheduler.
//!
//! Cross-mint work never happens inside a client call: the engine writes a
//! pending [`Task`] row in the same store as its state change and the
//! scheduler delivers it later.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use settle_store::prelude::*;
use settle_types::{
    Clock, HopReservation, Offer, Result, SecretReveal, Task, TaskKind,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Outbox {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    mint: String,
    peers: Vec<String>,
}

impl Outbox {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        mint: impl Into<String>,
        peers: Vec<String>,
    ) -> Self {
        Self {
            store,
            clock,
            mint: mint.into(),
            peers,
        }
    }

    /// Mints that should hold a mirror of `offer`: the issuers of both assets
    /// of its pair plus every configured peer, never this mint.
    #[must_use]
    pub fn propagation_targets(&self, offer: &Offer) -> BTreeSet<String> {
        [offer.pair.base.mint(), offer.pair.quote.mint()]
            .into_iter()
            .map(str::to_owned)
            .chain(self.peers.iter().cloned())
            .filter(|m| m != &self.mint)
            .collect()
    }

    /// Queue a snapshot delivery of `offer` to every target.
    pub fn propagate_offer(&self, offer: &Offer) -> Result<usize> {
        let targets = self.propagation_targets(offer);
        for target in &targets {
            self.push(TaskKind::PropagateOffer {
                offer: offer.id,
                target: target.clone(),
            })?;
        }
        Ok(targets.len())
    }

    pub fn reserve_hop(&self, target: &str, request: HopReservation) -> Result<()> {
        self.push(TaskKind::ReserveHop {
            target: target.to_owned(),
            request,
        })
    }

    pub fn reveal_secret(&self, target: &str, reveal: SecretReveal) -> Result<()> {
        self.push(TaskKind::RevealSecret {
            target: target.to_owned(),
            reveal,
        })
    }

    /// Queue the next expiry sweep `after_ms` from now.
    pub fn schedule_sweep(&self, after_ms: i64) -> Result<Task> {
        let now = self.clock.now();
        let task = Task::pending(TaskKind::ExpirySweep, now + Duration::milliseconds(after_ms), now);
        self.store.insert_task(&task)?;
        Ok(task)
    }

    fn push(&self, kind: TaskKind) -> Result<()> {
        let now = self.clock.now();
        let task = Task::pending(kind, now, now);
        debug!(task = %task.id, kind = task.kind.name(), target = task.kind.target().unwrap_or("-"), "task enqueued");
        self.store.insert_task(&task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use settle_store::MemoryStore;
    use settle_types::{Amount, ManualClock, TaskStatus};

    fn outbox(peers: &[&str]) -> (Outbox, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.migrate().unwrap();
        let outbox = Outbox::new(
            store.clone(),
            Arc::new(ManualClock::starting_now()),
            "m1",
            peers.iter().map(|p| (*p).to_owned()).collect(),
        );
        (outbox, store)
    }

    fn offer() -> Offer {
        Offer::canonical(
            "i1@m1".parse().unwrap(),
            "i1@m1:A1.0/i0@m0:A0.0".parse().unwrap(),
            "1/1".parse().unwrap(),
            Amount::from(10u64),
            Utc::now(),
        )
    }

    #[test]
    fn targets_exclude_self_and_deduplicate() {
        let (outbox, _) = outbox(&["m0", "m2", "m1"]);
        let targets: Vec<_> = outbox.propagation_targets(&offer()).into_iter().collect();
        assert_eq!(targets, vec!["m0".to_owned(), "m2".to_owned()]);
    }

    #[test]
    fn one_task_per_target() {
        let (outbox, store) = outbox(&["m2"]);
        assert_eq!(outbox.propagate_offer(&offer()).unwrap(), 2);
        let pending = store.tasks_by_status(TaskStatus::Pending).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|t| t.kind.name() == "propagate_offer"));
    }
}
