//! Durable propagation tasks.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  claim   ┌───────────┐  ok        ┌───────────┐
//!   │ PENDING ├─────────▶│ IN_FLIGHT ├───────────▶│ SUCCEEDED │
//!   └─────────┘          └─────┬─────┘            └───────────┘
//!        ▲   retry + backoff   │  bound reached / rejected
//!        └─────────────────────┤
//!                              ▼
//!                         ┌────────┐
//!                         │ FAILED │
//!                         └────────┘
//! ```
//!
//! A worker that dies between claim and finish leaves the task in flight.
//! Once its claim is older than the claim timeout it becomes claimable again,
//! and the stale holder can no longer finish it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{HopReservation, OfferId, SecretReveal, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InFlight => write!(f, "in_flight"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What a task does when it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Ship the current state of a canonical offer to `target`.
    PropagateOffer { offer: OfferId, target: String },
    /// Reserve a remote hop on `target`.
    ReserveHop {
        target: String,
        request: HopReservation,
    },
    /// Reveal a hop secret to `target`.
    RevealSecret { target: String, reveal: SecretReveal },
    /// Cancel expired reservations on this mint, then reschedule.
    ExpirySweep,
}

impl TaskKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PropagateOffer { .. } => "propagate_offer",
            Self::ReserveHop { .. } => "reserve_hop",
            Self::RevealSecret { .. } => "reveal_secret",
            Self::ExpirySweep => "expiry_sweep",
        }
    }

    /// Remote mint the task talks to, if any.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::PropagateOffer { target, .. }
            | Self::ReserveHop { target, .. }
            | Self::RevealSecret { target, .. } => Some(target),
            Self::ExpirySweep => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub retries: u32,
    /// Earliest time the task may be claimed.
    pub scheduled_at: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub last_error: Option<String>,
    /// When the current holder claimed the task. Finishing must present it.
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A pending task due at `scheduled_at`.
    #[must_use]
    pub fn pending(kind: TaskKind, scheduled_at: DateTime<Utc>, created: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            status: TaskStatus::Pending,
            retries: 0,
            scheduled_at,
            created,
            last_error: None,
            claimed_at: None,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.scheduled_at <= now
    }

    /// Due, or held by a claim taken at or before `stale_before`.
    #[must_use]
    pub fn is_claimable(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> bool {
        self.is_due(now)
            || (self.status == TaskStatus::InFlight
                && self.claimed_at.is_some_and(|at| at <= stale_before))
    }
}
