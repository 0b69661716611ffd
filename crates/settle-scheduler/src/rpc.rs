//! Calls one mint makes on another.
//!
//! Every call is idempotent at the receiver, so the scheduler may repeat
//! any of them after a timeout or a crash.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use settle_engine::SettlementEngine;
use settle_types::{HopReservation, Offer, Result, SecretReveal, SettleError, TransactionView};
use tracing::debug;

/// Transport between mints.
pub trait MintRpc: Send + Sync {
    /// Deliver an offer snapshot. `Ok(false)` if the target already held it.
    fn deliver_offer(&self, target: &str, offer: &Offer) -> Result<bool>;

    fn request_hop_reservation(
        &self,
        target: &str,
        request: &HopReservation,
    ) -> Result<TransactionView>;

    fn reveal_secret(&self, target: &str, reveal: &SecretReveal) -> Result<TransactionView>;
}

/// In-process federation: routes calls straight to registered engines.
///
/// A mint can be switched offline, in which case every call to it fails
/// with `MintUnreachable`.
#[derive(Debug, Default)]
pub struct LocalFederation {
    mints: RwLock<BTreeMap<String, Arc<SettlementEngine>>>,
    offline: RwLock<BTreeSet<String>>,
}

impl LocalFederation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, engine: Arc<SettlementEngine>) {
        self.mints.write().insert(engine.mint().to_owned(), engine);
    }

    pub fn set_offline(&self, mint: &str, offline: bool) {
        let mut set = self.offline.write();
        if offline {
            set.insert(mint.to_owned());
        } else {
            set.remove(mint);
        }
    }

    fn engine(&self, target: &str) -> Result<Arc<SettlementEngine>> {
        if self.offline.read().contains(target) {
            return Err(SettleError::MintUnreachable {
                mint: target.to_owned(),
                reason: "offline".into(),
            });
        }
        self.mints
            .read()
            .get(target)
            .cloned()
            .ok_or_else(|| SettleError::MintUnreachable {
                mint: target.to_owned(),
                reason: "unknown mint".into(),
            })
    }
}

impl MintRpc for LocalFederation {
    fn deliver_offer(&self, target: &str, offer: &Offer) -> Result<bool> {
        debug!(target, offer = %offer.id, revision = offer.revision, "deliver offer");
        self.engine(target)?.receive_offer(offer)
    }

    fn request_hop_reservation(
        &self,
        target: &str,
        request: &HopReservation,
    ) -> Result<TransactionView> {
        debug!(target, tx = %request.transaction.id, hop = request.hop, "request hop reservation");
        self.engine(target)?.reserve_hop(request.clone())
    }

    fn reveal_secret(&self, target: &str, reveal: &SecretReveal) -> Result<TransactionView> {
        debug!(target, tx = %reveal.transaction, hop = reveal.hop, "reveal secret");
        self.engine(target)?.reveal_secret(reveal.clone())
    }
}
