//! The offer book of a single mint.
//!
//! Canonical offers mutate only through revision-checked store writes:
//! read, apply the change to the local copy, write it back if the revision
//! is still the one read. A reservation that loses that race re-reads once
//! and tries again; losing twice is reported as insufficient remainder, the
//! same answer a client gets when the liquidity it saw has gone.

use std::sync::Arc;

use settle_store::CrossingWrite;
use settle_store::prelude::*;
use settle_types::{
    Address, Amount, Clock, Crossing, CrossingId, Offer, OfferId, Pair, Price, Result,
    SettleError, SettlementStatus, TransactionId,
};
use tracing::{debug, info, warn};

/// Attempts of a reservation before it gives up.
const RESERVE_ATTEMPTS: usize = 2;

/// Attempts of a release or close before reporting a store conflict.
const RELEASE_ATTEMPTS: usize = 16;

/// Active offers for a pair, best rate first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub pair: Pair,
    pub offers: Vec<Offer>,
    /// Sum of the remainders of `offers`, in units of `pair.base`.
    pub liquidity: Amount,
}

/// Offer lifecycle of one mint.
#[derive(Debug, Clone)]
pub struct OfferBook {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    mint: String,
}

impl OfferBook {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, mint: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            mint: mint.into(),
        }
    }

    #[must_use]
    pub fn mint(&self) -> &str {
        &self.mint
    }

    // =================================================================
    // Lifecycle
    // =================================================================

    /// Publish a canonical offer selling `pair.base` for `pair.quote`.
    pub fn create_offer(
        &self,
        owner: &Address,
        pair: Pair,
        price: Price,
        amount: Amount,
    ) -> Result<Offer> {
        if owner.mint() != self.mint {
            return Err(SettleError::InvalidRequest {
                reason: format!("offer owner {owner} does not belong to mint {}", self.mint),
            });
        }
        if pair.base.mint() != self.mint {
            return Err(SettleError::InvalidRequest {
                reason: format!("asset {} is not issued on mint {}", pair.base, self.mint),
            });
        }
        if self.store.load_asset(&pair.base)?.is_none() {
            return Err(SettleError::AssetNotFound(pair.base.to_string()));
        }
        if amount.is_zero() {
            return Err(SettleError::InvalidRequest {
                reason: "offer amount must be positive".into(),
            });
        }

        let offer = Offer::canonical(owner.clone(), pair, price, amount, self.clock.now());
        self.store.insert_offer(&offer)?;
        info!(offer = %offer.id, owner = %offer.owner, pair = %offer.pair, price = %offer.price, amount = %offer.amount, "offer created");
        Ok(offer)
    }

    /// Withdraw an active offer. Only its owner may close it.
    pub fn close_offer(&self, owner: &Address, id: OfferId) -> Result<Offer> {
        for _ in 0..RELEASE_ATTEMPTS {
            let mut offer = self.canonical(id)?;
            if &offer.owner != owner {
                return Err(SettleError::InvalidRequest {
                    reason: format!("{owner} does not own offer {id}"),
                });
            }
            let expected = offer.revision;
            offer.close()?;
            if self.store.swap_offer(expected, &offer)? {
                info!(offer = %id, remainder = %offer.remainder, "offer closed");
                return Ok(offer);
            }
        }
        Err(SettleError::StoreConflict {
            entity: format!("offer {id}"),
        })
    }

    pub fn get_offer(&self, id: OfferId) -> Result<Offer> {
        self.store
            .load_offer(id)?
            .ok_or(SettleError::OfferNotFound(id))
    }

    /// Active offers for `pair`, canonical and propagated, best rate first.
    pub fn quote(&self, pair: &Pair) -> Result<Quote> {
        let mut offers: Vec<Offer> = self
            .store
            .offers_for_pair(pair)?
            .into_iter()
            .filter(|o| o.is_active() && !o.remainder.is_zero())
            .collect();
        offers.sort_by(|a, b| {
            a.price
                .cmp_rate(&b.price)
                .then_with(|| a.created.cmp(&b.created))
                .then_with(|| a.id.cmp(&b.id))
        });
        let liquidity = offers
            .iter()
            .try_fold(Amount::ZERO, |acc, o| acc.try_add(o.remainder))?;
        Ok(Quote {
            pair: pair.clone(),
            offers,
            liquidity,
        })
    }

    // =================================================================
    // Crossings
    // =================================================================

    /// Consume `amount` of a canonical offer on behalf of `(transaction, hop)`.
    ///
    /// Re-delivering the same `(transaction, hop)` returns the crossing that
    /// already exists, provided it crosses the same offer for the same amount
    /// and has not been released.
    pub fn reserve_crossing(
        &self,
        id: OfferId,
        transaction: TransactionId,
        hop: u8,
        amount: Amount,
    ) -> Result<Crossing> {
        if let Some(existing) = self.store.load_crossing(CrossingId::for_hop(transaction, hop))? {
            debug!(crossing = %existing.id, "crossing already reserved");
            return redelivered(existing, id, amount);
        }

        for attempt in 0..RESERVE_ATTEMPTS {
            let mut offer = self.canonical(id)?;
            let expected = offer.revision;
            offer.take(amount)?;
            let crossing = Crossing::reserved(
                transaction,
                hop,
                id,
                offer.owner.clone(),
                amount,
                self.clock.now(),
            );
            match self.store.cross_offer(expected, &offer, &crossing)? {
                CrossingWrite::Applied => {
                    info!(crossing = %crossing.id, offer = %id, tx = %transaction, hop, amount = %amount, remainder = %offer.remainder, "crossing reserved");
                    return Ok(crossing);
                }
                CrossingWrite::Existing(existing) => return redelivered(existing, id, amount),
                CrossingWrite::Stale => {
                    debug!(offer = %id, attempt, "offer revision moved, retrying");
                }
            }
        }

        let remainder = self.get_offer(id)?.remainder;
        warn!(offer = %id, tx = %transaction, hop, "crossing lost the offer race");
        Err(SettleError::OfferInsufficientRemainder {
            offer: id,
            needed: amount,
            remainder,
        })
    }

    /// Cancel a reserved crossing and give its amount back to the offer.
    ///
    /// A consumed offer becomes active again. Releasing a canceled crossing
    /// is a no-op; releasing a settled one is an error.
    pub fn release_crossing(&self, id: CrossingId) -> Result<Crossing> {
        let mut crossing = self.store.load_crossing(id)?.ok_or_else(|| {
            SettleError::InvalidRequest {
                reason: format!("crossing {id} not found"),
            }
        })?;

        for _ in 0..RELEASE_ATTEMPTS {
            match crossing.status {
                SettlementStatus::Canceled => return Ok(crossing),
                SettlementStatus::Settled => {
                    return Err(SettleError::InvalidRequest {
                        reason: format!("crossing {id} is settled"),
                    });
                }
                SettlementStatus::Reserved => {}
            }

            let mut offer = self.canonical(crossing.offer)?;
            let expected = offer.revision;
            offer.restore(crossing.amount)?;
            match self.store.uncross_offer(expected, &offer, id)? {
                CrossingWrite::Applied => {
                    info!(crossing = %id, offer = %offer.id, remainder = %offer.remainder, status = %offer.status, "crossing released");
                    crossing.status = SettlementStatus::Canceled;
                    return Ok(crossing);
                }
                CrossingWrite::Existing(current) => crossing = current,
                CrossingWrite::Stale => {}
            }
        }
        Err(SettleError::StoreConflict {
            entity: format!("offer {}", crossing.offer),
        })
    }

    /// Mark a reserved crossing settled. Returns `false` if it was not reserved.
    pub fn settle_crossing(&self, id: CrossingId) -> Result<bool> {
        self.store
            .swap_crossing_status(id, SettlementStatus::Reserved, SettlementStatus::Settled)
    }

    // =================================================================
    // Propagation
    // =================================================================

    /// Store a snapshot of a remote offer if it is newer than the one held.
    pub fn accept_propagated(&self, snapshot: &Offer) -> Result<bool> {
        if snapshot.mint() == self.mint {
            return Ok(false);
        }
        if snapshot.remainder > snapshot.amount {
            return Err(SettleError::InvalidRequest {
                reason: format!("offer {} remainder exceeds amount", snapshot.id),
            });
        }
        let stored = self.store.upsert_propagated(snapshot)?;
        if stored {
            debug!(offer = %snapshot.id, revision = snapshot.revision, status = %snapshot.status, "propagated offer stored");
        }
        Ok(stored)
    }

    fn canonical(&self, id: OfferId) -> Result<Offer> {
        let offer = self.get_offer(id)?;
        if !offer.is_canonical() {
            return Err(SettleError::OfferNotCanonical(id));
        }
        Ok(offer)
    }
}

/// Accept a crossing found for a re-delivered hop only if it still matches.
fn redelivered(existing: Crossing, offer: OfferId, amount: Amount) -> Result<Crossing> {
    let reason = if existing.offer != offer {
        format!("hop already crosses offer {}", existing.offer)
    } else if existing.amount != amount {
        format!("hop already reserved {} instead of {amount}", existing.amount)
    } else if existing.status == SettlementStatus::Canceled {
        "hop reservation was released".to_owned()
    } else {
        return Ok(existing);
    };
    warn!(crossing = %existing.id, %reason, "conflicting hop reservation");
    Err(SettleError::ReservationConflict {
        transaction: existing.transaction,
        hop: existing.hop,
        reason,
    })
}
