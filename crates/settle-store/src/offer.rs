//! Offer storage trait.
//!
//! Canonical offers change only through revision-checked writes. A crossing
//! is written together with the offer it consumes, so the remainder and the
//! crossing set can never disagree.

use settle_types::{Crossing, CrossingId, Offer, OfferId, Pair, Result};

/// Outcome of a combined offer + crossing write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossingWrite {
    /// Both rows were written.
    Applied,
    /// The offer's revision moved since it was read; nothing was written.
    Stale,
    /// The crossing already exists in a state the write would not change.
    Existing(Crossing),
}

pub trait OfferStore {
    /// Insert a new offer. Fails with `StoreConflict` on a duplicate id.
    fn insert_offer(&self, offer: &Offer) -> Result<()>;
    fn load_offer(&self, id: OfferId) -> Result<Option<Offer>>;
    /// Every offer, canonical and propagated, oldest first.
    fn list_offers(&self) -> Result<Vec<Offer>>;
    fn offers_for_pair(&self, pair: &Pair) -> Result<Vec<Offer>>;

    /// Replace a canonical offer if its stored revision is `expected_revision`.
    fn swap_offer(&self, expected_revision: u64, updated: &Offer) -> Result<bool>;

    /// Store a propagated snapshot if it is unknown or newer than the stored
    /// mirror. A canonical row is never overwritten.
    fn upsert_propagated(&self, snapshot: &Offer) -> Result<bool>;

    /// Insert a reserved crossing and the offer it consumed, atomically.
    ///
    /// Returns [`CrossingWrite::Existing`] if the crossing id is taken.
    fn cross_offer(
        &self,
        expected_revision: u64,
        offer: &Offer,
        crossing: &Crossing,
    ) -> Result<CrossingWrite>;

    /// Cancel a reserved crossing and write the offer with its restored
    /// remainder, atomically.
    ///
    /// Returns [`CrossingWrite::Existing`] if the crossing is not reserved.
    fn uncross_offer(
        &self,
        expected_revision: u64,
        offer: &Offer,
        crossing: CrossingId,
    ) -> Result<CrossingWrite>;
}
