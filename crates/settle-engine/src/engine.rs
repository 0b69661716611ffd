//! The settlement engine of one mint.
//!
//! ## Transaction lifecycle
//!
//! ```text
//!                create_transaction / reserve_hop
//!                          │
//!                          ▼
//!                      RESERVED ──── cancel / sweep / late settle ───▶ CANCELED
//!                          │
//!                    settle(secret)
//!                          │
//!                          ▼
//!                       SETTLED
//! ```
//!
//! Every transition is a compare-and-swap on the stored status. Re-entering
//! a terminal state returns the current view instead of failing.
//!
//! The engine is split by concern: creation and remote reservation live in
//! `reserve`, settlement in `settle`, cancellation and the expiry sweep in
//! `cancel`. This module holds the shared handle and the read side.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settle_offerbook::{OfferBook, Quote};
use settle_store::prelude::*;
use settle_types::{
    Address, Amount, Asset, AssetRecord, Clock, MintConfig, Offer, OfferId, Pair, Price, Result,
    SettleError, Transaction, TransactionId, TransactionView,
};
use tracing::info;

use crate::ledger::BalanceLedger;
use crate::outbox::Outbox;

/// A client request to move `amount` of `pair.base` along `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub owner: Address,
    /// Source asset (`base`) and destination asset (`quote`).
    pub pair: Pair,
    pub amount: Amount,
    pub destination: Address,
    #[serde(default)]
    pub path: Vec<OfferId>,
    /// Defaults to now plus the configured transaction lifetime.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

/// A freshly reserved transaction and the secret that settles it.
///
/// The secret is handed out exactly once; the mint keeps only its lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTransaction {
    pub view: TransactionView,
    pub secret: String,
}

/// Who is revealing a secret, and which one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role")]
pub enum SettleRequest {
    /// The transaction secret, presented to the initiating mint.
    Initiator { secret: String },
    /// A hop secret, relayed to the mint keeping that hop.
    Hop { hop: u8, secret: String },
}

/// Settlement engine for a single mint.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    pub(crate) store: Arc<dyn LedgerStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: MintConfig,
    pub(crate) book: OfferBook,
    pub(crate) ledger: BalanceLedger,
    pub(crate) outbox: Outbox,
}

impl SettlementEngine {
    /// Build an engine over an already migrated store.
    pub fn new(config: MintConfig, store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let book = OfferBook::new(Arc::clone(&store), Arc::clone(&clock), config.name.clone());
        let ledger = BalanceLedger::new(Arc::clone(&store), Arc::clone(&clock));
        let outbox = Outbox::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.name.clone(),
            config.peers.clone(),
        );
        Ok(Self {
            store,
            clock,
            config,
            book,
            ledger,
            outbox,
        })
    }

    #[must_use]
    pub fn mint(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn config(&self) -> &MintConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[must_use]
    pub fn book(&self) -> &OfferBook {
        &self.book
    }

    #[must_use]
    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    // =================================================================
    // Assets and offers
    // =================================================================

    /// Register an asset issued by a local address.
    ///
    /// Registering the same asset again returns the existing record.
    pub fn register_asset(&self, issuer: &Address, code: &str, scale: u8) -> Result<AssetRecord> {
        if issuer.mint() != self.mint() {
            return Err(SettleError::InvalidRequest {
                reason: format!("issuer {issuer} does not belong to mint {}", self.mint()),
            });
        }
        let asset = Asset::new(issuer.clone(), code, scale)?;
        let record = AssetRecord {
            asset: asset.clone(),
            owner: issuer.clone(),
            created: self.clock.now(),
        };
        if self.store.insert_asset(&record)? {
            info!(asset = %record.asset, "asset registered");
            return Ok(record);
        }
        self.store
            .load_asset(&asset)?
            .ok_or_else(|| SettleError::Internal(format!("asset {asset} vanished after insert")))
    }

    /// Create a canonical offer and queue its propagation.
    pub fn create_offer(
        &self,
        owner: &Address,
        pair: Pair,
        price: Price,
        amount: Amount,
    ) -> Result<Offer> {
        let offer = self.book.create_offer(owner, pair, price, amount)?;
        self.outbox.propagate_offer(&offer)?;
        Ok(offer)
    }

    /// Close a canonical offer and queue its propagation.
    pub fn close_offer(&self, owner: &Address, id: OfferId) -> Result<Offer> {
        let offer = self.book.close_offer(owner, id)?;
        self.outbox.propagate_offer(&offer)?;
        Ok(offer)
    }

    /// Receiving end of offer propagation.
    pub fn receive_offer(&self, snapshot: &Offer) -> Result<bool> {
        self.book.accept_propagated(snapshot)
    }

    pub fn get_offer(&self, id: OfferId) -> Result<Offer> {
        self.book.get_offer(id)
    }

    pub fn quote(&self, pair: &Pair) -> Result<Quote> {
        self.book.quote(pair)
    }

    // =================================================================
    // Queries
    // =================================================================

    /// The transaction and every operation and crossing this mint keeps for it.
    pub fn get_transaction(&self, id: TransactionId) -> Result<TransactionView> {
        let transaction = self.load_transaction(id)?;
        self.view(transaction)
    }

    pub fn balance(&self, asset: &Asset, holder: &Address) -> Result<Decimal> {
        self.ledger.balance(asset, holder)
    }

    pub fn verify_supply(&self, asset: &Asset) -> Result<()> {
        self.ledger.verify_supply(asset)
    }

    // -----------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------

    pub(crate) fn load_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.store
            .load_transaction(id)?
            .ok_or(SettleError::TransactionNotFound(id))
    }

    pub(crate) fn view(&self, transaction: Transaction) -> Result<TransactionView> {
        let operations = self.store.operations_for_transaction(transaction.id)?;
        let crossings = self.store.crossings_for_transaction(transaction.id)?;
        Ok(TransactionView {
            transaction,
            operations,
            crossings,
        })
    }
}
