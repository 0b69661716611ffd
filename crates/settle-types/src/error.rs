//! Error types for Settle mints.
//!
//! All errors use the `ST_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Offer errors
//! - 2xx: Transaction / settlement errors
//! - 3xx: Request validation errors
//! - 4xx: Store errors
//! - 5xx: Propagation errors
//! - 9xx: General / internal errors
//!
//! Independently of the display prefix, every variant maps to a stable
//! machine-readable [`SettleError::code`] and an HTTP-class
//! [`SettleError::status`] that the transport layer hands to clients.

use thiserror::Error;

use crate::{Amount, OfferId, TaskId, TransactionId};

/// Central error enum for all Settle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    // =================================================================
    // Offer Errors (1xx)
    // =================================================================
    /// The offer cannot cover the amount required by a crossing.
    #[error("ST_ERR_100: Offer {offer} has insufficient remainder: need {needed}, have {remainder}")]
    OfferInsufficientRemainder {
        offer: OfferId,
        needed: Amount,
        remainder: Amount,
    },

    /// The offer is closed or consumed.
    #[error("ST_ERR_101: Offer {0} is not active")]
    OfferNotActive(OfferId),

    /// A crossing was attempted against a propagated mirror.
    #[error("ST_ERR_102: Offer {0} is not canonical on this mint")]
    OfferNotCanonical(OfferId),

    /// The offer is unknown to this mint.
    #[error("ST_ERR_103: Offer not found: {0}")]
    OfferNotFound(OfferId),

    // =================================================================
    // Transaction / Settlement Errors (2xx)
    // =================================================================
    /// The requested expiry leaves less than the configured buffer.
    #[error("ST_ERR_200: Expiry too close: {remaining_ms}ms left, buffer is {buffer_ms}ms")]
    ExpiryBufferViolation { remaining_ms: i64, buffer_ms: i64 },

    /// The revealed secret does not hash to the stored lock.
    #[error("ST_ERR_201: Secret does not match the lock of transaction {0}")]
    SecretInvalid(TransactionId),

    /// The transaction expired before it could be settled.
    #[error("ST_ERR_202: Settlement failed: {reason}")]
    SettlementFailed { reason: String },

    /// The transaction was already canceled.
    #[error("ST_ERR_203: Transaction {0} is canceled")]
    TransactionCanceled(TransactionId),

    /// The transaction is unknown to this mint.
    #[error("ST_ERR_204: Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The initiator tried to settle before every remote hop was confirmed.
    #[error("ST_ERR_205: Transaction {transaction} still awaits hop reservations {hops:?}")]
    HopsUnconfirmed {
        transaction: TransactionId,
        hops: Vec<u8>,
    },

    /// A re-delivered hop reservation disagrees with the one already held.
    #[error("ST_ERR_206: Reservation of hop {hop} of {transaction} conflicts: {reason}")]
    ReservationConflict {
        transaction: TransactionId,
        hop: u8,
        reason: String,
    },

    // =================================================================
    // Request Validation Errors (3xx)
    // =================================================================
    /// The path is non-contiguous or does not bridge the requested pair.
    #[error("ST_ERR_300: Invalid path: {reason}")]
    PathInvalid { reason: String },

    /// A malformed or inconsistent request.
    #[error("ST_ERR_301: Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The asset is not registered on this mint.
    #[error("ST_ERR_302: Asset not found: {0}")]
    AssetNotFound(String),

    // =================================================================
    // Store Errors (4xx)
    // =================================================================
    /// A compare-and-swap lost its race more times than the retry bound.
    #[error("ST_ERR_400: Store conflict on {entity}")]
    StoreConflict { entity: String },

    /// The store is not usable (e.g. schema not bootstrapped).
    #[error("ST_ERR_401: Store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    // =================================================================
    // Propagation Errors (5xx)
    // =================================================================
    /// A task hit its retry bound and needs operator attention.
    #[error("ST_ERR_500: Task {task} exhausted {retries} retries: {last_error}")]
    TaskRetriesExhausted {
        task: TaskId,
        retries: u32,
        last_error: String,
    },

    /// A remote mint could not be reached.
    #[error("ST_ERR_501: Mint {mint} unreachable: {reason}")]
    MintUnreachable { mint: String, reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("ST_ERR_900: Configuration error: {0}")]
    Configuration(String),

    /// Arithmetic overflow or another broken internal expectation.
    #[error("ST_ERR_901: Internal error: {0}")]
    Internal(String),

    /// Holder balances of an asset no longer add up to its net issuance.
    #[error("ST_ERR_902: Supply invariant violated: {reason}")]
    SupplyInvariantViolation { reason: String },
}

impl SettleError {
    /// Stable machine-readable code, decoupled from the variant name.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OfferInsufficientRemainder { .. } => "offer_insufficient_remainder",
            Self::OfferNotActive(_) => "offer_not_active",
            Self::OfferNotCanonical(_) => "offer_not_canonical",
            Self::OfferNotFound(_) => "offer_not_found",
            Self::ExpiryBufferViolation { .. } => "expiry_buffer_violation",
            Self::SecretInvalid(_) => "secret_invalid",
            Self::SettlementFailed { .. } => "settlement_failed",
            Self::TransactionCanceled(_) => "transaction_canceled",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::HopsUnconfirmed { .. } => "hops_unconfirmed",
            Self::ReservationConflict { .. } => "reservation_conflict",
            Self::PathInvalid { .. } => "path_invalid",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::AssetNotFound(_) => "asset_not_found",
            Self::StoreConflict { .. } => "store_conflict",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::TaskRetriesExhausted { .. } => "task_retries_exhausted",
            Self::MintUnreachable { .. } => "mint_unreachable",
            Self::Configuration(_) => "configuration_invalid",
            Self::Internal(_) => "internal_error",
            Self::SupplyInvariantViolation { .. } => "supply_invariant_violation",
        }
    }

    /// HTTP-class status the transport layer should answer with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::OfferNotActive(_)
            | Self::OfferNotCanonical(_)
            | Self::ExpiryBufferViolation { .. }
            | Self::SecretInvalid(_)
            | Self::PathInvalid { .. }
            | Self::InvalidRequest { .. } => 400,
            Self::OfferInsufficientRemainder { .. } | Self::SettlementFailed { .. } => 402,
            Self::OfferNotFound(_) | Self::TransactionNotFound(_) | Self::AssetNotFound(_) => 404,
            Self::TransactionCanceled(_)
            | Self::HopsUnconfirmed { .. }
            | Self::ReservationConflict { .. }
            | Self::StoreConflict { .. } => 409,
            Self::MintUnreachable { .. } => 502,
            Self::StoreUnavailable { .. }
            | Self::TaskRetriesExhausted { .. }
            | Self::Configuration(_)
            | Self::Internal(_)
            | Self::SupplyInvariantViolation { .. } => 500,
        }
    }

    /// Whether a propagation task failing with this error should be retried.
    ///
    /// `TransactionNotFound` is transient across mints: a reveal can overtake
    /// the reservation it refers to.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreConflict { .. }
                | Self::StoreUnavailable { .. }
                | Self::MintUnreachable { .. }
                | Self::TransactionNotFound(_)
        )
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SettleError>;
