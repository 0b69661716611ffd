//! Hash locks and per-hop secret derivation.
//!
//! ```text
//! secret      s   = hex(32 random bytes)          returned once to the initiator
//! lock        L   = hex(SHA-256(LOCK_DOMAIN ‖ s))
//! hop secret  s_i = hex(HMAC-SHA256(key = s, HOP_SECRET_DOMAIN ‖ tx ‖ i))
//! hop lock    L_i = hex(SHA-256(LOCK_DOMAIN ‖ s_i))
//! ```
//!
//! The initiating mint relays `s_i` to the mint of hop `i` once it has
//! settled. Holding `s_i` reveals nothing about `s` or any other `s_j`.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use settle_types::{
    Result, SettleError, TransactionId,
    constants::{HOP_SECRET_DOMAIN, LOCK_DOMAIN, SECRET_BYTES},
};

type HmacSha256 = Hmac<Sha256>;

/// A fresh random transaction secret, hex encoded.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The lock committing to `secret`.
#[must_use]
pub fn lock_for(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(LOCK_DOMAIN);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `secret` opens `lock`. Compares in constant time.
#[must_use]
pub fn opens(secret: &str, lock: &str) -> bool {
    let computed = lock_for(secret);
    computed.len() == lock.len()
        && computed
            .bytes()
            .zip(lock.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// The secret of hop `hop` of `transaction`, derived from the transaction secret.
pub fn hop_secret(secret: &str, transaction: TransactionId, hop: u8) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SettleError::Internal(format!("hop secret derivation failed: {e}")))?;
    mac.update(HOP_SECRET_DOMAIN);
    mac.update(transaction.0.as_bytes());
    mac.update(&[hop]);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// The lock of hop `hop`, as delivered with its reservation.
pub fn hop_lock(secret: &str, transaction: TransactionId, hop: u8) -> Result<String> {
    hop_secret(secret, transaction, hop).map(|s| lock_for(&s))
}
