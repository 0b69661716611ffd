//! Protocol-wide constants and defaults for Settle mints.

/// Protocol version spoken between mints.
pub const PROTOCOL_VERSION: &str = "0";

/// Default lifetime of a transaction when the caller supplies no expiry (1h).
pub const DEFAULT_TRANSACTION_EXPIRY_MS: i64 = 3_600_000;

/// Minimum time a transaction must have left before a hop may be reserved (1m).
pub const DEFAULT_TRANSACTION_EXPIRY_BUFFER_MS: i64 = 60_000;

/// Maximum number of offers on a transaction path.
pub const MAX_PATH_LENGTH: usize = 8;

/// Default retry bound for propagation tasks.
pub const DEFAULT_TASK_MAX_RETRIES: u32 = 8;

/// Default first backoff step of a failing task.
pub const DEFAULT_TASK_BACKOFF_BASE_MS: i64 = 500;

/// Upper bound on the backoff between two attempts of a task.
pub const DEFAULT_TASK_BACKOFF_MAX_MS: i64 = 60_000;

/// Interval between two expiry sweeps.
pub const DEFAULT_EXPIRY_SWEEP_INTERVAL_MS: i64 = 10_000;

/// Age after which an in-flight task claim counts as abandoned (5m).
pub const DEFAULT_TASK_CLAIM_TIMEOUT_MS: i64 = 300_000;

/// Tick of the async worker loop.
pub const DEFAULT_WORKER_POLL_MS: u64 = 100;

/// Bytes of entropy in a transaction secret.
pub const SECRET_BYTES: usize = 32;

/// Domain prefix hashed in front of a secret to form its lock.
pub const LOCK_DOMAIN: &[u8] = b"settle:lock:v0:";

/// Domain prefix of the HMAC message deriving a hop secret.
pub const HOP_SECRET_DOMAIN: &[u8] = b"settle:hop:v0:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
