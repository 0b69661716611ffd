//! Configuration types for Settle mints.
//!
//! A mint is configured from a TOML document:
//!
//! ```toml
//! name = "m0.example"
//! environment = "qa"
//! peers = ["m1.example"]
//!
//! [transaction]
//! expiry_ms = 3600000
//!
//! [scheduler]
//! max_retries = 8
//!
//! [log]
//! filter = "settle=debug"
//! ```
//!
//! Every section and field is optional apart from `name`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{constants, Result, SettleError};

/// Deployment environment. Tells the transport layer which certificate
/// strategy to use and picks the default log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Qa,
}

/// Configuration for a single mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintConfig {
    /// Resolvable name of this mint, the `mint` part of its addresses.
    pub name: String,
    #[serde(default)]
    pub environment: Environment,
    /// Mints that receive every offer of this mint regardless of pair.
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default)]
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl MintConfig {
    /// Defaults for a mint called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: Environment::default(),
            peers: Vec::new(),
            transaction: TransactionConfig::default(),
            scheduler: SchedulerConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: Self =
            toml::from_str(s).map_err(|e| SettleError::Configuration(e.to_string()))?;
        cfg.log.format = Some(cfg.log_format());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SettleError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Log format to install: the configured one, or the environment default.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log.resolved_format(self.environment)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty()
            || self
                .name
                .chars()
                .any(|c| c.is_whitespace() || c == '@' || c == '/')
        {
            return Err(SettleError::Configuration(format!(
                "invalid mint name: {:?}",
                self.name
            )));
        }
        if self.peers.iter().any(|p| p == &self.name) {
            return Err(SettleError::Configuration(
                "a mint cannot list itself as a peer".into(),
            ));
        }
        self.transaction.validate()?;
        self.scheduler.validate()
    }
}

/// Transaction lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Lifetime given to a transaction created without an explicit expiry.
    pub expiry_ms: i64,
    /// Minimum lifetime left for a hop reservation to be accepted.
    pub expiry_buffer_ms: i64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            expiry_ms: constants::DEFAULT_TRANSACTION_EXPIRY_MS,
            expiry_buffer_ms: constants::DEFAULT_TRANSACTION_EXPIRY_BUFFER_MS,
        }
    }
}

impl TransactionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.expiry_buffer_ms < 0 || self.expiry_ms <= self.expiry_buffer_ms {
            return Err(SettleError::Configuration(format!(
                "transaction expiry {}ms must exceed its buffer {}ms",
                self.expiry_ms, self.expiry_buffer_ms
            )));
        }
        Ok(())
    }
}

/// Propagation task settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Attempts after which a task is marked failed.
    pub max_retries: u32,
    pub backoff_base_ms: i64,
    pub backoff_max_ms: i64,
    pub expiry_sweep_interval_ms: i64,
    /// Tick of the async worker loop.
    pub poll_interval_ms: u64,
    /// Age after which an unfinished claim is taken over by another worker.
    pub claim_timeout_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_TASK_MAX_RETRIES,
            backoff_base_ms: constants::DEFAULT_TASK_BACKOFF_BASE_MS,
            backoff_max_ms: constants::DEFAULT_TASK_BACKOFF_MAX_MS,
            expiry_sweep_interval_ms: constants::DEFAULT_EXPIRY_SWEEP_INTERVAL_MS,
            poll_interval_ms: constants::DEFAULT_WORKER_POLL_MS,
            claim_timeout_ms: constants::DEFAULT_TASK_CLAIM_TIMEOUT_MS,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(SettleError::Configuration("max_retries must be at least 1".into()));
        }
        if self.backoff_base_ms <= 0 || self.backoff_max_ms < self.backoff_base_ms {
            return Err(SettleError::Configuration(format!(
                "backoff base {}ms must be positive and at most max {}ms",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        if self.expiry_sweep_interval_ms <= 0 || self.poll_interval_ms == 0 {
            return Err(SettleError::Configuration(
                "sweep and poll intervals must be positive".into(),
            ));
        }
        if self.claim_timeout_ms <= 0 {
            return Err(SettleError::Configuration("claim_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Production => Self::Json,
            Environment::Qa => Self::Pretty,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Defaults from the environment when omitted.
    pub format: Option<LogFormat>,
}

impl LogConfig {
    /// The configured format, or the default of `env`.
    #[must_use]
    pub fn resolved_format(&self, env: Environment) -> LogFormat {
        self.format.unwrap_or_else(|| LogFormat::for_environment(env))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: None,
        }
    }
}
