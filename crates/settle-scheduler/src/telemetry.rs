//! Log subscriber setup.

use settle_types::{LogConfig, LogFormat, MintConfig, Result, SettleError, constants};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG` when set, otherwise from the configured directive.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| SettleError::Configuration(format!("invalid log filter {:?}: {e}", config.filter)))
}

/// Install the global subscriber for `config`. Fails if one is already
/// installed.
///
/// Without an explicit format, the mint's environment picks one.
pub fn init_tracing(config: &MintConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.log)?)
        .with_target(true);
    let installed = match config.log_format() {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| SettleError::Configuration(format!("tracing subscriber: {e}")))?;
    info!(
        mint = %config.name,
        environment = ?config.environment,
        version = constants::VERSION,
        protocol = constants::PROTOCOL_VERSION,
        "tracing initialised"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_directive_is_accepted() {
        let config = LogConfig {
            filter: "info,settle_engine=debug".into(),
            format: Some(LogFormat::Pretty),
        };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    fn qa_mint_without_format_logs_pretty() {
        let mut config = MintConfig::new("m0.test");
        config.environment = settle_types::Environment::Qa;
        assert_eq!(config.log.format, None);
        assert_eq!(config.log_format(), LogFormat::Pretty);
        assert!(env_filter(&config.log).is_ok());
    }

    #[test]
    fn second_install_is_refused() {
        let config = MintConfig::new("m0.test");
        // the first call may lose to another test in this binary
        let _ = init_tracing(&config);
        let err = init_tracing(&config).unwrap_err();
        assert_eq!(err.code(), "configuration_invalid");
    }
}
