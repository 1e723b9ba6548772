//! Tracing subscriber setup.
//!
//! Filter precedence: the `--log-level` flag (or `DESKHAND_LOG`), then
//! `RUST_LOG`, then `logging.level` from the config file.

use deskhand_types::errors::DeskhandError;
use tracing_subscriber::EnvFilter;

/// Resolve the filter directive set to use.
pub fn build_filter(cli_level: Option<&str>, config_level: &str) -> Result<EnvFilter, DeskhandError> {
    if let Some(level) = cli_level {
        return EnvFilter::try_new(level)
            .map_err(|e| DeskhandError::Config(format!("invalid log filter {level:?}: {e}")));
    }
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(config_level).map_err(|e| {
            DeskhandError::Config(format!("invalid logging.level {config_level:?}: {e}"))
        }),
    }
}

/// Install the global fmt subscriber. Call once, before anything logs.
pub fn init(cli_level: Option<&str>, config_level: &str) -> Result<(), DeskhandError> {
    let filter = build_filter(cli_level, config_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| DeskhandError::Internal(format!("failed to install logger: {e}")))
}
