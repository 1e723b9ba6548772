/// Config loader with environment overrides and validation.
///
/// Reads an optional YAML file, applies the environment variables the bot has
/// always been deployed with (`TELEGRAM_BOT_TOKEN`, `AUTHORIZED_USER_ID`,
/// `USER_ID`, `USER_NAME`, `STORAGE_PATH`) on top, and validates the result.
use std::path::{Path, PathBuf};

use crate::config::BotConfig;
use crate::errors::DeskhandError;

/// Environment variable carrying the bot token.
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable carrying the allow-listed Telegram user ID.
pub const ENV_AUTHORIZED_USER_ID: &str = "AUTHORIZED_USER_ID";
/// Environment variable carrying the desktop user's UID.
pub const ENV_USER_ID: &str = "USER_ID";
/// Environment variable carrying the desktop user's login name.
pub const ENV_USER_NAME: &str = "USER_NAME";
/// Environment variable carrying the upload directory.
pub const ENV_STORAGE_PATH: &str = "STORAGE_PATH";

/// Longest long-poll timeout Telegram accepts.
const MAX_POLL_TIMEOUT_SECS: u64 = 50;

/// Loads and validates [`BotConfig`].
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `path` (if any) and the process environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<BotConfig, DeskhandError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`ConfigLoader::load`] with an explicit variable lookup.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<BotConfig, DeskhandError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => BotConfig::default(),
        };
        Self::apply_env_overrides(&mut config, lookup)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse a YAML config file.
    pub fn load_file(path: &Path) -> Result<BotConfig, DeskhandError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DeskhandError::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_yaml::from_str(&content)
            .map_err(|e| DeskhandError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Overlay environment variables on top of file values. Empty variables are ignored.
    pub fn apply_env_overrides<F>(config: &mut BotConfig, lookup: F) -> Result<(), DeskhandError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = get(ENV_BOT_TOKEN) {
            config.telegram.bot_token = token;
        }
        if let Some(raw) = get(ENV_AUTHORIZED_USER_ID) {
            let id = raw.parse::<i64>().map_err(|e| {
                DeskhandError::Config(format!("{ENV_AUTHORIZED_USER_ID} is not a user id: {e}"))
            })?;
            config.auth.authorized_user_id = Some(id);
        }
        if let Some(raw) = get(ENV_USER_ID) {
            let uid = raw
                .parse::<u32>()
                .map_err(|e| DeskhandError::Config(format!("{ENV_USER_ID} is not a uid: {e}")))?;
            config.desktop.user_id = Some(uid);
        }
        if let Some(name) = get(ENV_USER_NAME) {
            config.desktop.user_name = name;
        }
        if let Some(path) = get(ENV_STORAGE_PATH) {
            config.storage.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Validate the aggregate config.
    ///
    /// Checks:
    /// - All required values are present (reported together)
    /// - Confirmation TTL and heartbeat interval are positive
    /// - Volume step is within 1..=100
    /// - Poll timeout does not exceed Telegram's maximum
    /// - The user name is a plain login name
    pub fn validate(config: &BotConfig) -> Result<(), DeskhandError> {
        let mut missing = Vec::new();
        if config.telegram.bot_token.is_empty() {
            missing.push(ENV_BOT_TOKEN);
        }
        if config.auth.authorized_user_id.is_none() {
            missing.push(ENV_AUTHORIZED_USER_ID);
        }
        if config.desktop.user_id.is_none() {
            missing.push(ENV_USER_ID);
        }
        if config.desktop.user_name.is_empty() {
            missing.push(ENV_USER_NAME);
        }
        if config.storage.path.as_os_str().is_empty() {
            missing.push(ENV_STORAGE_PATH);
        }
        if !missing.is_empty() {
            return Err(DeskhandError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if config.confirmation.ttl_secs == 0 {
            return Err(DeskhandError::Config(
                "confirmation.ttl_secs must be greater than 0".to_string(),
            ));
        }
        if config.telegram.heartbeat_interval_secs == 0 {
            return Err(DeskhandError::Config(
                "telegram.heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }
        if config.telegram.poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
            return Err(DeskhandError::Config(format!(
                "telegram.poll_timeout_secs must be at most {MAX_POLL_TIMEOUT_SECS}, got {}",
                config.telegram.poll_timeout_secs
            )));
        }
        let step = config.desktop.volume_step_percent;
        if step == 0 || step > 100 {
            return Err(DeskhandError::Config(format!(
                "desktop.volume_step_percent must be within 1..=100, got {step}"
            )));
        }
        validate_user_name(&config.desktop.user_name)?;
        Ok(())
    }
}

/// The user name ends up as a `sudo -u` argument and a chown target.
fn validate_user_name(name: &str) -> Result<(), DeskhandError> {
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with('-');
    if valid {
        Ok(())
    } else {
        Err(DeskhandError::Config(format!(
            "desktop.user_name is not a valid login name: {name:?}"
        )))
    }
}
