/// Configuration types for deskhand.
///
/// Parsed from an optional YAML file and then overridden by environment
/// variables (see [`crate::config_loader`]). Every section has defaults except
/// the values that identify the bot, its owner and the desktop user.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    pub auth: AuthConfig,
    pub desktop: DesktopConfig,
    pub storage: StorageConfig,
    pub confirmation: ConfirmationConfig,
    pub messages: MessagesConfig,
    pub logging: LoggingConfig,
}

/// Telegram Bot API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather. Required.
    pub bot_token: String,
    /// API root, overridable for testing against a local server.
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates` (seconds, at most 50).
    pub poll_timeout_secs: u64,
    /// Delay between two polls when the previous one returned (milliseconds).
    pub poll_interval_ms: u64,
    /// Period of the `getMe` heartbeat (seconds).
    pub heartbeat_interval_secs: u64,
    /// Pause before polling resumes after a restart (milliseconds).
    pub restart_delay_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 10,
            poll_interval_ms: 1000,
            heartbeat_interval_secs: 60,
            restart_delay_ms: 2000,
        }
    }
}

/// Who may talk to the bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The single Telegram user ID allowed to issue commands. Required.
    pub authorized_user_id: Option<i64>,
}

/// The desktop session commands are executed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// UID of the desktop user owning the PulseAudio session. Required.
    pub user_id: Option<u32>,
    /// Login name of the desktop user. Required.
    pub user_name: String,
    /// X display used for screenshots and DPMS.
    pub display: String,
    /// Volume change per step, in percent.
    pub volume_step_percent: u8,
    /// Where temporary screenshots are written.
    pub screenshot_dir: PathBuf,
    /// Length of the network throughput sample for `/info` (seconds).
    pub network_sample_secs: u64,
    /// Upper bound for any single external command (seconds).
    pub command_timeout_secs: u64,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            user_name: String::new(),
            display: ":0".to_string(),
            volume_step_percent: 5,
            screenshot_dir: std::env::temp_dir(),
            network_sample_secs: 5,
            command_timeout_secs: 30,
        }
    }
}

/// Where uploaded files are saved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Target directory for photos and documents. Required.
    pub path: PathBuf,
}

/// Confirmation code settings for reboot/suspend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Lifetime of an issued code (seconds).
    pub ttl_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Inbound message handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Messages older than this are dropped (seconds). Stops a backlog queued
    /// while the machine slept from replaying.
    pub max_age_secs: i64,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self { max_age_secs: 60 }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `deskhand_core=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
