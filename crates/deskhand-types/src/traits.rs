/// Trait contracts for deskhand subsystems.
///
/// The dispatcher codes against these interfaces, never against the Telegram
/// adapter or the Linux backend directly, so both can be swapped for mocks in tests.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::actions::*;
use crate::errors::DeskhandError;

// ============================================================
// Time
// ============================================================

/// Source of wall-clock time.
///
/// Injected wherever expiry or message age is decided so tests can move time
/// forward without sleeping.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================
// Channel Traits
// ============================================================

/// Adapter for the chat channel the bot is driven through.
///
/// Handles the platform-specific protocol for receiving messages, sending
/// replies and photos, and fetching uploaded files.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message, attaching the reply keyboard if one is given.
    async fn send_message(&self, message: OutboundMessage) -> Result<(), DeskhandError>;

    /// Upload a local image.
    async fn send_photo(&self, photo: OutboundPhoto) -> Result<(), DeskhandError>;

    /// Download an uploaded file into `dest` (full target path). Returns bytes written.
    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64, DeskhandError>;

    /// Cheap round trip proving the channel is reachable.
    async fn health_check(&self) -> Result<(), DeskhandError>;

    /// Start receiving inbound messages. Returns the receiving end of the stream.
    async fn start_listening(
        &self,
    ) -> Result<tokio::sync::mpsc::Receiver<InboundMessage>, DeskhandError>;

    /// Abandon the current receive cycle and reconnect.
    fn restart_polling(&self);
}

// ============================================================
// Desktop Trait
// ============================================================

/// Platform backend executing desktop actions.
///
/// Each method maps to one user-facing command. Methods return `Err` only when
/// the action itself failed; status lookups degrade to "unknown" values instead.
#[async_trait]
pub trait DesktopController: Send + Sync {
    /// Unmute the default sink.
    async fn sound_on(&self) -> Result<(), DeskhandError>;
    /// Mute the default sink.
    async fn sound_off(&self) -> Result<(), DeskhandError>;
    /// Raise the default sink volume by one step.
    async fn volume_up(&self) -> Result<(), DeskhandError>;
    /// Lower the default sink volume by one step.
    async fn volume_down(&self) -> Result<(), DeskhandError>;
    /// Unmute the default source.
    async fn microphone_on(&self) -> Result<(), DeskhandError>;
    /// Mute the default source.
    async fn microphone_off(&self) -> Result<(), DeskhandError>;
    async fn play(&self) -> Result<(), DeskhandError>;
    async fn pause(&self) -> Result<(), DeskhandError>;
    async fn next_track(&self) -> Result<(), DeskhandError>;
    async fn previous_track(&self) -> Result<(), DeskhandError>;

    /// Read the current audio state. Never fails; unreadable fields are unknown.
    async fn audio_status(&self) -> AudioStatus;

    /// Force the display into DPMS off.
    async fn display_off(&self) -> Result<(), DeskhandError>;
    /// Suspend the machine. On success the process usually freezes right after.
    async fn suspend(&self) -> Result<(), DeskhandError>;
    /// Reboot the machine.
    async fn reboot(&self) -> Result<(), DeskhandError>;

    /// Capture every connected monitor into temporary files.
    async fn take_screenshots(&self) -> Result<Vec<Screenshot>, DeskhandError>;

    /// Best-effort removal of temporary files produced by the backend.
    async fn cleanup_files(&self, paths: &[PathBuf]);

    /// Gather hardware, OS and load information.
    async fn system_report(&self) -> Result<SystemReport, DeskhandError>;

    /// Seconds since the machine booted.
    fn system_uptime_secs(&self) -> u64;
}
