/// Shared data types used across all deskhand subsystems.
///
/// Every crate imports its chat, confirmation and desktop types from here so the
/// channel adapters, the desktop backends and the dispatcher agree on one shape.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DeskhandError;

// ============================================================
// Confirmation Types
// ============================================================

/// A destructive operation that only runs after the user echoes back a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardedAction {
    /// Restart the machine.
    Reboot,
    /// Put the machine to sleep.
    Suspend,
}

impl GuardedAction {
    /// Stable tag used in logs and serialized state.
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardedAction::Reboot => "reboot",
            GuardedAction::Suspend => "suspend",
        }
    }
}

impl fmt::Display for GuardedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuardedAction {
    type Err = DeskhandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reboot" => Ok(GuardedAction::Reboot),
            "suspend" => Ok(GuardedAction::Suspend),
            other => Err(DeskhandError::Internal(format!(
                "unknown guarded action: {other}"
            ))),
        }
    }
}

/// One outstanding confirmation challenge.
///
/// Owned exclusively by the confirmation gate; callers only ever see the copy
/// handed back by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// Identifier of the user the code was issued to.
    pub principal: String,
    /// Four-digit code in `1000..=9999`.
    pub code: String,
    /// Where the result should be delivered. Opaque to the gate.
    pub channel: String,
    /// Which guarded operation this code authorizes.
    pub action: GuardedAction,
    /// When the code was issued.
    pub issued_at: DateTime<Utc>,
}

/// Result of checking a code against the gate.
///
/// "Not valid" covers a wrong code, a missing entry and an expired entry alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the code matched a live entry for the principal.
    pub valid: bool,
    /// The consumed entry, present only when `valid` is true.
    pub data: Option<PendingConfirmation>,
}

impl Validation {
    /// A successful validation carrying the consumed entry.
    pub fn accepted(entry: PendingConfirmation) -> Self {
        Self {
            valid: true,
            data: Some(entry),
        }
    }

    /// A negative result.
    pub fn rejected() -> Self {
        Self {
            valid: false,
            data: None,
        }
    }
}

// ============================================================
// Channel Types
// ============================================================

/// A message received from the chat channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel-specific update identifier, used for polling offsets.
    pub update_id: i64,
    /// Chat the message was posted in; replies go back here.
    pub chat_id: i64,
    /// Sender of the message.
    pub user_id: i64,
    /// When the sender's client says the message was sent.
    pub sent_at: DateTime<Utc>,
    /// Message payload.
    pub content: InboundContent,
}

/// Payload of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundContent {
    /// Plain text, including slash commands and keyboard button presses.
    Text(String),
    /// A photo (the largest available size).
    Photo(FileRef),
    /// An arbitrary file sent as a document.
    Document(FileRef),
    /// Anything the bot does not handle (stickers, locations, ...).
    Unsupported,
}

/// Reference to a file stored on the chat provider's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Provider file identifier used to download the content.
    pub file_id: String,
    /// Original file name, if the client sent one.
    pub file_name: Option<String>,
    /// Size in bytes, if known.
    pub file_size: Option<u64>,
}

/// A text message to send to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination chat.
    pub chat_id: i64,
    /// Markdown-formatted body.
    pub text: String,
    /// Reply keyboard to attach, if it needs to be (re)sent.
    pub keyboard: Option<ReplyKeyboard>,
}

/// A local image to upload to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPhoto {
    /// Destination chat.
    pub chat_id: i64,
    /// Path of the image on disk.
    pub path: PathBuf,
    /// Caption shown under the image.
    pub caption: String,
}

/// A persistent reply keyboard shown under the chat input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyKeyboard {
    /// Button labels, row by row.
    pub rows: Vec<Vec<String>>,
    /// Ask the client to shrink the keyboard to fit the buttons.
    pub resize: bool,
    /// Hide the keyboard after one press.
    pub one_time: bool,
}

// ============================================================
// Desktop Types
// ============================================================

/// Captured output of a successful external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// On/off state of a sink or source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Toggle {
    On,
    Off,
    Unknown,
}

/// Media player state as reported by the MPRIS player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Snapshot of the audio stack, appended to every audio command reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStatus {
    /// Whether the default sink is audible.
    pub sound: Toggle,
    /// Volume of the default sink, if it could be read.
    pub volume_percent: Option<u32>,
    /// Whether the default source (microphone) is live.
    pub microphone: Toggle,
    /// Current player state.
    pub playback: PlaybackState,
    /// "artist - title" of the current track, if anything is playing.
    pub track: Option<String>,
}

/// One captured monitor image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    /// Temporary file holding the image.
    pub path: PathBuf,
    /// Human-readable caption naming the monitor.
    pub caption: String,
}

/// Network usage measured over a short sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkThroughput {
    pub upload_bytes_per_sec: f64,
    pub download_bytes_per_sec: f64,
}

/// Hardware, OS and load summary for the `/info` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReport {
    pub motherboard: String,
    pub cpu: String,
    pub logical_cores: usize,
    pub physical_cores: usize,
    pub graphics: Vec<String>,
    pub os: String,
    pub arch: String,
    pub kernel: String,
    pub cpu_load_percent: f32,
    /// Total memory in bytes.
    pub memory_total: u64,
    /// Memory available to new processes (page cache counts as available), in bytes.
    pub memory_available: u64,
    pub uptime_secs: u64,
    /// `None` when no active interface was found or sampling failed.
    pub network: Option<NetworkThroughput>,
}

/// A file written to the storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFile {
    /// Final location on disk.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}
