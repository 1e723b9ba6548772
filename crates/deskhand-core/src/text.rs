//! User-facing message catalogue.
//!
//! Every string the bot sends lives here, along with the reply keyboard layout.
//! Replies use Telegram's legacy Markdown; dynamic values that could contain
//! markup are escaped before interpolation.

use deskhand_tools::format::{escape_markdown, format_file_size, format_network_speed, format_uptime};
use deskhand_types::{AudioStatus, GuardedAction, PlaybackState, ReplyKeyboard, SystemReport, Toggle};

// ============================================================
// Keyboard buttons
// ============================================================

pub const BTN_VOLUME_DOWN: &str = "🔉 Volume down";
pub const BTN_VOLUME_UP: &str = "🔊 Volume up";
pub const BTN_SOUND_ON: &str = "🔊 Sound on";
pub const BTN_SOUND_OFF: &str = "🔇 Sound off";
pub const BTN_PLAY: &str = "▶️ Play";
pub const BTN_PAUSE: &str = "⏸️ Pause";
pub const BTN_PREV: &str = "⏮️ Previous";
pub const BTN_NEXT: &str = "⏭️ Next";
pub const BTN_MIC_ON: &str = "🎤 Mic on";
pub const BTN_MIC_OFF: &str = "🎤 Mic off";
pub const BTN_SCREENSHOT: &str = "📸 Screenshot";
pub const BTN_INFO: &str = "ℹ️ Info";
pub const BTN_UPTIME: &str = "⏱️ Uptime";
pub const BTN_PING: &str = "🏓 Ping";
pub const BTN_DISPLAY_OFF: &str = "💻 Display off";
pub const BTN_SUSPEND: &str = "😴 Sleep";
pub const BTN_REBOOT: &str = "🔄 Reboot";
pub const BTN_HELP: &str = "❓ Help";

/// The persistent reply keyboard, nine rows of two buttons.
pub fn default_keyboard() -> ReplyKeyboard {
    let rows = [
        [BTN_VOLUME_DOWN, BTN_VOLUME_UP],
        [BTN_SOUND_ON, BTN_SOUND_OFF],
        [BTN_PLAY, BTN_PAUSE],
        [BTN_PREV, BTN_NEXT],
        [BTN_MIC_ON, BTN_MIC_OFF],
        [BTN_SCREENSHOT, BTN_INFO],
        [BTN_UPTIME, BTN_PING],
        [BTN_DISPLAY_OFF, BTN_SUSPEND],
        [BTN_REBOOT, BTN_HELP],
    ];
    ReplyKeyboard {
        rows: rows
            .iter()
            .map(|row| row.iter().map(|label| label.to_string()).collect())
            .collect(),
        resize: true,
        one_time: false,
    }
}

// ============================================================
// Fixed messages
// ============================================================

pub const WELCOME: &str = "🖥️ *Welcome to deskhand!*

Use the buttons below to control the computer, or type a command:
/soundon, /soundoff, /play, /pause, /next, /prev, /volume\\_up, /volume\\_down, /suspend, /ping, /info, /help";

pub const HELP_TITLE: &str = "❓ *Help*";

pub const HELP: &str = "*Audio:*
🔊 Sound on/off - unmute or mute the speakers
🔉 Volume down / 🔊 Volume up - change the volume
▶️ Play / ⏸️ Pause - control playback
⏮️ Previous / ⏭️ Next - switch tracks

*Microphone:*
🎤 Mic on/off - unmute or mute the microphone

*System:*
💻 Display off - turn the screen off
😴 Sleep - suspend the computer (asks for a code)
🔄 Reboot - restart the computer (asks for a code)
📸 Screenshot - capture every monitor
ℹ️ Info - hardware and load summary
⏱️ Uptime - how long the bot and the system have been running

*Files:*
📎 Send a file or photo and it is saved to the storage directory

*Utilities:*
⌨️ /keyboard - restore the keyboard if it disappeared

*Commands:* /start, /help, /keyboard, /soundon, /soundoff, /microphoneon, /microphoneoff, /play, /pause, /next, /prev, /volume\\_up, /volume\\_down, /displayoff, /reboot, /suspend, /ping, /info, /uptime, /screenshot";

pub const KEYBOARD_RESTORED: &str = "⌨️ Keyboard restored!";
pub const NO_ACCESS: &str = "❌ You do not have access to this bot";
pub const INVALID_CODE: &str = "❌ Invalid confirmation code";
pub const COLLECTING_INFO: &str = "📊 Collecting system information...";

pub const SOUND_ON: &str = "🔊 Sound on";
pub const SOUND_OFF: &str = "🔇 Sound off";
pub const MIC_ON: &str = "🎤 Microphone on";
pub const MIC_OFF: &str = "🎤 Microphone off";
pub const PLAY_STARTED: &str = "▶️ Playback started";
pub const PLAY_PAUSED: &str = "⏸️ Playback paused";
pub const NEXT_TRACK: &str = "⏭️ Switched to the next track";
pub const PREV_TRACK: &str = "⏮️ Switched to the previous track";
pub const DISPLAY_OFF: &str = "💻 Display off";
pub const PHOTO_SAVED: &str = "✅ Photo saved";
pub const FILE_SAVED: &str = "✅ File saved";

// ============================================================
// Templates
// ============================================================

pub fn volume_changed(up: bool, step: u8) -> String {
    if up {
        format!("🔊 Volume up by {step}%")
    } else {
        format!("🔉 Volume down by {step}%")
    }
}

/// `❌ <what> failed: <error>`
pub fn failed(what: &str, error: &impl std::fmt::Display) -> String {
    format!("❌ {what} failed: {}", escape_markdown(&error.to_string()))
}

/// Prompt asking the user to echo back `code`.
pub fn confirmation_prompt(action: GuardedAction, code: &str, ttl_minutes: u64) -> String {
    let (title, warning) = match action {
        GuardedAction::Reboot => (
            "🔄 *Confirm reboot*",
            "⚠️ *Warning:* the computer will restart!",
        ),
        GuardedAction::Suspend => (
            "😴 *Confirm sleep*",
            "⚠️ *Warning:* the computer will be suspended!",
        ),
    };
    let unit = if ttl_minutes == 1 { "minute" } else { "minutes" };
    format!(
        "{title}\n\nEnter the confirmation code: `{code}`\n\n{warning}\n\n_The code is valid for {ttl_minutes} {unit}._"
    )
}

pub fn code_accepted(action: GuardedAction) -> String {
    match action {
        GuardedAction::Reboot => "✅ Code confirmed. Rebooting the computer...".to_string(),
        GuardedAction::Suspend => "✅ Code confirmed. Suspending the computer...".to_string(),
    }
}

pub fn guarded_action_name(action: GuardedAction) -> &'static str {
    match action {
        GuardedAction::Reboot => "Reboot",
        GuardedAction::Suspend => "Sleep",
    }
}

fn toggle(value: Toggle) -> &'static str {
    match value {
        Toggle::On => "on",
        Toggle::Off => "off",
        Toggle::Unknown => "unknown",
    }
}

fn playback(value: PlaybackState) -> &'static str {
    match value {
        PlaybackState::Playing => "playing",
        PlaybackState::Paused => "paused",
        PlaybackState::Stopped => "stopped",
    }
}

/// Audio summary appended to every audio command reply.
pub fn audio_status(status: &AudioStatus) -> String {
    let volume = status
        .volume_percent
        .map(|v| format!("{v}%"))
        .unwrap_or_else(|| "unknown".to_string());
    let track = status
        .track
        .as_deref()
        .map(escape_markdown)
        .unwrap_or_else(|| "nothing playing".to_string());
    format!(
        "🔊 Sound: {} ({volume})\n🎤 Microphone: {}\n🎵 Status: {}\n🎶 Track: {track}",
        toggle(status.sound),
        toggle(status.microphone),
        playback(status.playback),
    )
}

/// Action confirmation followed by the audio summary.
pub fn with_audio_status(headline: &str, status: &AudioStatus) -> String {
    format!("{headline}\n\n{}", audio_status(status))
}

pub fn pong(millis: u128) -> String {
    format!("🏓 Pong! ⚡ Response time: {millis}ms")
}

pub fn uptime(bot_secs: u64, system_secs: u64) -> String {
    format!(
        "🤖 *Bot uptime:* {}\n💻 *System uptime:* {}",
        format_uptime(bot_secs),
        format_uptime(system_secs)
    )
}

pub fn file_saved(headline: &str, path: &str, size: u64) -> String {
    format!(
        "{headline}\n\n📁 Path: `{path}`\n📊 Size: {}",
        format_file_size(size)
    )
}

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// `/info` report.
pub fn system_report(report: &SystemReport) -> String {
    let total = report.memory_total as f64;
    let available = report.memory_available as f64;
    let used = (total - available).max(0.0);
    let used_percent = if total > 0.0 { used / total * 100.0 } else { 0.0 };

    let graphics = if report.graphics.is_empty() {
        "unknown".to_string()
    } else {
        report.graphics.join(", ")
    };
    let network = match &report.network {
        Some(n) => format!(
            "\n📤 ↑ {}\n📥 ↓ {}",
            format_network_speed(n.upload_bytes_per_sec),
            format_network_speed(n.download_bytes_per_sec)
        ),
        None => " no active interface found".to_string(),
    };

    format!(
        "🖥️ *System information*

*🖥️ HARDWARE*
🔧 Board: {board}
⚙️ CPU: {cpu}
🔢 Cores: {logical} ({physical} physical)
🎮 Graphics: {graphics}

*💻 OPERATING SYSTEM*
📋 OS: {os}
🏗️ Architecture: {arch}
⚙️ Kernel: {kernel}

*📊 STATISTICS*
🖥️ CPU load: {load:.1}%
💾 Memory: {used:.1} GB / {total:.1} GB ({used_percent:.1}%)
💚 Available: {available:.1} GB
⏰ Uptime: {uptime}
🌐 Network:{network}",
        board = escape_markdown(&report.motherboard),
        cpu = escape_markdown(&report.cpu),
        logical = report.logical_cores,
        physical = report.physical_cores,
        graphics = escape_markdown(&graphics),
        os = escape_markdown(&report.os),
        arch = escape_markdown(&report.arch),
        kernel = escape_markdown(&report.kernel),
        load = report.cpu_load_percent,
        used = used / GIB,
        total = total / GIB,
        available = available / GIB,
        uptime = format_uptime(report.uptime_secs),
    )
}
