//! Text routing.
//!
//! Maps inbound text to a [`Command`]. Three shapes are accepted:
//! - slash commands, optionally addressed to the bot (`/play@deskhand_bot`)
//! - reply keyboard button labels
//! - four-digit confirmation code candidates, checked separately by the
//!   dispatcher since they only mean something while a code is pending

use deskhand_types::errors::DeskhandError;
use deskhand_types::GuardedAction;
use regex::Regex;

use crate::text;

/// Every operation the bot can perform on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Help,
    Keyboard,
    SoundOn,
    SoundOff,
    MicrophoneOn,
    MicrophoneOff,
    Play,
    Pause,
    NextTrack,
    PreviousTrack,
    VolumeUp,
    VolumeDown,
    DisplayOff,
    Reboot,
    Suspend,
    Ping,
    Info,
    Uptime,
    Screenshot,
}

impl Command {
    pub const ALL: [Command; 20] = [
        Command::Start,
        Command::Help,
        Command::Keyboard,
        Command::SoundOn,
        Command::SoundOff,
        Command::MicrophoneOn,
        Command::MicrophoneOff,
        Command::Play,
        Command::Pause,
        Command::NextTrack,
        Command::PreviousTrack,
        Command::VolumeUp,
        Command::VolumeDown,
        Command::DisplayOff,
        Command::Reboot,
        Command::Suspend,
        Command::Ping,
        Command::Info,
        Command::Uptime,
        Command::Screenshot,
    ];

    /// Slash command name without the leading `/`.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Keyboard => "keyboard",
            Command::SoundOn => "soundon",
            Command::SoundOff => "soundoff",
            Command::MicrophoneOn => "microphoneon",
            Command::MicrophoneOff => "microphoneoff",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::NextTrack => "next",
            Command::PreviousTrack => "prev",
            Command::VolumeUp => "volume_up",
            Command::VolumeDown => "volume_down",
            Command::DisplayOff => "displayoff",
            Command::Reboot => "reboot",
            Command::Suspend => "suspend",
            Command::Ping => "ping",
            Command::Info => "info",
            Command::Uptime => "uptime",
            Command::Screenshot => "screenshot",
        }
    }

    /// Human name used in failure replies.
    pub fn title(&self) -> &'static str {
        match self {
            Command::Start => "Start",
            Command::Help => "Help",
            Command::Keyboard => "Keyboard",
            Command::SoundOn => "Sound on",
            Command::SoundOff => "Sound off",
            Command::MicrophoneOn => "Microphone on",
            Command::MicrophoneOff => "Microphone off",
            Command::Play => "Play",
            Command::Pause => "Pause",
            Command::NextTrack => "Next track",
            Command::PreviousTrack => "Previous track",
            Command::VolumeUp => "Volume up",
            Command::VolumeDown => "Volume down",
            Command::DisplayOff => "Display off",
            Command::Reboot => "Reboot",
            Command::Suspend => "Sleep",
            Command::Ping => "Ping",
            Command::Info => "System info",
            Command::Uptime => "Uptime",
            Command::Screenshot => "Screenshot",
        }
    }

    /// Keyboard button bound to this command, if it has one.
    pub fn button(&self) -> Option<&'static str> {
        let label = match self {
            Command::SoundOn => text::BTN_SOUND_ON,
            Command::SoundOff => text::BTN_SOUND_OFF,
            Command::MicrophoneOn => text::BTN_MIC_ON,
            Command::MicrophoneOff => text::BTN_MIC_OFF,
            Command::Play => text::BTN_PLAY,
            Command::Pause => text::BTN_PAUSE,
            Command::NextTrack => text::BTN_NEXT,
            Command::PreviousTrack => text::BTN_PREV,
            Command::VolumeUp => text::BTN_VOLUME_UP,
            Command::VolumeDown => text::BTN_VOLUME_DOWN,
            Command::DisplayOff => text::BTN_DISPLAY_OFF,
            Command::Reboot => text::BTN_REBOOT,
            Command::Suspend => text::BTN_SUSPEND,
            Command::Ping => text::BTN_PING,
            Command::Info => text::BTN_INFO,
            Command::Uptime => text::BTN_UPTIME,
            Command::Screenshot => text::BTN_SCREENSHOT,
            Command::Help => text::BTN_HELP,
            Command::Start | Command::Keyboard => return None,
        };
        Some(label)
    }

    /// The guarded action this command requests, for reboot and suspend.
    pub fn guarded_action(&self) -> Option<GuardedAction> {
        match self {
            Command::Reboot => Some(GuardedAction::Reboot),
            Command::Suspend => Some(GuardedAction::Suspend),
            _ => None,
        }
    }
}

/// Parses inbound text into commands and code candidates.
pub struct CommandRouter {
    code_pattern: Regex,
}

impl CommandRouter {
    pub fn new() -> Result<Self, DeskhandError> {
        let code_pattern = Regex::new(r"^\d{4}$")
            .map_err(|e| DeskhandError::Internal(format!("invalid code pattern: {e}")))?;
        Ok(Self { code_pattern })
    }

    /// Whether `text` is exactly four digits. Surrounding whitespace disqualifies it.
    pub fn is_code_candidate(&self, text: &str) -> bool {
        self.code_pattern.is_match(text)
    }

    /// Resolve `text` to a command. Anything after the command word is ignored.
    pub fn parse(&self, text: &str) -> Option<Command> {
        let text = text.trim();
        match text.strip_prefix('/') {
            Some(rest) => parse_slash(rest),
            None => parse_button(text),
        }
    }
}

fn parse_slash(rest: &str) -> Option<Command> {
    let word = rest.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    Command::ALL
        .into_iter()
        .find(|command| command.name().eq_ignore_ascii_case(name))
}

fn parse_button(label: &str) -> Option<Command> {
    Command::ALL
        .into_iter()
        .find(|command| command.button() == Some(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn router() -> CommandRouter {
        CommandRouter::new().unwrap()
    }

    #[test]
    fn test_every_slash_command_parses() {
        let router = router();
        for command in Command::ALL {
            let text = format!("/{}", command.name());
            assert_eq!(router.parse(&text), Some(command), "{text}");
        }
    }

    #[test]
    fn test_slash_command_variants() {
        let router = router();
        assert_eq!(router.parse("/play@deskhand_bot"), Some(Command::Play));
        assert_eq!(router.parse("  /PAUSE  "), Some(Command::Pause));
        assert_eq!(router.parse("/volume_up now please"), Some(Command::VolumeUp));
        assert_eq!(router.parse("/reboot@some_bot 1234"), Some(Command::Reboot));
    }

    #[test]
    fn test_unknown_and_partial_commands_rejected() {
        let router = router();
        assert_eq!(router.parse("/"), None);
        assert_eq!(router.parse("/playlist"), None);
        assert_eq!(router.parse("/volume"), None);
        assert_eq!(router.parse("please /play"), None);
        assert_eq!(router.parse("play"), None);
        assert_eq!(router.parse(""), None);
    }

    #[test]
    fn test_every_keyboard_button_maps_to_a_command() {
        let router = router();
        let keyboard = text::default_keyboard();
        let mut seen = HashSet::new();
        for label in keyboard.rows.iter().flatten() {
            let command = router
                .parse(label)
                .unwrap_or_else(|| panic!("button {label} is not routed"));
            assert!(seen.insert(command), "{label} duplicates another button");
        }
        assert_eq!(seen.len(), 18);
    }

    #[test]
    fn test_code_candidates() {
        let router = router();
        assert!(router.is_code_candidate("4821"));
        assert!(router.is_code_candidate("1000"));
        assert!(!router.is_code_candidate(" 1000 "));
        assert!(!router.is_code_candidate("1000\n"));
        assert!(!router.is_code_candidate("482"));
        assert!(!router.is_code_candidate("48210"));
        assert!(!router.is_code_candidate("48a1"));
        assert!(!router.is_code_candidate("/4821"));
    }

    #[test]
    fn test_guarded_actions() {
        assert_eq!(Command::Reboot.guarded_action(), Some(GuardedAction::Reboot));
        assert_eq!(Command::Suspend.guarded_action(), Some(GuardedAction::Suspend));
        assert_eq!(Command::Play.guarded_action(), None);
    }
}
