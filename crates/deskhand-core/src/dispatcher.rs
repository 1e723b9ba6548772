//! Inbound message handling.
//!
//! Every message goes through the same pipeline:
//! 1. Drop messages older than the configured maximum age
//! 2. Reject senders other than the authorized user
//! 3. Save photos and documents to storage
//! 4. Treat a four-digit reply as a confirmation code while one is pending
//! 5. Route anything else to a command handler
//!
//! Handler failures are logged and reported to the chat; they never reach the
//! runtime loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use deskhand_channels::{ConfirmationGate, KeyboardTracker};
use deskhand_tools::FileStore;
use deskhand_types::config::BotConfig;
use deskhand_types::errors::DeskhandError;
use deskhand_types::*;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::router::{Command, CommandRouter};
use crate::text;

/// Settings the dispatcher reads on every message.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// The only Telegram user allowed to control the machine.
    pub authorized_user_id: i64,
    /// Messages older than this are dropped unanswered.
    pub max_message_age: Duration,
    /// Reported back in volume replies.
    pub volume_step_percent: u8,
}

impl DispatcherConfig {
    pub fn from_config(config: &BotConfig) -> Result<Self, DeskhandError> {
        let authorized_user_id = config
            .auth
            .authorized_user_id
            .ok_or_else(|| DeskhandError::Config("auth.authorized_user_id is not set".to_string()))?;
        Ok(Self {
            authorized_user_id,
            max_message_age: Duration::from_secs(config.messages.max_age_secs.max(0) as u64),
            volume_step_percent: config.desktop.volume_step_percent,
        })
    }
}

/// All collaborators the dispatcher needs, injectable for testing.
pub struct DispatcherDeps {
    pub transport: Arc<dyn ChatTransport>,
    pub desktop: Arc<dyn DesktopController>,
    pub gate: Arc<ConfirmationGate>,
    pub keyboards: Arc<KeyboardTracker>,
    pub store: Arc<FileStore>,
    pub clock: Arc<dyn Clock>,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Older than the maximum age.
    Stale,
    /// From someone other than the authorized user.
    Unauthorized,
    /// Nothing to do (unknown text, stickers, stray codes).
    Ignored,
    /// A reply was attempted.
    Handled,
}

pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    desktop: Arc<dyn DesktopController>,
    gate: Arc<ConfirmationGate>,
    keyboards: Arc<KeyboardTracker>,
    store: Arc<FileStore>,
    clock: Arc<dyn Clock>,
    router: CommandRouter,
    config: DispatcherConfig,
    started: Instant,
}

impl Dispatcher {
    pub fn new(deps: DispatcherDeps, config: DispatcherConfig) -> Result<Self, DeskhandError> {
        Ok(Self {
            transport: deps.transport,
            desktop: deps.desktop,
            gate: deps.gate,
            keyboards: deps.keyboards,
            store: deps.store,
            clock: deps.clock,
            router: CommandRouter::new()?,
            config,
            started: Instant::now(),
        })
    }

    /// Handle one inbound message to completion.
    pub async fn handle_message(&self, message: InboundMessage) -> Disposition {
        let chat_id = message.chat_id;
        let user_id = message.user_id;

        if self.is_stale(&message) {
            debug!(chat_id, user_id, sent_at = %message.sent_at, "dropping stale message");
            return Disposition::Stale;
        }

        if user_id != self.config.authorized_user_id {
            warn!(chat_id, user_id, "message from unauthorized user");
            let reply = OutboundMessage {
                chat_id,
                text: text::NO_ACCESS.to_string(),
                keyboard: None,
            };
            if let Err(e) = self.transport.send_message(reply).await {
                warn!(chat_id, error = %e, "failed to send access denial");
            }
            return Disposition::Unauthorized;
        }

        match message.content {
            InboundContent::Text(body) => self.handle_text(chat_id, user_id, &body).await,
            InboundContent::Photo(file) => {
                self.handle_upload(chat_id, &file, ".jpg", text::PHOTO_SAVED, "Saving the photo")
                    .await
            }
            InboundContent::Document(file) => {
                self.handle_upload(chat_id, &file, "", text::FILE_SAVED, "Saving the file")
                    .await
            }
            InboundContent::Unsupported => {
                debug!(chat_id, "ignoring unsupported message");
                Disposition::Ignored
            }
        }
    }

    fn is_stale(&self, message: &InboundMessage) -> bool {
        let age = self.clock.now() - message.sent_at;
        let max_age = ChronoDuration::seconds(self.config.max_message_age.as_secs() as i64);
        age > max_age
    }

    // ============================================================
    // Text
    // ============================================================

    async fn handle_text(&self, chat_id: i64, user_id: i64, body: &str) -> Disposition {
        let principal = user_id.to_string();

        if self.router.is_code_candidate(body) && self.gate.has_pending(&principal) {
            self.confirm(chat_id, &principal, body).await;
            return Disposition::Handled;
        }

        let Some(command) = self.router.parse(body) else {
            debug!(chat_id, "unrecognised text");
            return Disposition::Ignored;
        };

        info!(chat_id, user_id, command = command.name(), "running command");
        if let Err(e) = self.run_command(chat_id, &principal, command).await {
            error!(chat_id, command = command.name(), error = %e, "command failed");
            self.report_failure(chat_id, command.title(), &e).await;
        }
        Disposition::Handled
    }

    async fn confirm(&self, chat_id: i64, principal: &str, code: &str) {
        let validation = self.gate.validate(principal, code);
        let Some(entry) = validation.data.filter(|_| validation.valid) else {
            info!(chat_id, principal, "confirmation code rejected");
            self.reply_or_log(chat_id, text::INVALID_CODE.to_string()).await;
            return;
        };

        let action = entry.action;
        let target = entry.channel.parse::<i64>().unwrap_or(chat_id);
        info!(chat_id = target, principal, action = %action, "confirmation accepted");
        self.reply_or_log(target, text::code_accepted(action)).await;

        let result = match action {
            GuardedAction::Reboot => self.desktop.reboot().await,
            GuardedAction::Suspend => self.desktop.suspend().await,
        };
        if let Err(e) = result {
            error!(chat_id = target, action = %action, error = %e, "guarded action failed");
            self.report_failure(target, text::guarded_action_name(action), &e)
                .await;
        }
    }

    async fn run_command(
        &self,
        chat_id: i64,
        principal: &str,
        command: Command,
    ) -> Result<(), DeskhandError> {
        let step = self.config.volume_step_percent;
        match command {
            Command::Start => self.reply_with_keyboard(chat_id, text::WELCOME.to_string()).await,
            Command::Help => {
                let body = format!("{}\n\n{}", text::HELP_TITLE, text::HELP);
                self.reply_with_keyboard(chat_id, body).await
            }
            Command::Keyboard => {
                self.reply_with_keyboard(chat_id, text::KEYBOARD_RESTORED.to_string())
                    .await
            }
            Command::SoundOn => {
                self.audio(chat_id, text::SOUND_ON, self.desktop.sound_on())
                    .await
            }
            Command::SoundOff => {
                self.audio(chat_id, text::SOUND_OFF, self.desktop.sound_off())
                    .await
            }
            Command::MicrophoneOn => {
                self.audio(chat_id, text::MIC_ON, self.desktop.microphone_on())
                    .await
            }
            Command::MicrophoneOff => {
                self.audio(chat_id, text::MIC_OFF, self.desktop.microphone_off())
                    .await
            }
            Command::Play => {
                self.audio(chat_id, text::PLAY_STARTED, self.desktop.play())
                    .await
            }
            Command::Pause => {
                self.audio(chat_id, text::PLAY_PAUSED, self.desktop.pause())
                    .await
            }
            Command::NextTrack => {
                self.audio(chat_id, text::NEXT_TRACK, self.desktop.next_track())
                    .await
            }
            Command::PreviousTrack => {
                self.audio(chat_id, text::PREV_TRACK, self.desktop.previous_track())
                    .await
            }
            Command::VolumeUp => {
                let headline = text::volume_changed(true, step);
                self.audio(chat_id, &headline, self.desktop.volume_up())
                    .await
            }
            Command::VolumeDown => {
                let headline = text::volume_changed(false, step);
                self.audio(chat_id, &headline, self.desktop.volume_down())
                    .await
            }
            Command::DisplayOff => {
                self.desktop.display_off().await?;
                self.reply(chat_id, text::DISPLAY_OFF.to_string()).await
            }
            Command::Reboot | Command::Suspend => {
                let action = command
                    .guarded_action()
                    .ok_or_else(|| DeskhandError::Internal(format!("{command:?} is not guarded")))?;
                self.request_confirmation(chat_id, principal, action).await
            }
            Command::Ping => self.ping(chat_id).await,
            Command::Info => {
                self.reply(chat_id, text::COLLECTING_INFO.to_string()).await?;
                let report = self.desktop.system_report().await?;
                self.reply(chat_id, text::system_report(&report)).await
            }
            Command::Uptime => {
                let bot = self.started.elapsed().as_secs();
                let system = self.desktop.system_uptime_secs();
                self.reply(chat_id, text::uptime(bot, system)).await
            }
            Command::Screenshot => self.screenshots(chat_id).await,
        }
    }

    // ============================================================
    // Handlers
    // ============================================================

    /// Run an audio action, then reply with its headline and the audio status.
    async fn audio(
        &self,
        chat_id: i64,
        headline: &str,
        action: impl Future<Output = Result<(), DeskhandError>>,
    ) -> Result<(), DeskhandError> {
        action.await?;
        let status = self.desktop.audio_status().await;
        self.reply(chat_id, text::with_audio_status(headline, &status))
            .await
    }

    async fn request_confirmation(
        &self,
        chat_id: i64,
        principal: &str,
        action: GuardedAction,
    ) -> Result<(), DeskhandError> {
        let code = self.gate.issue(principal, &chat_id.to_string(), action);
        info!(chat_id, principal, action = %action, "confirmation code issued");
        let minutes = self.gate.ttl().as_secs().div_ceil(60).max(1);
        self.reply(chat_id, text::confirmation_prompt(action, &code, minutes))
            .await
    }

    async fn ping(&self, chat_id: i64) -> Result<(), DeskhandError> {
        let started = Instant::now();
        self.transport.health_check().await?;
        let millis = started.elapsed().as_millis();
        self.reply(chat_id, text::pong(millis)).await
    }

    /// Send one photo per monitor. Temporary files are removed either way.
    async fn screenshots(&self, chat_id: i64) -> Result<(), DeskhandError> {
        let shots = self.desktop.take_screenshots().await?;
        if shots.is_empty() {
            return Err(DeskhandError::Platform("no screenshots were captured".to_string()));
        }

        let paths: Vec<_> = shots.iter().map(|s| s.path.clone()).collect();
        let mut first_error = None;
        for shot in shots {
            let photo = OutboundPhoto {
                chat_id,
                path: shot.path,
                caption: shot.caption,
            };
            if let Err(e) = self.transport.send_photo(photo).await {
                warn!(chat_id, error = %e, "failed to send screenshot");
                first_error.get_or_insert(e);
            }
        }
        self.desktop.cleanup_files(&paths).await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn handle_upload(
        &self,
        chat_id: i64,
        file: &FileRef,
        default_ext: &str,
        headline: &str,
        what: &str,
    ) -> Disposition {
        match self.store.save(self.transport.as_ref(), file, default_ext).await {
            Ok(saved) => {
                let path = saved.path.display().to_string();
                self.reply_or_log(chat_id, text::file_saved(headline, &path, saved.size))
                    .await;
            }
            Err(e) => {
                error!(chat_id, file_id = %file.file_id, error = %e, "failed to save upload");
                self.report_failure(chat_id, what, &e).await;
            }
        }
        Disposition::Handled
    }

    // ============================================================
    // Replies
    // ============================================================

    async fn reply(&self, chat_id: i64, text: String) -> Result<(), DeskhandError> {
        self.send(chat_id, text, false).await
    }

    async fn reply_with_keyboard(&self, chat_id: i64, text: String) -> Result<(), DeskhandError> {
        self.send(chat_id, text, true).await
    }

    async fn reply_or_log(&self, chat_id: i64, text: String) {
        if let Err(e) = self.reply(chat_id, text).await {
            warn!(chat_id, error = %e, "failed to send reply");
        }
    }

    async fn report_failure(&self, chat_id: i64, what: &str, error: &DeskhandError) {
        self.reply_or_log(chat_id, text::failed(what, error)).await;
    }

    /// Send through the keyboard tracker. A failed send forgets the chat's
    /// keyboard state so the next reply carries it again.
    async fn send(&self, chat_id: i64, text: String, force_keyboard: bool) -> Result<(), DeskhandError> {
        let keyboard = self.keyboards.keyboard_for(chat_id, force_keyboard);
        let message = OutboundMessage {
            chat_id,
            text,
            keyboard,
        };
        if let Err(e) = self.transport.send_message(message).await {
            self.keyboards.reset(chat_id);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use chrono::{DateTime, Utc};
    use std::path::PathBuf;

    struct Harness {
        dispatcher: Dispatcher,
        transport: Arc<MockTransport>,
        desktop: Arc<MockDesktop>,
        gate: Arc<ConfirmationGate>,
        clock: Arc<ManualClock>,
        _storage: tempfile::TempDir,
        storage_path: PathBuf,
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn harness_with(desktop: MockDesktop) -> Harness {
        let transport = Arc::new(MockTransport::new());
        let desktop = Arc::new(desktop);
        let clock = Arc::new(ManualClock::new(start()));
        let gate = Arc::new(ConfirmationGate::new(
            Duration::from_secs(300),
            clock.clone(),
        ));
        let storage = tempfile::tempdir().unwrap();
        let storage_path = storage.path().join("inbox");
        let deps = DispatcherDeps {
            transport: transport.clone(),
            desktop: desktop.clone(),
            gate: gate.clone(),
            keyboards: Arc::new(KeyboardTracker::new(text::default_keyboard())),
            store: Arc::new(FileStore::new(&storage_path, None, clock.clone())),
            clock: clock.clone(),
        };
        let config = DispatcherConfig {
            authorized_user_id: OWNER,
            max_message_age: Duration::from_secs(60),
            volume_step_percent: 5,
        };
        Harness {
            dispatcher: Dispatcher::new(deps, config).unwrap(),
            transport,
            desktop,
            gate,
            clock,
            _storage: storage,
            storage_path,
        }
    }

    fn harness() -> Harness {
        harness_with(MockDesktop::new())
    }

    impl Harness {
        async fn say(&self, body: &str) -> Disposition {
            self.dispatcher
                .handle_message(text_from(OWNER, self.clock.now(), body))
                .await
        }

        /// The code embedded in the last confirmation prompt.
        fn last_code(&self) -> String {
            let text = self.transport.last().text;
            let start = text.find('`').unwrap() + 1;
            text[start..start + 4].to_string()
        }
    }

    fn wrong(code: &str) -> String {
        let n: u32 = code.parse().unwrap();
        (if n == 9999 { 1000 } else { n + 1 }).to_string()
    }

    #[tokio::test]
    async fn test_stale_messages_are_dropped() {
        let h = harness();
        let old = h.clock.now() - ChronoDuration::seconds(61);
        let result = h
            .dispatcher
            .handle_message(text_from(OWNER, old, "/reboot"))
            .await;

        assert_eq!(result, Disposition::Stale);
        assert!(h.transport.texts().is_empty());
        assert!(!h.gate.has_pending(&OWNER.to_string()));
    }

    #[tokio::test]
    async fn test_message_at_age_limit_is_processed() {
        let h = harness();
        let at_limit = h.clock.now() - ChronoDuration::seconds(60);
        let result = h
            .dispatcher
            .handle_message(text_from(OWNER, at_limit, "/ping"))
            .await;
        assert_eq!(result, Disposition::Handled);
    }

    #[tokio::test]
    async fn test_unauthorized_user_denied_without_keyboard() {
        let h = harness();
        let result = h
            .dispatcher
            .handle_message(text_from(999, h.clock.now(), "/reboot"))
            .await;

        assert_eq!(result, Disposition::Unauthorized);
        let reply = h.transport.last();
        assert_eq!(reply.text, text::NO_ACCESS);
        assert!(reply.keyboard.is_none());
        assert!(!h.gate.has_pending("999"));
        assert!(h.desktop.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_keyboard_always_attach_keyboard() {
        let h = harness();
        h.say("/start").await;
        h.say("/keyboard").await;
        h.say("/help").await;

        let sent = h.transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|m| m.keyboard == Some(text::default_keyboard())));
        assert_eq!(sent[0].text, text::WELCOME);
        assert_eq!(sent[1].text, text::KEYBOARD_RESTORED);
        assert!(sent[2].text.starts_with(text::HELP_TITLE));
    }

    #[tokio::test]
    async fn test_keyboard_attached_once_then_omitted() {
        let h = harness();
        h.say("/ping").await;
        h.say("/ping").await;

        let sent = h.transport.sent.lock().unwrap().clone();
        assert!(sent[0].keyboard.is_some());
        assert!(sent[1].keyboard.is_none());
    }

    #[tokio::test]
    async fn test_failed_send_resets_keyboard_state() {
        let h = harness();
        h.say("/ping").await;
        *h.transport.fail_sends.lock().unwrap() = true;
        h.say("/ping").await;
        *h.transport.fail_sends.lock().unwrap() = false;
        h.say("/ping").await;

        let sent = h.transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].keyboard.is_some());
    }

    #[tokio::test]
    async fn test_audio_command_reports_status() {
        let h = harness();
        let result = h.say("🔇 Sound off").await;

        assert_eq!(result, Disposition::Handled);
        assert_eq!(h.desktop.calls(), vec!["sound_off"]);
        let reply = h.transport.last().text;
        assert!(reply.starts_with(text::SOUND_OFF));
        assert!(reply.contains("🎶 Track: Artist - Song"));
    }

    #[tokio::test]
    async fn test_volume_reply_mentions_step() {
        let h = harness();
        h.say("/volume_down").await;
        assert_eq!(h.desktop.calls(), vec!["volume_down"]);
        assert!(h.transport.last().text.starts_with("🔉 Volume down by 5%"));
    }

    #[tokio::test]
    async fn test_failed_command_is_reported() {
        let h = harness_with(MockDesktop::failing(&["play"]));
        let result = h.say("/play").await;

        assert_eq!(result, Disposition::Handled);
        assert_eq!(
            h.transport.last().text,
            "❌ Play failed: command error: play: exit status 1"
        );
    }

    #[tokio::test]
    async fn test_unknown_text_is_ignored() {
        let h = harness();
        assert_eq!(h.say("hello there").await, Disposition::Ignored);
        assert_eq!(h.say("/playlist").await, Disposition::Ignored);
        assert!(h.transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_code_without_pending_confirmation_is_ignored() {
        let h = harness();
        assert_eq!(h.say("1234").await, Disposition::Ignored);
        assert!(h.transport.texts().is_empty());
    }

    #[tokio::test]
    async fn test_reboot_requires_code() {
        let h = harness();
        h.say("🔄 Reboot").await;

        let prompt = h.transport.last().text;
        assert!(prompt.contains("Confirm reboot"));
        assert!(prompt.contains("valid for 5 minutes"));
        assert!(h.gate.has_pending(&OWNER.to_string()));
        assert!(h.desktop.calls().is_empty());

        let code = h.last_code();
        h.say(&code).await;

        assert_eq!(h.desktop.calls(), vec!["reboot"]);
        assert_eq!(
            h.transport.last().text,
            text::code_accepted(GuardedAction::Reboot)
        );
        assert!(!h.gate.has_pending(&OWNER.to_string()));
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_confirmation_pending() {
        let h = harness();
        h.say("/suspend").await;
        let code = h.last_code();

        h.say(&wrong(&code)).await;
        assert_eq!(h.transport.last().text, text::INVALID_CODE);
        assert!(h.desktop.calls().is_empty());
        assert!(h.gate.has_pending(&OWNER.to_string()));

        h.say(&code).await;
        assert_eq!(h.desktop.calls(), vec!["suspend"]);
    }

    #[tokio::test]
    async fn test_padded_code_is_not_a_confirmation() {
        let h = harness();
        h.say("/reboot").await;
        let code = h.last_code();
        let sent = h.transport.texts().len();

        assert_eq!(h.say(&format!(" {code} ")).await, Disposition::Ignored);
        assert_eq!(h.transport.texts().len(), sent);
        assert!(h.desktop.calls().is_empty());
        assert!(h.gate.has_pending(&OWNER.to_string()));

        h.say(&code).await;
        assert_eq!(h.desktop.calls(), vec!["reboot"]);
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let h = harness();
        h.say("/reboot").await;
        let code = h.last_code();

        h.say(&code).await;
        assert_eq!(h.say(&code).await, Disposition::Ignored);
        assert_eq!(h.desktop.calls(), vec!["reboot"]);
    }

    #[tokio::test]
    async fn test_second_request_replaces_first_code() {
        let h = harness();
        h.say("/reboot").await;
        let first = h.last_code();
        h.say("/suspend").await;
        let second = h.last_code();

        if first != second {
            h.say(&first).await;
            assert_eq!(h.transport.last().text, text::INVALID_CODE);
        }
        h.say(&second).await;
        assert_eq!(h.desktop.calls(), vec!["suspend"]);
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let h = harness();
        h.say("/reboot").await;
        let code = h.last_code();

        h.clock.advance(ChronoDuration::seconds(301));
        h.say(&code).await;

        assert!(h.desktop.calls().is_empty());
        assert!(!h.gate.has_pending(&OWNER.to_string()));
    }

    #[tokio::test]
    async fn test_failed_guarded_action_is_reported() {
        let h = harness_with(MockDesktop::failing(&["reboot"]));
        h.say("/reboot").await;
        let code = h.last_code();
        h.say(&code).await;

        let texts = h.transport.texts();
        assert_eq!(texts[texts.len() - 2], text::code_accepted(GuardedAction::Reboot));
        assert!(texts[texts.len() - 1].starts_with("❌ Reboot failed"));
    }

    #[tokio::test]
    async fn test_info_sends_progress_then_report() {
        let h = harness();
        h.say("/info").await;

        let texts = h.transport.texts();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], text::COLLECTING_INFO);
        assert!(texts[1].contains("Board: LENOVO 20QV"));
    }

    #[tokio::test]
    async fn test_uptime_and_ping() {
        let h = harness();
        h.say("/uptime").await;
        assert!(h.transport.last().text.contains("System uptime:* 3h"));

        h.say("🏓 Ping").await;
        assert!(h.transport.last().text.starts_with("🏓 Pong!"));
        assert_eq!(
            h.transport
                .health_checks
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_screenshots_sent_and_cleaned_up() {
        let h = harness();
        *h.desktop.screenshots.lock().unwrap() = vec![
            Screenshot {
                path: PathBuf::from("/tmp/a.png"),
                caption: "Monitor eDP-1 (1 of 2)".to_string(),
            },
            Screenshot {
                path: PathBuf::from("/tmp/b.png"),
                caption: "Monitor HDMI-1 (2 of 2)".to_string(),
            },
        ];
        h.say("/screenshot").await;

        let photos = h.transport.photos.lock().unwrap().clone();
        assert_eq!(photos.len(), 2);
        assert_eq!(photos[1].caption, "Monitor HDMI-1 (2 of 2)");
        assert_eq!(photos[0].chat_id, CHAT);
        assert_eq!(
            *h.desktop.cleaned.lock().unwrap(),
            vec![PathBuf::from("/tmp/a.png"), PathBuf::from("/tmp/b.png")]
        );
    }

    #[tokio::test]
    async fn test_no_screenshots_is_reported() {
        let h = harness();
        h.say("/screenshot").await;
        assert!(h.transport.last().text.starts_with("❌ Screenshot failed"));
    }

    #[tokio::test]
    async fn test_document_is_saved() {
        let h = harness();
        let message = InboundMessage {
            update_id: 5,
            chat_id: CHAT,
            user_id: OWNER,
            sent_at: h.clock.now(),
            content: InboundContent::Document(FileRef {
                file_id: "doc-1".to_string(),
                file_name: Some("notes.txt".to_string()),
                file_size: Some(10),
            }),
        };
        assert_eq!(h.dispatcher.handle_message(message).await, Disposition::Handled);

        let reply = h.transport.last().text;
        assert!(reply.starts_with(text::FILE_SAVED));
        assert!(reply.contains("-notes.txt`"));
        assert!(reply.contains("10 B"));
        let downloads = h.transport.downloads.lock().unwrap().clone();
        assert_eq!(downloads.len(), 1);
        assert!(downloads[0].1.starts_with(&h.storage_path));
    }

    #[tokio::test]
    async fn test_photo_gets_default_extension() {
        let h = harness();
        let message = InboundMessage {
            update_id: 6,
            chat_id: CHAT,
            user_id: OWNER,
            sent_at: h.clock.now(),
            content: InboundContent::Photo(FileRef {
                file_id: "photo-1".to_string(),
                file_name: None,
                file_size: None,
            }),
        };
        h.dispatcher.handle_message(message).await;

        assert!(h.transport.last().text.starts_with(text::PHOTO_SAVED));
        let downloads = h.transport.downloads.lock().unwrap().clone();
        assert!(downloads[0].1.to_string_lossy().ends_with("-file.jpg"));
    }

    #[tokio::test]
    async fn test_failed_download_is_reported() {
        let h = harness();
        let message = InboundMessage {
            update_id: 7,
            chat_id: CHAT,
            user_id: OWNER,
            sent_at: h.clock.now(),
            content: InboundContent::Document(FileRef {
                file_id: "broken".to_string(),
                file_name: Some("big.iso".to_string()),
                file_size: None,
            }),
        };
        h.dispatcher.handle_message(message).await;
        assert!(h.transport.last().text.starts_with("❌ Saving the file failed"));
    }

    #[tokio::test]
    async fn test_unsupported_content_is_ignored() {
        let h = harness();
        let message = InboundMessage {
            update_id: 8,
            chat_id: CHAT,
            user_id: OWNER,
            sent_at: h.clock.now(),
            content: InboundContent::Unsupported,
        };
        assert_eq!(h.dispatcher.handle_message(message).await, Disposition::Ignored);
    }
}
