//! Reply keyboard tracking.
//!
//! Telegram keeps a reply keyboard visible once it has been sent, so the bot
//! only attaches it when a chat has not seen the current layout yet or when a
//! resend was explicitly requested (`/start`, `/keyboard`, `/help`).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use deskhand_types::ReplyKeyboard;
use tracing::debug;

#[derive(Debug, Default)]
struct ChatKeyboard {
    current: Option<ReplyKeyboard>,
    force_next: bool,
}

/// Per-chat record of which keyboard was last sent.
pub struct KeyboardTracker {
    default: ReplyKeyboard,
    chats: Mutex<HashMap<i64, ChatKeyboard>>,
}

impl KeyboardTracker {
    pub fn new(default: ReplyKeyboard) -> Self {
        Self {
            default,
            chats: Mutex::new(HashMap::new()),
        }
    }

    /// The layout every chat is expected to show.
    pub fn default_keyboard(&self) -> &ReplyKeyboard {
        &self.default
    }

    /// Keyboard to attach to the next outbound message for `chat_id`, if any.
    ///
    /// Returns the default layout when `force` is set, a forced resend is
    /// pending, or the chat shows something else. Records it as current.
    pub fn keyboard_for(&self, chat_id: i64, force: bool) -> Option<ReplyKeyboard> {
        let mut chats = self.lock();
        let chat = chats.entry(chat_id).or_default();

        let stale = chat.current.as_ref() != Some(&self.default);
        if !(force || chat.force_next || stale) {
            return None;
        }

        debug!(chat_id, force, pending_force = chat.force_next, "attaching reply keyboard");
        chat.current = Some(self.default.clone());
        chat.force_next = false;
        Some(self.default.clone())
    }

    /// Mark the default layout as current, optionally forcing a resend next time.
    pub fn set_keyboard(&self, chat_id: i64, force: bool) {
        let mut chats = self.lock();
        let chat = chats.entry(chat_id).or_default();
        chat.current = Some(self.default.clone());
        if force {
            chat.force_next = true;
        }
    }

    /// Forget everything about `chat_id`.
    pub fn reset(&self, chat_id: i64) {
        self.lock().remove(&chat_id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, ChatKeyboard>> {
        self.chats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
