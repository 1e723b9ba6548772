/// Chat-facing state and the Telegram channel adapter for deskhand.
///
/// - **Confirmation**: per-user, time-limited codes guarding reboot and suspend
/// - **Keyboard**: per-chat reply keyboard tracking so the keyboard is only resent when needed
/// - **Telegram**: Telegram Bot API adapter implementing [`deskhand_types::ChatTransport`]
pub mod confirmation;
pub mod keyboard;
pub mod telegram;

pub use confirmation::ConfirmationGate;
pub use keyboard::KeyboardTracker;
pub use telegram::TelegramAdapter;
