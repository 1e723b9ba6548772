/// Unified error type for deskhand.
///
/// All crates use this error type for propagation across crate boundaries.
/// Internal module errors should be converted into the appropriate variant.
#[derive(Debug, thiserror::Error)]
pub enum DeskhandError {
    /// Error from the chat channel (Telegram API failures, malformed updates).
    #[error("channel error: {0}")]
    Channel(String),

    /// An external command could not be spawned or exited unsuccessfully.
    #[error("command error: {0}")]
    Command(String),

    /// The desktop backend cannot perform the request on this machine
    /// (missing utility, no monitors, unsupported platform).
    #[error("platform error: {0}")]
    Platform(String),

    /// Error from file storage (directory creation, download, ownership).
    #[error("storage error: {0}")]
    Storage(String),

    /// Error from configuration loading or validation.
    #[error("config error: {0}")]
    Config(String),

    /// Timeout waiting for a command or a remote call.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DeskhandError {
    fn from(err: serde_json::Error) -> Self {
        DeskhandError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DeskhandError {
    fn from(err: serde_yaml::Error) -> Self {
        DeskhandError::Serialization(err.to_string())
    }
}
