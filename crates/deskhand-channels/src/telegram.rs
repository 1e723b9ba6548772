//! Telegram Bot API channel adapter.
//!
//! Implements [`ChatTransport`] over plain HTTPS calls to the Bot API:
//! - Long polling (`getUpdates`) in a background task feeding an mpsc channel
//! - Markdown replies with a plain-text fallback when Telegram rejects the markup
//! - Photo uploads (`sendPhoto`, multipart) and file downloads (`getFile`)
//! - `getMe` as the health probe
//!
//! The poll loop can be told to drop its in-flight request and start over via
//! [`ChatTransport::restart_polling`]; the runtime does this when the heartbeat fails.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use deskhand_types::config::TelegramConfig;
use deskhand_types::errors::DeskhandError;
use deskhand_types::traits::ChatTransport;
use deskhand_types::{FileRef, InboundContent, InboundMessage, OutboundMessage, OutboundPhoto};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

/// Pause after a failed poll before trying again.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Extra slack on top of the long-poll timeout for the HTTP client.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(15);

/// Capacity of the inbound message channel.
const INBOUND_BUFFER: usize = 64;

/// Substring Telegram uses when the Markdown in a message is malformed.
const PARSE_ENTITIES_ERROR: &str = "can't parse entities";

// ============================================================
// Bot API wire types
// ============================================================

/// Envelope around every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    date: i64,
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    photo: Option<Vec<TgPhotoSize>>,
    #[serde(default)]
    document: Option<TgDocument>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgPhotoSize {
    file_id: String,
    width: u32,
    height: u32,
    #[serde(default)]
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TgDocument {
    file_id: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TgFile {
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Clone, Serialize)]
struct ReplyMarkup {
    keyboard: Vec<Vec<KeyboardButton>>,
    resize_keyboard: bool,
    one_time_keyboard: bool,
}

#[derive(Debug, Clone, Serialize)]
struct KeyboardButton {
    text: String,
}

#[derive(Debug, Serialize)]
struct GetFileRequest<'a> {
    file_id: &'a str,
}

/// Failure of a single Bot API call.
#[derive(Debug)]
enum ApiError {
    /// Transport failure or unreadable response.
    Http(String),
    /// Telegram answered `ok: false`.
    Rejected { code: Option<i64>, description: String },
}

impl ApiError {
    fn is_markup_error(&self) -> bool {
        matches!(self, ApiError::Rejected { description, .. } if description.contains(PARSE_ENTITIES_ERROR))
    }
}

impl From<ApiError> for DeskhandError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(msg) => DeskhandError::Channel(msg),
            ApiError::Rejected { code, description } => match code {
                Some(code) => {
                    DeskhandError::Channel(format!("Telegram API error {code}: {description}"))
                }
                None => DeskhandError::Channel(format!("Telegram API error: {description}")),
            },
        }
    }
}

// ============================================================
// Adapter
// ============================================================

/// State shared between the adapter handle and its poll loop.
struct Inner {
    client: Client,
    api_base: String,
    token: String,
    poll_timeout_secs: u64,
    poll_interval: Duration,
    restart_delay: Duration,
    restart: Notify,
    listening: AtomicBool,
}

/// Telegram Bot API adapter.
pub struct TelegramAdapter {
    inner: Arc<Inner>,
}

impl TelegramAdapter {
    /// Build an adapter from the Telegram config section.
    pub fn new(config: &TelegramConfig) -> Result<Self, DeskhandError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + HTTP_TIMEOUT_SLACK)
            .build()
            .map_err(|e| DeskhandError::Channel(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                token: config.bot_token.clone(),
                poll_timeout_secs: config.poll_timeout_secs,
                poll_interval: Duration::from_millis(config.poll_interval_ms),
                restart_delay: Duration::from_millis(config.restart_delay_ms),
                restart: Notify::new(),
                listening: AtomicBool::new(false),
            }),
        })
    }

    /// Fetch pending updates starting at `offset` and convert them to inbound messages.
    ///
    /// Returns the next offset along with the messages; updates that carry no
    /// usable message still advance the offset.
    pub async fn fetch_updates(
        &self,
        offset: i64,
    ) -> Result<(i64, Vec<InboundMessage>), DeskhandError> {
        self.inner.fetch_updates(offset).await
    }
}

impl Inner {
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    /// POST a JSON body to a Bot API method and unwrap the envelope.
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Http(format!("Telegram {method} request failed: {e}")))?;
        Self::unwrap_response(method, response).await
    }

    async fn unwrap_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Http(format!("Telegram {method} response unreadable: {e}")))?;

        let envelope: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            ApiError::Http(format!(
                "Telegram {method} returned unparseable body (HTTP {status}): {e}"
            ))
        })?;

        if !envelope.ok {
            return Err(ApiError::Rejected {
                code: envelope.error_code.or(Some(i64::from(status.as_u16()))),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
        envelope
            .result
            .ok_or_else(|| ApiError::Http(format!("Telegram {method} returned no result")))
    }

    async fn fetch_updates(
        &self,
        offset: i64,
    ) -> Result<(i64, Vec<InboundMessage>), DeskhandError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: vec!["message"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;

        let mut next_offset = offset;
        let mut messages = Vec::with_capacity(updates.len());
        for update in updates {
            next_offset = next_offset.max(update.update_id + 1);
            match to_inbound(update) {
                Some(message) => messages.push(message),
                None => debug!("skipping update without a usable message"),
            }
        }
        Ok((next_offset, messages))
    }

    async fn send_text(
        &self,
        message: &OutboundMessage,
        parse_mode: Option<&'static str>,
    ) -> Result<(), ApiError> {
        let request = SendMessageRequest {
            chat_id: message.chat_id,
            text: &message.text,
            parse_mode,
            reply_markup: message.keyboard.as_ref().map(|kb| ReplyMarkup {
                keyboard: kb
                    .rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|label| KeyboardButton {
                                text: label.clone(),
                            })
                            .collect()
                    })
                    .collect(),
                resize_keyboard: kb.resize,
                one_time_keyboard: kb.one_time,
            }),
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }
}

/// Convert a raw update into an inbound message. Updates without a message
/// or without a sender are dropped.
fn to_inbound(update: Update) -> Option<InboundMessage> {
    let message = update.message?;
    let sender = message.from?;

    let content = if let Some(text) = message.text {
        InboundContent::Text(text)
    } else if let Some(largest) = message
        .photo
        .unwrap_or_default()
        .into_iter()
        .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
    {
        InboundContent::Photo(FileRef {
            file_id: largest.file_id,
            file_name: None,
            file_size: largest.file_size,
        })
    } else if let Some(doc) = message.document {
        InboundContent::Document(FileRef {
            file_id: doc.file_id,
            file_name: doc.file_name,
            file_size: doc.file_size,
        })
    } else {
        InboundContent::Unsupported
    };

    Some(InboundMessage {
        update_id: update.update_id,
        chat_id: message.chat.id,
        user_id: sender.id,
        // An unrepresentable date falls back to the epoch and is dropped as stale.
        sent_at: Utc.timestamp_opt(message.date, 0).single().unwrap_or_default(),
        content,
    })
}

/// Outcome of one turn of the poll loop.
enum PollTurn {
    Batch(Result<(i64, Vec<InboundMessage>), DeskhandError>),
    Restart,
}

/// Background long-poll loop. Ends when the receiver is dropped.
async fn poll_loop(inner: Arc<Inner>, tx: mpsc::Sender<InboundMessage>) {
    let mut offset = 0;
    info!("Telegram polling started");

    loop {
        if tx.is_closed() {
            break;
        }

        let turn = tokio::select! {
            batch = inner.fetch_updates(offset) => PollTurn::Batch(batch),
            _ = inner.restart.notified() => PollTurn::Restart,
        };

        match turn {
            PollTurn::Restart => {
                warn!(
                    delay_ms = inner.restart_delay.as_millis() as u64,
                    "restarting Telegram polling"
                );
                tokio::time::sleep(inner.restart_delay).await;
                info!("Telegram polling resumed");
            }
            PollTurn::Batch(Ok((next_offset, messages))) => {
                offset = next_offset;
                for message in messages {
                    debug!(
                        update_id = message.update_id,
                        chat_id = message.chat_id,
                        user_id = message.user_id,
                        "inbound message"
                    );
                    if tx.send(message).await.is_err() {
                        info!("inbound receiver dropped, stopping Telegram polling");
                        inner.listening.store(false, Ordering::SeqCst);
                        return;
                    }
                }
                if !inner.poll_interval.is_zero() {
                    tokio::time::sleep(inner.poll_interval).await;
                }
            }
            PollTurn::Batch(Err(e)) => {
                error!(error = %e, offset, "Telegram poll failed");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }

    inner.listening.store(false, Ordering::SeqCst);
    info!("Telegram polling stopped");
}

#[async_trait]
impl ChatTransport for TelegramAdapter {
    async fn send_message(&self, message: OutboundMessage) -> Result<(), DeskhandError> {
        match self.inner.send_text(&message, Some("Markdown")).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_markup_error() => {
                warn!(
                    chat_id = message.chat_id,
                    "Markdown rejected by Telegram, resending as plain text"
                );
                self.inner.send_text(&message, None).await.map_err(Into::into)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send_photo(&self, photo: OutboundPhoto) -> Result<(), DeskhandError> {
        let bytes = tokio::fs::read(&photo.path).await.map_err(|e| {
            DeskhandError::Channel(format!("failed to read {}: {e}", photo.path.display()))
        })?;
        let file_name = photo
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "screenshot.png".to_string());

        let form = Form::new()
            .text("chat_id", photo.chat_id.to_string())
            .text("caption", photo.caption.clone())
            .part("photo", Part::bytes(bytes).file_name(file_name));

        let response = self
            .inner
            .client
            .post(self.inner.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeskhandError::Channel(format!("Telegram sendPhoto request failed: {e}")))?;
        let _: serde_json::Value = Inner::unwrap_response("sendPhoto", response).await?;

        debug!(chat_id = photo.chat_id, path = %photo.path.display(), "photo sent");
        Ok(())
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64, DeskhandError> {
        let file: TgFile = self.inner.call("getFile", &GetFileRequest { file_id }).await?;
        let file_path = file.file_path.ok_or_else(|| {
            DeskhandError::Channel(format!("Telegram has no download path for file {file_id}"))
        })?;

        let mut response = self
            .inner
            .client
            .get(self.inner.file_url(&file_path))
            .send()
            .await
            .map_err(|e| DeskhandError::Channel(format!("file download failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeskhandError::Channel(format!(
                "file download failed (HTTP {status})"
            )));
        }

        let mut out = tokio::fs::File::create(dest).await.map_err(|e| {
            DeskhandError::Storage(format!("failed to create {}: {e}", dest.display()))
        })?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DeskhandError::Channel(format!("file download interrupted: {e}")))?
        {
            out.write_all(&chunk).await.map_err(|e| {
                DeskhandError::Storage(format!("failed to write {}: {e}", dest.display()))
            })?;
            written += chunk.len() as u64;
        }
        out.flush().await.map_err(|e| {
            DeskhandError::Storage(format!("failed to flush {}: {e}", dest.display()))
        })?;

        debug!(file_id, bytes = written, dest = %dest.display(), "file downloaded");
        Ok(written)
    }

    async fn health_check(&self) -> Result<(), DeskhandError> {
        let me: TgUser = self
            .inner
            .call("getMe", &serde_json::json!({}))
            .await?;
        debug!(bot_id = me.id, username = ?me.username, "Telegram heartbeat ok");
        Ok(())
    }

    async fn start_listening(&self) -> Result<mpsc::Receiver<InboundMessage>, DeskhandError> {
        if self.inner.listening.swap(true, Ordering::SeqCst) {
            return Err(DeskhandError::Channel(
                "Telegram polling is already running".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        tokio::spawn(poll_loop(self.inner.clone(), tx));
        Ok(rx)
    }

    fn restart_polling(&self) {
        self.inner.restart.notify_one();
    }
}
