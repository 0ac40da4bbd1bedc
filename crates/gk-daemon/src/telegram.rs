//! Telegram Bot API chat transport and the long-poll update loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gk_config::{ContentKind, ContentRef};
use gk_oracle::bot_api::{self, read_result, transport_error};
use gk_oracle::OracleError;
use gk_schemas::UserId;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::dispatch::{ChatTransport, Dispatcher, TransportError, Update, UpdateEvent};

/// Slack added on top of the long-poll timeout for the HTTP client timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);
/// Pause after a failed `getUpdates` before polling again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct TelegramTransport {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl TelegramTransport {
    pub fn new(token: String, base_url: String, poll_timeout_secs: u64) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs) + POLL_GRACE)
            .build()
            .map_err(|e| TransportError {
                method: "client",
                source: OracleError::Config(e.without_url().to_string()),
            })?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &'static str,
        body: &Value,
    ) -> Result<T, TransportError> {
        let url = bot_api::method_url(&self.base_url, &self.token, method);
        let wrap = |source| TransportError { method, source };
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| wrap(transport_error(e)))?;
        read_result(resp).await.map_err(wrap)
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        let raw: Vec<RawUpdate> = self.call("getUpdates", &body).await?;
        Ok(raw.into_iter().map(RawUpdate::into_update).collect())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let _: Value = self
            .call("sendMessage", &json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    async fn send_join_prompt(
        &self,
        chat_id: i64,
        text: &str,
        invite: &str,
        verify_data: &str,
    ) -> Result<(), TransportError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": {
                "inline_keyboard": [[
                    { "text": "Join Channel", "url": invite },
                    { "text": "Verify", "callback_data": verify_data },
                ]]
            }
        });
        let _: Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn send_content(
        &self,
        chat_id: i64,
        content: &ContentRef,
    ) -> Result<(), TransportError> {
        let (method, field) = match content.kind {
            ContentKind::Document => ("sendDocument", "document"),
            ContentKind::Video => ("sendVideo", "video"),
        };
        let mut body = json!({ "chat_id": chat_id });
        body[field] = json!(content.file_id);
        let _: Value = self.call(method, &body).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let _: Value = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_id }),
            )
            .await?;
        Ok(())
    }
}

/// Poll `getUpdates` forever, handing each update to `dispatcher` in order.
pub fn spawn_polling(
    transport: Arc<TelegramTransport>,
    dispatcher: Arc<Dispatcher>,
    poll_timeout_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("telegram polling started");
        let mut offset: Option<i64> = None;
        loop {
            match transport.get_updates(offset, poll_timeout_secs).await {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        debug!(update_id = update.update_id, "update received");
                        dispatcher.handle(&update).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "getUpdates failed; retrying");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Wire shapes (only the fields we read)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    chat: RawChat,
    #[serde(default)]
    from: Option<RawUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawCallbackQuery {
    id: String,
    from: RawUser,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    data: Option<String>,
}

impl RawUpdate {
    fn into_update(self) -> Update {
        let event = if let Some(cb) = self.callback_query {
            UpdateEvent::Callback {
                callback_id: cb.id,
                // Private chats share the user's id.
                chat_id: cb.message.map(|m| m.chat.id).unwrap_or(cb.from.id),
                user: UserId(cb.from.id),
                data: cb.data.unwrap_or_default(),
            }
        } else if let Some(RawMessage {
            chat,
            from: Some(from),
            text: Some(text),
        }) = self.message
        {
            UpdateEvent::Message {
                chat_id: chat.id,
                user: UserId(from.id),
                text,
            }
        } else {
            UpdateEvent::Ignored
        };
        Update {
            update_id: self.update_id,
            event,
        }
    }
}
