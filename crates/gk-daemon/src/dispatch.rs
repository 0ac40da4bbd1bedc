//! Chat dispatcher: turns incoming updates into gate commands and renders the
//! outcomes back to the user.
//!
//! The gate decides; this module only words the reply and sends content.
//! A transport failure while replying is logged and does not undo the gate
//! operation that already happened.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use gk_config::ContentRef;
use gk_gate::{
    ChannelIndex, GateCommand, GateController, GateError, GateResponse, StartOutcome,
    VerifyOutcome, VerifyReport,
};
use gk_oracle::OracleError;
use gk_schemas::UserId;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// One incoming chat update, already stripped of transport detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub event: UpdateEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Message {
        chat_id: i64,
        user: UserId,
        text: String,
    },
    Callback {
        callback_id: String,
        chat_id: i64,
        user: UserId,
        data: String,
    },
    /// Anything the gate does not react to.
    Ignored,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub method: &'static str,
    pub source: OracleError,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.method, self.source)
    }
}

impl std::error::Error for TransportError {}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;

    /// Message with two buttons: a URL button opening `invite` and a callback
    /// button carrying `verify_data`.
    async fn send_join_prompt(
        &self,
        chat_id: i64,
        text: &str,
        invite: &str,
        verify_data: &str,
    ) -> Result<(), TransportError>;

    async fn send_content(&self, chat_id: i64, content: &ContentRef)
        -> Result<(), TransportError>;

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    gate: Arc<GateController>,
    transport: Arc<dyn ChatTransport>,
    /// Content per channel, in roster order.
    content: Vec<Vec<ContentRef>>,
}

impl Dispatcher {
    pub fn new(
        gate: Arc<GateController>,
        transport: Arc<dyn ChatTransport>,
        content: Vec<Vec<ContentRef>>,
    ) -> Self {
        Self {
            gate,
            transport,
            content,
        }
    }

    pub async fn handle(&self, update: &Update) {
        let (chat_id, command) = match &update.event {
            UpdateEvent::Message {
                chat_id,
                user,
                text,
            } => match GateCommand::parse_text(*user, text) {
                Some(command) => (*chat_id, command),
                None => {
                    debug!(update_id = update.update_id, "ignoring message");
                    return;
                }
            },
            UpdateEvent::Callback {
                callback_id,
                chat_id,
                user,
                data,
            } => {
                self.deliver(self.transport.answer_callback(callback_id).await);
                match GateCommand::parse_callback(*user, data, self.gate.roster()) {
                    Ok(command) => (*chat_id, command),
                    Err(e) => {
                        debug!(user = %user, error = %e, "rejected callback");
                        let text = match e {
                            GateError::InvalidChannel { .. } => {
                                "That channel is no longer available."
                            }
                            _ => "Invalid verification request.",
                        };
                        self.reply(*chat_id, text).await;
                        return;
                    }
                }
            }
            UpdateEvent::Ignored => return,
        };

        match self.gate.execute(command).await {
            GateResponse::Start(outcome) => self.render_start(chat_id, outcome).await,
            GateResponse::Verify(report) => self.render_verify(chat_id, &report).await,
        }
    }

    async fn render_start(&self, chat_id: i64, outcome: StartOutcome) {
        match outcome {
            StartOutcome::Verified(report) => {
                let n = report.channel.get() + 1;
                let text = match report.outcome {
                    VerifyOutcome::NewlyCounted {
                        advancement: Some(_),
                    } => format!("You joined Channel {n} and were counted. Channel advanced."),
                    VerifyOutcome::NewlyCounted { advancement: None } => {
                        format!("You are a member of Channel {n}. Here are your files:")
                    }
                    VerifyOutcome::AlreadyCounted | VerifyOutcome::Uncredited => {
                        format!("You are already a member of Channel {n}. Sending files:")
                    }
                    VerifyOutcome::VerificationFailed => {
                        format!("I could not confirm your membership of Channel {n}. Send /start to try again.")
                    }
                };
                self.reply(chat_id, &text).await;
                if report.content_entitled() {
                    self.send_files(chat_id, report.channel).await;
                }
            }
            StartOutcome::Prompted { channel, invite } => {
                let text = format!(
                    "Please join Channel {} to unlock the files. After joining, press Verify.",
                    channel.get() + 1
                );
                let data = GateCommand::verify_callback_data(channel);
                self.deliver(
                    self.transport
                        .send_join_prompt(chat_id, &text, &invite, &data)
                        .await,
                );
            }
        }
    }

    async fn render_verify(&self, chat_id: i64, report: &VerifyReport) {
        let n = report.channel.get() + 1;
        let text = match report.outcome {
            VerifyOutcome::VerificationFailed => {
                "I still don't see you as a member of that channel. Join and try again."
                    .to_string()
            }
            VerifyOutcome::NewlyCounted { .. } => {
                format!("Verified & counted for Channel {n}. Here are your files:")
            }
            VerifyOutcome::AlreadyCounted => {
                format!("You were already counted for Channel {n}. Sending files again:")
            }
            VerifyOutcome::Uncredited => format!(
                "You are a member of Channel {n}, but were not prompted to join it. Not counted, but here are your files:"
            ),
        };
        self.reply(chat_id, &text).await;
        if report.content_entitled() {
            self.send_files(chat_id, report.channel).await;
        }
        if let Some(adv) = report.advancement() {
            let text = format!(
                "Channel {} completed. Next active channel: {}.",
                adv.completed + 1,
                adv.active_index + 1
            );
            self.reply(chat_id, &text).await;
        }
    }

    async fn send_files(&self, chat_id: i64, channel: ChannelIndex) {
        let Some(items) = self.content.get(channel.get()) else {
            return;
        };
        for item in items {
            self.deliver(self.transport.send_content(chat_id, item).await);
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        self.deliver(self.transport.send_text(chat_id, text).await);
    }

    fn deliver(&self, result: Result<(), TransportError>) {
        if let Err(e) = result {
            warn!(error = %e, "chat delivery failed");
        }
    }
}
