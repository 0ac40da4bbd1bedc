//! Typed gate settings read from the merged config JSON.
//!
//! ```yaml
//! gate:
//!   required_joins: 2
//!   channels:
//!     - chat_id: -1002866596290
//!       invite: "https://t.me/+vkaa61Ruo5Q5Yjk1"
//!       content:
//!         - { kind: document, file_id: "BQACAgIAAx..." }
//!         - { kind: video,    file_id: "BAACAgIAAx..." }
//! state:
//!   path: "gk_state.json"
//! telegram:
//!   api_base: "https://api.telegram.org"
//!   token_env: "GK_BOT_TOKEN"
//!   oracle_timeout_ms: 5000
//!   poll_timeout_secs: 30
//! http:
//!   addr: "0.0.0.0:5000"
//! ```
//!
//! Everything except `gate` has a default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_STATE_PATH: &str = "gk_state.json";
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_TOKEN_ENV: &str = "GK_BOT_TOKEN";
pub const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:5000";

/// How a piece of channel content is sent back to a verified user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Document,
    Video,
}

/// Already-uploaded content, referenced by platform file id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub file_id: String,
}

/// One gated channel, in rotation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub chat_id: i64,
    pub invite: String,
    #[serde(default)]
    pub content: Vec<ContentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub api_base: String,
    /// NAME of the env var holding the bot token.
    pub token_env: String,
    pub oracle_timeout: Duration,
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub required_joins: u32,
    pub channels: Vec<ChannelSpec>,
    pub state_path: PathBuf,
    pub telegram: TelegramSettings,
    pub http_addr: SocketAddr,
}

// Raw serde shapes; defaults applied here, validation in `from_config_json`.

#[derive(Deserialize)]
struct RawRoot {
    gate: Option<RawGate>,
    #[serde(default)]
    state: RawState,
    #[serde(default)]
    telegram: RawTelegram,
    #[serde(default)]
    http: RawHttp,
}

#[derive(Deserialize)]
struct RawGate {
    required_joins: Option<i64>,
    #[serde(default)]
    channels: Vec<ChannelSpec>,
}

#[derive(Deserialize, Default)]
struct RawState {
    path: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawTelegram {
    api_base: Option<String>,
    token_env: Option<String>,
    oracle_timeout_ms: Option<u64>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct RawHttp {
    addr: Option<String>,
}

impl GateConfig {
    /// Parse and validate. Error messages carry a stable `CONFIG_INVALID` tag.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let raw: RawRoot = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the gate settings layout")?;

        let Some(gate) = raw.gate else {
            bail!("CONFIG_INVALID: missing required section 'gate'");
        };

        let required_joins = match gate.required_joins {
            Some(n) if n >= 1 && n <= i64::from(u32::MAX) => n as u32,
            Some(n) => bail!("CONFIG_INVALID: gate.required_joins must be >= 1 (got {n})"),
            None => bail!("CONFIG_INVALID: gate.required_joins is required"),
        };

        if gate.channels.is_empty() {
            bail!("CONFIG_INVALID: gate.channels must list at least one channel");
        }
        for (i, ch) in gate.channels.iter().enumerate() {
            if ch.invite.trim().is_empty() {
                bail!("CONFIG_INVALID: gate.channels[{i}].invite is empty");
            }
            if let Some(j) = gate.channels[..i].iter().position(|o| o.chat_id == ch.chat_id) {
                bail!(
                    "CONFIG_INVALID: gate.channels[{i}].chat_id duplicates gate.channels[{j}] ({})",
                    ch.chat_id
                );
            }
            if ch.content.iter().any(|c| c.file_id.trim().is_empty()) {
                bail!("CONFIG_INVALID: gate.channels[{i}].content has an empty file_id");
            }
        }

        let addr_raw = raw.http.addr.unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr: SocketAddr = addr_raw
            .parse()
            .with_context(|| format!("CONFIG_INVALID: http.addr '{addr_raw}' is not host:port"))?;

        Ok(Self {
            required_joins,
            channels: gate.channels,
            state_path: PathBuf::from(
                raw.state
                    .path
                    .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string()),
            ),
            telegram: TelegramSettings {
                api_base: raw
                    .telegram
                    .api_base
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                token_env: raw
                    .telegram
                    .token_env
                    .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string()),
                oracle_timeout: Duration::from_millis(
                    raw.telegram
                        .oracle_timeout_ms
                        .unwrap_or(DEFAULT_ORACLE_TIMEOUT_MS),
                ),
                poll_timeout_secs: raw
                    .telegram
                    .poll_timeout_secs
                    .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            },
            http_addr,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
