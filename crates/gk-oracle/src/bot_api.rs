//! Bot API wire shapes shared by the oracle and the chat transport.
//!
//! Every method answers with the same envelope:
//! `{"ok": true, "result": ...}` or
//! `{"ok": false, "error_code": 400, "description": "..."}`.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::OracleError;

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
}

/// `ChatMember` as returned by `getChatMember` (only the fields we read).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    #[serde(default)]
    pub is_member: Option<bool>,
}

/// Build `{base}/bot{token}/{method}`.
pub fn method_url(base: &str, token: &str, method: &str) -> String {
    format!("{}/bot{}/{}", base.trim_end_matches('/'), token, method)
}

/// Map a reqwest failure without leaking the tokenized URL.
pub fn transport_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Transport(e.without_url().to_string())
    }
}

/// Decode an envelope and unwrap its `result`.
pub async fn read_result<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, OracleError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let description = resp
            .json::<Envelope<serde_json::Value>>()
            .await
            .ok()
            .and_then(|e| e.description)
            .unwrap_or_else(|| status.to_string());
        return Err(OracleError::Unauthorized(description));
    }

    let body: Envelope<T> = resp.json().await.map_err(|e| {
        if e.is_timeout() {
            OracleError::Timeout
        } else if status.is_success() {
            OracleError::Decode(e.without_url().to_string())
        } else {
            OracleError::Api {
                code: Some(i64::from(status.as_u16())),
                description: "undecodable error body".to_string(),
            }
        }
    })?;

    if !body.ok || !status.is_success() {
        return Err(OracleError::Api {
            code: body.error_code.or(Some(i64::from(status.as_u16()))),
            description: body.description.unwrap_or_else(|| "unknown".to_string()),
        });
    }

    body.result
        .ok_or_else(|| OracleError::Decode("ok response without result".to_string()))
}
