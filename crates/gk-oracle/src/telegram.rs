use std::time::Duration;

use gk_schemas::UserId;
use tracing::debug;

use crate::bot_api::{self, ChatMember};
use crate::{MembershipOracle, MembershipStatus, OracleError};

/// `getChatMember`-backed oracle.
///
/// The token is passed in by the caller and never logged; `Debug` redacts it.
#[derive(Clone)]
pub struct TelegramMembershipOracle {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramMembershipOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramMembershipOracle")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl TelegramMembershipOracle {
    /// `timeout` bounds every membership check end to end.
    pub fn new(token: String, base_url: String, timeout: Duration) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Config(e.without_url().to_string()))?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }
}

#[async_trait::async_trait]
impl MembershipOracle for TelegramMembershipOracle {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn check_status(
        &self,
        chat_id: i64,
        user: UserId,
    ) -> Result<MembershipStatus, OracleError> {
        let url = bot_api::method_url(&self.base_url, &self.token, "getChatMember");
        let chat = chat_id.to_string();
        let user_s = user.get().to_string();

        let resp = self
            .http
            .get(url)
            .query(&[("chat_id", chat.as_str()), ("user_id", user_s.as_str())])
            .send()
            .await
            .map_err(bot_api::transport_error)?;

        let member: ChatMember = bot_api::read_result(resp).await?;
        let status = MembershipStatus::from_bot_api(&member.status, member.is_member);
        debug!(chat_id, user_id = user.get(), raw = %member.status, status = status.as_str(), "getChatMember");
        Ok(status)
    }
}
