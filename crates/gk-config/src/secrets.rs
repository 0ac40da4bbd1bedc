//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only the env var NAME (`telegram.token_env`).
//! - Binaries call [`resolve_secrets`] once at startup and pass the result
//!   into constructors; nothing else reads `std::env` for secrets.
//! - `Debug` output is redacted; errors name the variable, never the value.
//!
//! `SERVE` requires the bot token. `OFFLINE` resolves it if present.

use anyhow::{bail, Result};

use crate::{ConfigMode, GateConfig};

/// Secrets resolved from the environment. **Redacted in `Debug` output.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Bot API token. `None` if the named env var was absent or blank.
    pub bot_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ResolvedSecrets {
    /// Token for `SERVE` callers, which already passed enforcement.
    pub fn require_bot_token(&self) -> Result<&str> {
        match self.bot_token.as_deref() {
            Some(t) => Ok(t),
            None => bail!("SECRETS_MISSING: bot token was not resolved"),
        }
    }
}

/// Returns `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve secrets for `mode`.
///
/// # Errors
/// `SECRETS_MISSING` naming the env var when `mode` is `Serve` and the token
/// is absent.
pub fn resolve_secrets(cfg: &GateConfig, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let var = cfg.telegram.token_env.trim();
    let bot_token = resolve_env(var);

    if mode == ConfigMode::Serve && bot_token.is_none() {
        bail!(
            "SECRETS_MISSING mode={}: required env var '{}' (bot token) is not set or empty",
            mode.as_str(),
            var,
        );
    }

    Ok(ResolvedSecrets { bot_token })
}
