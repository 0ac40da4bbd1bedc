//! gk-config
//!
//! Layered YAML configuration for the gatekeeper.
//!
//! - Documents are merged in order (later layers override earlier ones),
//!   converted to JSON, canonicalized and hashed.
//! - Literal credentials in config are refused; YAML stores env var NAMES only
//!   (see [`secrets`]).
//! - [`settings::GateConfig`] is the typed view the rest of the workspace reads.
//! - [`report_unused_keys`] flags leaves no code path consumes.

pub mod secrets;
pub mod settings;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

pub use settings::{ChannelSpec, ContentKind, ContentRef, GateConfig, TelegramSettings};

/// Known secret-like prefixes. A leaf string starting with one of these
/// aborts loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // Stripe / OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
];

// ---------------------------------------------------------------------------
// Modes + consumed-key registry
// ---------------------------------------------------------------------------

/// Which process is reading the config.
///
/// `Serve` is the daemon (talks to the chat platform, needs the bot token).
/// `Offline` is operator tooling that only touches the state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Serve,
    Offline,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Serve => "SERVE",
            ConfigMode::Offline => "OFFLINE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes actually read in each mode.
///
/// Must track `settings::GateConfig::from_config_json` and the secrets
/// resolver. Do not list sections that no code reads.
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Serve => &[
            "/gate/required_joins",
            "/gate/channels",
            "/state/path",
            "/telegram/api_base",
            "/telegram/token_env",
            "/telegram/oracle_timeout_ms",
            "/telegram/poll_timeout_secs",
            "/http/addr",
        ],
        ConfigMode::Offline => &["/gate/required_joins", "/gate/channels", "/state/path"],
    }
}

/// Check every leaf of `config_json` against the keys `mode` reads.
///
/// `Warn` always returns the report; `Fail` turns a dirty report into
/// CONFIG_UNUSED_KEYS.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers_for_mode(mode)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();

    let mut unused = BTreeSet::new();
    walk_leaves(config_json, &mut String::new(), &mut |ptr, _| {
        if !consumed.iter().any(|c| is_prefix_pointer(c, ptr)) {
            unused.insert(ptr.to_string());
        }
    });

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_prefixes: consumed.into_iter().collect(),
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&str> = report
            .unused_leaf_pointers
            .iter()
            .take(12)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} key(s) not read by any code path: {}",
            report.mode,
            report.unused_leaf_pointers.len(),
            shown.join(", ")
        );
    }

    Ok(report)
}

/// Leading slash, no trailing slash; empty means the root.
fn normalize_pointer(raw: &str) -> String {
    let body = raw.trim().trim_matches('/');
    format!("/{body}")
}

/// "/a/b" covers "/a/b" and "/a/b/c" but NOT "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match leaf.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Depth-first visit of every scalar, with its JSON pointer.
/// `path` is scratch space restored on return.
fn walk_leaves(v: &Value, path: &mut String, visit: &mut dyn FnMut(&str, &Value)) {
    let mark = path.len();
    match v {
        Value::Object(map) => {
            for (key, child) in map {
                path.push('/');
                path.push_str(&key.replace('~', "~0").replace('/', "~1"));
                walk_leaves(child, path, visit);
                path.truncate(mark);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push('/');
                path.push_str(&i.to_string());
                walk_leaves(child, path, visit);
                path.truncate(mark);
            }
        }
        leaf if path.is_empty() => visit("/", leaf),
        leaf => visit(path, leaf),
    }
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed gate settings from the merged document.
    pub fn gate(&self) -> Result<GateConfig> {
        GateConfig::from_config_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("CONFIG_READ: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Merge YAML documents in order; later layers win key by key.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (layer, raw) in yaml_docs.iter().enumerate() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("CONFIG_YAML: layer {layer}"))?;
        let doc = serde_json::to_value(doc)
            .with_context(|| format!("CONFIG_YAML: layer {layer} is not JSON-compatible"))?;
        overlay(&mut merged, doc);
    }

    reject_secret_literals(&merged)?;

    let canonical_json =
        serde_json::to_string(&canonical(&merged)).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge recursively; anything else in `top` replaces `base`.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(base_map), Value::Object(top_map)) => {
            for (key, top_val) in top_map {
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, top_val),
                    None => {
                        base_map.insert(key, top_val);
                    }
                }
            }
        }
        (slot, top) => *slot = top,
    }
}

/// Rebuild with keys in byte order so layer key order never moves the hash.
fn canonical(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, child)| (k, canonical(child))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        scalar => scalar.clone(),
    }
}

fn reject_secret_literals(v: &Value) -> Result<()> {
    let mut hit: Option<String> = None;
    walk_leaves(v, &mut String::new(), &mut |ptr, leaf| {
        if hit.is_none() && leaf.as_str().is_some_and(looks_like_secret) {
            hit = Some(ptr.to_string());
        }
    });
    match hit {
        Some(ptr) => bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED"),
        None => Ok(()),
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && (SECRET_PREFIXES.iter().any(|p| t.starts_with(p)) || looks_like_bot_token(t))
}

/// Bot API tokens: `<numeric bot id>:<35-char secret>`.
fn looks_like_bot_token(t: &str) -> bool {
    let Some((id, secret)) = t.split_once(':') else {
        return false;
    };
    id.len() >= 6
        && id.bytes().all(|b| b.is_ascii_digit())
        && secret.len() >= 30
        && secret
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_token_shape_is_detected() {
        assert!(looks_like_secret("123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw"));
        assert!(!looks_like_secret("GK_BOT_TOKEN"));
        assert!(!looks_like_secret("https://t.me/+vkaa61Ruo5Q5Yjk1"));
        assert!(!looks_like_secret("12:34"));
    }

    #[test]
    fn prefix_pointer_respects_segment_boundary() {
        assert!(is_prefix_pointer("/gate/channels", "/gate/channels/0/chat_id"));
        assert!(is_prefix_pointer("/state/path", "/state/path"));
        assert!(!is_prefix_pointer("/state/path", "/state/pathway"));
        assert!(is_prefix_pointer("/", "/anything"));
    }
}
