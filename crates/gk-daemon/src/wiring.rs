//! Config → gate construction.

use std::num::NonZeroU32;

use anyhow::{Context, Result};
use gk_config::{ContentRef, GateConfig};
use gk_gate::{Channel, ChannelRoster};

/// Roster in config order.
pub fn roster_from_config(cfg: &GateConfig) -> Result<ChannelRoster> {
    let channels = cfg
        .channels
        .iter()
        .map(|c| Channel::new(c.chat_id, c.invite.clone()))
        .collect();
    ChannelRoster::new(channels).context("CONFIG_INVALID: gate.channels")
}

pub fn required_joins(cfg: &GateConfig) -> Result<NonZeroU32> {
    NonZeroU32::new(cfg.required_joins).context("CONFIG_INVALID: gate.required_joins must be >= 1")
}

/// Per-channel content, aligned with [`roster_from_config`].
pub fn content_from_config(cfg: &GateConfig) -> Vec<Vec<ContentRef>> {
    cfg.channels.iter().map(|c| c.content.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
gate:
  required_joins: 2
  channels:
    - chat_id: -1001
      invite: "https://t.me/+a"
      content:
        - { kind: document, file_id: "DOC-A" }
    - chat_id: -1002
      invite: "https://t.me/+b"
"#;

    #[test]
    fn config_maps_to_roster_and_content() {
        let cfg = gk_config::load_layered_yaml_from_strings(&[YAML])
            .unwrap()
            .gate()
            .unwrap();
        let roster = roster_from_config(&cfg).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get(roster.resolve(1).unwrap()).chat_id, -1002);
        assert_eq!(required_joins(&cfg).unwrap().get(), 2);

        let content = content_from_config(&cfg);
        assert_eq!(content[0][0].file_id, "DOC-A");
        assert!(content[1].is_empty());
    }
}
