use gk_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy};

/// scenario_unused_keys_warn_or_fail
///
/// Validates:
/// 1) Unused keys are detected in WARN mode but do not error.
/// 2) Unused keys cause failure in FAIL mode.
/// 3) Keys under consumed prefixes are not flagged.
/// 4) OFFLINE consumes less than SERVE.

const FULL_YAML: &str = r#"
gate:
  required_joins: 1
  channels:
    - chat_id: -1001
      invite: "https://t.me/+one"
      content:
        - { kind: document, file_id: "doc-1" }
state:
  path: "state.json"
telegram:
  api_base: "https://api.telegram.org"
  token_env: "GK_BOT_TOKEN"
  oracle_timeout_ms: 2500
  poll_timeout_secs: 20
http:
  addr: "127.0.0.1:5000"
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = format!("{FULL_YAML}\nunused_section:\n  foo: 123\n  bar: 456\n");
    let loaded = load_layered_yaml_from_strings(&[&yaml]).expect("config load must succeed");

    let report = report_unused_keys(ConfigMode::Serve, &loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/unused_section/bar".to_string(),
            "/unused_section/foo".to_string()
        ]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = format!("{FULL_YAML}\nlegacy:\n  required_joins: 3\n");
    let loaded = load_layered_yaml_from_strings(&[&yaml]).unwrap();

    let result = report_unused_keys(ConfigMode::Serve, &loaded.config_json, UnusedKeyPolicy::Fail);
    let msg = format!("{:?}", result.expect_err("fail policy must error"));
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("/legacy/required_joins"), "{msg}");
}

#[test]
fn full_config_is_clean_in_serve_mode() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let report =
        report_unused_keys(ConfigMode::Serve, &loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean(), "{:?}", report.unused_leaf_pointers);
}

#[test]
fn offline_mode_flags_transport_keys() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let report =
        report_unused_keys(ConfigMode::Offline, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();

    assert!(report
        .unused_leaf_pointers
        .contains(&"/telegram/token_env".to_string()));
    assert!(report
        .unused_leaf_pointers
        .contains(&"/http/addr".to_string()));
    assert!(!report
        .unused_leaf_pointers
        .iter()
        .any(|p| p.starts_with("/gate")));
}
