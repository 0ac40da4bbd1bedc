//! Boot recovery: corruption means "start over", never a crash.
//!
//! GREEN when:
//! - no file → Fresh
//! - garbage / truncated / wrong-typed JSON → Reset with a Malformed reason
//! - a legacy unversioned file → Restored, migrated, sized to the roster
//! - a current file for a larger roster → Restored, truncated

use std::fs;

use gk_schemas::{UserId, STATE_SCHEMA_VERSION};
use gk_store::{recover, JsonFileStateStore, RecoveryOrigin, StoreError};

fn store_with(contents: Option<&str>) -> (tempfile::TempDir, JsonFileStateStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bot_state.json");
    if let Some(c) = contents {
        fs::write(&path, c).unwrap();
    }
    (dir, JsonFileStateStore::new(path))
}

#[test]
fn absent_file_starts_fresh() {
    let (_dir, store) = store_with(None);
    let rec = recover(&store, 3);
    assert_eq!(rec.origin, RecoveryOrigin::Fresh);
    assert_eq!(rec.state.channel_count(), 3);
    assert_eq!(rec.state.active_index, 0);
}

#[test]
fn corrupt_files_reset_to_default() {
    for garbage in [
        "",
        "{not json",
        r#"{"active_index": 1, "channels": [{"pending": [1, 2"#,
        r#"{"active_index": "one", "channels": []}"#,
        r#"{"active_index": 0, "channels": {"pending": []}}"#,
        "42",
    ] {
        let (_dir, store) = store_with(Some(garbage));
        let rec = recover(&store, 2);
        assert!(
            matches!(rec.origin, RecoveryOrigin::Reset { reason: StoreError::Malformed(_) }),
            "input {garbage:?} gave {:?}",
            rec.origin
        );
        assert_eq!(rec.state.channel_count(), 2);
        assert_eq!(rec.state.active_index, 0);
        assert!(rec.state.channels.iter().all(|c| c.pending.is_empty()));
    }
}

#[test]
fn legacy_file_is_migrated_and_padded() {
    let legacy = r#"{
      "active_index": 1,
      "channels": [
        {"pending": [11], "counted": [12]},
        {"pending": [], "counted": []}
      ]
    }"#;
    let (_dir, store) = store_with(Some(legacy));
    let rec = recover(&store, 3);

    let RecoveryOrigin::Restored { report } = rec.origin else {
        panic!("expected Restored, got {:?}", rec.origin);
    };
    assert!(report.migrated());
    assert_eq!(report.channels_padded, 1);
    assert_eq!(rec.state.schema_version, STATE_SCHEMA_VERSION);
    assert_eq!(rec.state.active_index, 1);
    assert_eq!(rec.state.channels[0].join_count, 1);
    assert!(rec.state.channels[0].pending.contains(&UserId(11)));
    assert!(rec.state.is_consistent());
}

#[test]
fn roster_shrink_truncates_and_resets_active_index() {
    let current = r#"{
      "schema_version": 1,
      "active_index": 3,
      "channels": [{}, {}, {}, {"counted": [1], "join_count": 1}]
    }"#;
    let (_dir, store) = store_with(Some(current));
    let rec = recover(&store, 2);

    let RecoveryOrigin::Restored { report } = rec.origin else {
        panic!("expected Restored");
    };
    assert_eq!(report.channels_truncated, 2);
    assert!(report.active_index_reset);
    assert_eq!(rec.state.active_index, 0);
    assert_eq!(rec.state.channel_count(), 2);
}
