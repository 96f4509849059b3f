//! Policy resolution and `spanline.toml` loading

use std::sync::Arc;

use crate::common::*;
use spanline::{
    Database, DeleteOptions, EngineConfig, Error, PolicyOverrides, PreviousOnDelete, SpanKind,
    SpanStore, CONFIG_FILE_NAME,
};

fn store_from_dir(dir: &std::path::Path) -> SpanStore {
    init_tracing();
    SpanStore::new(Arc::new(Database::from_config_dir(dir).unwrap()))
}

#[test]
fn test_config_dir_gets_default_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_from_dir(dir.path());

    let path = dir.path().join(CONFIG_FILE_NAME);
    assert!(path.exists());
    assert_eq!(store.database().config(), EngineConfig::default());
}

#[test]
fn test_kind_policy_from_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"
[policy.default]
soft_delete = false

[policy.kinds.rental]
allow_segment_gaps = false
previous_on_delete = "relink"
"#,
    )
    .unwrap();
    let store = store_from_dir(dir.path());

    let rental = store
        .create_span(SpanKind::new("rental"), range(0, 10), PolicyOverrides::none())
        .unwrap();
    assert!(!rental.policy.allow_segment_gaps);
    assert!(!rental.policy.soft_delete);
    assert_eq!(rental.policy.previous_on_delete, PreviousOnDelete::Relink);

    let other = store
        .create_span(SpanKind::new("lease"), range(0, 10), PolicyOverrides::none())
        .unwrap();
    assert!(other.policy.allow_segment_gaps);
    assert_eq!(other.policy.previous_on_delete, PreviousOnDelete::Cascade);
}

#[test]
fn test_instance_overrides_beat_kind_policy() {
    let mut config = EngineConfig::default();
    config.policy.register(
        SpanKind::new("rental"),
        PolicyOverrides::none().allow_segment_gaps(false),
    );
    let store = store_with(config);

    let span = store
        .create_span(
            SpanKind::new("rental"),
            range(0, 10),
            PolicyOverrides::none().allow_segment_gaps(true),
        )
        .unwrap();
    assert!(span.policy.allow_segment_gaps);
}

#[test]
fn test_policy_is_frozen_at_creation() {
    let store = store();
    let (span, segs) = span_with(&store, (0, 100), PolicyOverrides::none(), &[(0, 10), (10, 20)]);

    store
        .database()
        .update_config(|c| {
            c.policy.default = PolicyOverrides::none().previous_on_delete(PreviousOnDelete::Relink)
        })
        .unwrap();

    let deleted = store
        .delete_segment(segs[0].id, DeleteOptions::new())
        .unwrap();
    assert_eq!(deleted.len(), 2);
    assert!(active_ranges(&store, span).is_empty());
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "lock_timeout_ms = 0\n").unwrap();
    let err = Database::from_config_dir(dir.path()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "no_such_key = 1\n").unwrap();
    assert!(Database::from_config_dir(dir.path()).is_err());
}

#[test]
fn test_empty_ranges_follow_config() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), PolicyOverrides::none(), &[]);
    assert!(store.create_segment(span, range(5, 5)).is_err());

    let store = store_with(EngineConfig {
        allow_empty_ranges: true,
        ..EngineConfig::default()
    });
    let (span, _) = span_with(&store, (0, 100), PolicyOverrides::none(), &[]);
    let empty = store.create_segment(span, range(5, 5)).unwrap();
    assert!(empty.range.is_empty());

    // a zero-width segment shares no points, even inside another segment
    store.create_segment(span, range(0, 40)).unwrap();
    store.create_segment(span, range(20, 20)).unwrap();
    assert_eq!(active_ranges(&store, span), vec![(0, 40), (5, 5), (20, 20)]);
    let err = store.create_segment(span, range(30, 50)).unwrap_err();
    assert!(matches!(err, Error::Overlap { .. }));
    store.verify_chain(span).unwrap();
}

#[test]
fn test_overrides_from_option_map() {
    let overrides = PolicyOverrides::from_map(serde_json::json!({
        "allow_span_gaps": false,
        "allow_segment_gaps": false,
        "previous_on_delete": "relink",
    }))
    .unwrap();
    let store = store();
    let span = store.create_span(kind(), range(0, 10), overrides).unwrap();
    assert!(!span.policy.allow_span_gaps && !span.policy.allow_segment_gaps);
    assert_eq!(active_ranges(&store, span.id), vec![(0, 10)]);

    let err = PolicyOverrides::from_map(serde_json::json!({ "allow_gaps": true })).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}
