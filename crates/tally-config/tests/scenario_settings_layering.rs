//! Scenario: Settings layering
//!
//! # Invariants under test
//!
//! 1. No YAML and no environment yields the documented defaults.
//! 2. YAML overrides defaults; `TALLY_*` variables override YAML.
//! 3. Intervals below one second are raised to one second.
//! 4. Unknown keys, a bad YAML interval and a Postgres backend without a URL
//!    are rejected at load time.
//! 5. A bad `TALLY_SYNC_INTERVAL` is ignored and the configured interval kept.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tally_config::{load, load_from_strings, Backend, Settings, MIN_SYNC_INTERVAL};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |k| map.get(k).cloned()
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn defaults_without_any_layer() {
    let loaded = load_from_strings(&[], env(&[])).unwrap();
    let s = loaded.settings;
    assert_eq!(s, Settings::default());
    assert_eq!(s.server.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    assert_eq!(s.reconcile.interval, Duration::from_secs(1));
    assert_eq!(s.reconcile.key, "TALLY_COUNTER");
    assert_eq!(s.limits.max_increment, 500);
    assert_eq!(s.store.backend, Backend::Memory);
    assert_eq!(s.store.file_path, PathBuf::from("tally.txt"));
    assert!(s.store.database_url.is_none());
}

// ---------------------------------------------------------------------------
// Precedence
// ---------------------------------------------------------------------------

const YAML: &str = r#"
server:
  addr: "0.0.0.0:9000"
reconcile:
  interval: "3s"
  key: "clicks"
limits:
  max_increment: 50
store:
  backend: file
  file_path: "/tmp/clicks.txt"
"#;

#[test]
fn yaml_overrides_defaults() {
    let s = load_from_strings(&[YAML], env(&[])).unwrap().settings;
    assert_eq!(s.server.addr.port(), 9000);
    assert_eq!(s.reconcile.interval, Duration::from_secs(3));
    assert_eq!(s.reconcile.key, "clicks");
    assert_eq!(s.limits.max_increment, 50);
    assert_eq!(s.store.backend, Backend::File);
    assert_eq!(s.store.file_path, PathBuf::from("/tmp/clicks.txt"));
}

#[test]
fn environment_overrides_yaml() {
    let s = load_from_strings(
        &[YAML],
        env(&[
            ("TALLY_ADDR", "127.0.0.1:7000"),
            ("TALLY_SYNC_INTERVAL", "2m"),
            ("TALLY_COUNTER_KEY", "other"),
            ("TALLY_MAX_INCREMENT", "7"),
            ("TALLY_STORE", "memory"),
            ("TALLY_COUNTER_FILE", "/tmp/other.txt"),
        ]),
    )
    .unwrap()
    .settings;

    assert_eq!(s.server.addr.port(), 7000);
    assert_eq!(s.reconcile.interval, Duration::from_secs(120));
    assert_eq!(s.reconcile.key, "other");
    assert_eq!(s.limits.max_increment, 7);
    assert_eq!(s.store.backend, Backend::Memory);
    assert_eq!(s.store.file_path, PathBuf::from("/tmp/other.txt"));
}

#[test]
fn files_load_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let local = dir.path().join("local.yaml");
    std::fs::write(&base, YAML).unwrap();
    std::fs::write(&local, "limits:\n  max_increment: 1\n").unwrap();

    let paths = [base.to_str().unwrap(), local.to_str().unwrap()];
    let loaded = load(&paths, env(&[])).unwrap();
    assert_eq!(loaded.settings.limits.max_increment, 1);
    assert_eq!(loaded.settings.reconcile.key, "clicks");
    assert_eq!(loaded.config_hash.len(), 64);
}

// ---------------------------------------------------------------------------
// Interval handling
// ---------------------------------------------------------------------------

#[test]
fn short_interval_is_raised_to_floor() {
    let s = load_from_strings(&["reconcile:\n  interval: 10ms\n"], env(&[]))
        .unwrap()
        .settings;
    assert_eq!(s.reconcile.interval, MIN_SYNC_INTERVAL);

    let s = load_from_strings(&[], env(&[("TALLY_SYNC_INTERVAL", "0")]))
        .unwrap()
        .settings;
    assert_eq!(s.reconcile.interval, MIN_SYNC_INTERVAL);
}

#[test]
fn bare_number_interval_is_milliseconds() {
    let s = load_from_strings(&["reconcile:\n  interval: 2500\n"], env(&[]))
        .unwrap()
        .settings;
    assert_eq!(s.reconcile.interval, Duration::from_millis(2500));
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn unknown_key_is_rejected() {
    let err = load_from_strings(&["reconcile:\n  intervall: 1s\n"], env(&[])).unwrap_err();
    assert!(format!("{err:#}").contains("intervall"), "got: {err:#}");
}

#[test]
fn bad_interval_is_rejected() {
    assert!(load_from_strings(&["reconcile:\n  interval: 1h\n"], env(&[])).is_err());
}

#[test]
fn bad_env_interval_keeps_configured_interval() {
    let s = load_from_strings(&[], env(&[("TALLY_SYNC_INTERVAL", "65536")]))
        .unwrap()
        .settings;
    assert_eq!(s.reconcile.interval, Duration::from_secs(1));

    let s = load_from_strings(
        &["reconcile:\n  interval: 4s\n"],
        env(&[("TALLY_SYNC_INTERVAL", "soon")]),
    )
    .unwrap()
    .settings;
    assert_eq!(s.reconcile.interval, Duration::from_secs(4));
}

#[test]
fn bad_env_values_are_rejected() {
    assert!(load_from_strings(&[], env(&[("TALLY_ADDR", "nope")])).is_err());
    assert!(load_from_strings(&[], env(&[("TALLY_MAX_INCREMENT", "-1")])).is_err());
    assert!(load_from_strings(&[], env(&[("TALLY_STORE", "redis")])).is_err());
    assert!(load_from_strings(&[], env(&[("TALLY_COUNTER_KEY", "  ")])).is_err());
}

#[test]
fn postgres_backend_requires_database_url() {
    let err = load_from_strings(&["store:\n  backend: postgres\n"], env(&[])).unwrap_err();
    assert!(err.to_string().contains("TALLY_DATABASE_URL"), "got: {err}");
}
