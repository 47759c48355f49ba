//! Scenario: Config hash is stable
//!
//! # Invariants under test
//!
//! 1. The same layers hash identically across calls.
//! 2. Key order inside a document does not change the hash.
//! 3. A changed value changes the hash.
//! 4. Later layers override earlier ones leaf by leaf.

use tally_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
server:
  addr: "0.0.0.0:8080"
reconcile:
  interval: "2s"
  key: "TALLY_COUNTER"
store:
  backend: "file"
  file_path: "/var/lib/tally/count.txt"
"#;

const BASE_YAML_REORDERED: &str = r#"
store:
  file_path: "/var/lib/tally/count.txt"
  backend: "file"
reconcile:
  key: "TALLY_COUNTER"
  interval: "2s"
server:
  addr: "0.0.0.0:8080"
"#;

const OVERLAY_YAML: &str = r#"
reconcile:
  interval: "5s"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex");
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_replaces_leaf_and_keeps_siblings() {
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let json = &merged.config_json;
    assert_eq!(
        json.pointer("/reconcile/interval").and_then(|v| v.as_str()),
        Some("5s")
    );
    assert_eq!(
        json.pointer("/reconcile/key").and_then(|v| v.as_str()),
        Some("TALLY_COUNTER")
    );
    assert_eq!(
        json.pointer("/store/backend").and_then(|v| v.as_str()),
        Some("file")
    );
}

#[test]
fn no_layers_is_an_empty_object() {
    let empty = load_layered_yaml_from_strings(&[]).unwrap();
    assert_eq!(empty.canonical_json, "{}");

    let blank_doc = load_layered_yaml_from_strings(&[""]).unwrap();
    assert_eq!(blank_doc.config_hash, empty.config_hash);
}
