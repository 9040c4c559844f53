//! Integration test: document-level validation properties.
//!
//! Exercises `Parser::validate` against the shipped bundle with hand-built
//! documents: required keys, contact sub-fields, vocabulary pairs,
//! repeatability, unknown keys, confidence bounds and evidence hashes.

use std::path::PathBuf;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};
use xarf_parser::{Parser, ParserOptions};
use xarf_schema::SchemaRegistry;

/// Find the repository root.
fn repo_root() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates/
    dir.pop(); // repo root
    dir
}

fn registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::load(Some(&repo_root().join("schemas"))))
}

fn parser() -> Parser {
    Parser::new(registry(), ParserOptions::default())
}

fn spam() -> Value {
    json!({
        "xarf_version": "4.0.0",
        "report_id": "0f3a9d52-61b4-4f0e-8a57-2c9d1e7b4a33",
        "timestamp": "2024-01-15T14:30:25Z",
        "reporter": {"org": "Acme Abuse Desk", "contact": "abuse@acme.example", "domain": "acme.example"},
        "sender": {"org": "Acme Abuse Desk", "contact": "abuse@acme.example", "domain": "acme.example"},
        "source_identifier": "192.0.2.45",
        "category": "messaging",
        "type": "spam",
        "evidence_source": "spamtrap",
        "protocol": "smtp",
        "smtp_from": "bulk@spam.example"
    })
}

fn without(mut doc: Value, key: &str) -> Value {
    if let Some(map) = doc.as_object_mut() {
        map.remove(key);
    }
    doc
}

#[test]
fn baseline_document_is_clean() {
    let result = parser().validate(&spam(), false, false);
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn each_missing_required_key_is_named() {
    let mut p = parser();
    for key in [
        "xarf_version",
        "report_id",
        "timestamp",
        "reporter",
        "sender",
        "source_identifier",
        "category",
        "type",
    ] {
        let result = p.validate(without(spam(), key), false, false);
        assert!(!result.valid, "{key} removed but still valid");
        assert!(
            result.errors.iter().any(|e| e.field == key),
            "no error on {key}: {:?}",
            result.errors
        );
    }
}

#[test]
fn sender_and_its_fields_are_mandatory() {
    let mut p = parser();
    let result = p.validate(without(spam(), "sender"), false, false);
    assert!(!result.valid);
    assert!(result.errors.iter().any(|e| e.field.contains("sender")));

    for field in ["org", "contact", "domain"] {
        let mut doc = spam();
        doc["sender"].as_object_mut().unwrap().remove(field);
        let result = p.validate(&doc, false, false);
        assert!(!result.valid, "sender.{field} removed but still valid");
        assert!(
            result.errors.iter().any(|e| e.field == format!("sender.{field}")),
            "{:?}",
            result.errors
        );
    }
}

#[test]
fn unregistered_pair_is_a_type_error() {
    let r = registry();
    assert!(!r.is_valid_type("messaging", "ddos"));

    let mut doc = spam();
    doc["type"] = json!("ddos");
    let result = Parser::new(r, ParserOptions::default()).validate(&doc, false, false);
    assert!(!result.valid);
    assert!(result.errors.iter().any(|e| e.field == "type"));
}

#[test]
fn repeated_validation_does_not_leak_state() {
    let mut p = parser();
    let first = p.validate(&spam(), false, false);

    let mut broken = spam();
    broken["confidence"] = json!(7);
    broken["x_unrelated"] = json!(true);
    assert!(!p.validate(&broken, true, true).valid);

    let second = p.validate(&spam(), false, false);
    assert_eq!(first, second);
    assert!(second.valid);
    assert!(second.errors.is_empty());
    assert!(p.warnings().is_empty());
}

#[test]
fn confidence_edges_are_accepted() {
    let mut p = parser();
    for c in [0.0, 1.0] {
        let mut doc = spam();
        doc["confidence"] = json!(c);
        let result = p.validate(&doc, false, false);
        assert!(result.valid, "confidence {c}: {:?}", result.errors);
    }
}

#[test]
fn whitespace_contact_field_is_accepted_by_validate_and_parse() {
    let mut doc = spam();
    doc["reporter"]["org"] = json!("   ");

    let result = parser().validate(&doc, true, false);
    assert!(result.valid, "{:?}", result.errors);

    let mut strict = Parser::new(registry(), ParserOptions::strict());
    let report = strict.parse(&doc).unwrap();
    assert_eq!(report.base().reporter.org, "   ");
}

#[test]
fn malformed_evidence_hash_is_rejected() {
    let mut p = parser();
    for hash in ["sha256:not-hex", "crc32:deadbeef", "deadbeef", "sha256:"] {
        let mut doc = spam();
        doc["evidence"] = json!([{
            "content_type": "message/rfc822",
            "payload": "UmVjZWl2ZWQ6IGZyb20gbWFpbA==",
            "hash": hash
        }]);
        let result = p.validate(&doc, false, false);
        assert!(!result.valid, "hash {hash} accepted");
        assert!(
            result.errors.iter().any(|e| e.field == "evidence.0.hash"),
            "{:?}",
            result.errors
        );
    }

    let mut doc = spam();
    doc["evidence"] = json!([{
        "content_type": "message/rfc822",
        "payload": "UmVjZWl2ZWQ6IGZyb20gbWFpbA==",
        "hash": "md5:d41d8cd98f00b204e9800998ecf8427e"
    }]);
    assert!(p.validate(&doc, false, false).valid);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn one_unknown_key_one_warning(suffix in "[a-z]{1,12}", value in any::<i64>()) {
        let key = format!("x_{suffix}");
        let mut doc = spam();
        doc[key.as_str()] = json!(value);
        let mut p = parser();

        let lenient = p.validate(&doc, false, false);
        prop_assert!(lenient.valid, "{:?}", lenient.errors);
        prop_assert_eq!(lenient.warnings.len(), 1);
        prop_assert_eq!(&lenient.warnings[0].field, &key);

        let strict = p.validate(&doc, true, false);
        prop_assert!(!strict.valid);
        prop_assert!(strict.errors.iter().any(|e| e.field == key));
    }

    #[test]
    fn confidence_outside_unit_interval_is_an_error(
        c in prop_oneof![-1.0e6..-1.0e-6f64, 1.000_001..1.0e6f64]
    ) {
        let mut doc = spam();
        doc["confidence"] = json!(c);
        let result = parser().validate(&doc, false, false);
        prop_assert!(!result.valid);
        prop_assert!(result.errors.iter().any(|e| e.field == "confidence"));
    }
}
