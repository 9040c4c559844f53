//! Integration test: v3 documents are detected, converted once, and come
//! out as v4 reports the parser accepts.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use xarf_core::Report;
use xarf_parser::{convert_legacy, deprecation_notices, is_legacy, Parser, ParserOptions};
use xarf_schema::SchemaRegistry;

/// Find the repository root.
fn repo_root() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates/
    dir.pop(); // repo root
    dir
}

fn v3_spam() -> Value {
    json!({
        "Version": "3.0.0",
        "ReporterInfo": {"ReporterOrg": "Acme", "ReporterOrgEmail": "abuse@acme.example"},
        "Report": {
            "ReportClass": "Messaging",
            "ReportType": "spam",
            "Date": "2024-01-15T14:30:25Z",
            "Source": {"IP": "192.168.1.100"},
            "AdditionalInfo": {
                "Protocol": "smtp",
                "SMTPFrom": "spammer@example.com",
                "Subject": "Test Spam",
                "DetectionMethod": "spamtrap"
            }
        }
    })
}

#[test]
fn detection_keys_on_version_fingerprint() {
    assert!(is_legacy(&v3_spam()));

    let mut both = v3_spam();
    both["xarf_version"] = json!("4.0.0");
    assert!(!is_legacy(&both));
    assert!(!is_legacy(&json!({"xarf_version": "4.0.0", "Report": {}})));
}

// The only test in this binary that converts, so the process-wide notice
// counter moves exactly once.
#[test]
fn spam_scenario_converts_with_one_notice() {
    let before = deprecation_notices();
    let v4 = convert_legacy(&v3_spam()).unwrap();
    assert_eq!(deprecation_notices(), before + 1);

    assert_eq!(v4["category"], "messaging");
    assert_eq!(v4["type"], "spam");
    assert_eq!(v4["source_identifier"], "192.168.1.100");
    assert_eq!(v4["evidence_source"], "spamtrap");
    assert_eq!(v4["protocol"], "smtp");
    assert_eq!(v4["smtp_from"], "spammer@example.com");
    assert!(!is_legacy(&v4));

    let registry = Arc::new(SchemaRegistry::load(Some(&repo_root().join("schemas"))));
    let mut parser = Parser::new(registry, ParserOptions::strict());
    let result = parser.validate(&v4, false, false);
    assert!(result.valid, "{:?}", result.errors);

    let report = parser.parse(&v4).unwrap();
    assert!(matches!(report, Report::Messaging(_)));
    assert_eq!(report.base().source_identifier, "192.168.1.100");
    assert_eq!(deprecation_notices(), before + 1);
}
