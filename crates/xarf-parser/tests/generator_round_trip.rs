//! Integration test: the generator and the validator agree on vocabulary.
//!
//! Every category/type pair the registry knows must produce a sample report
//! that validates and parses, with and without the optional extras.

use std::path::PathBuf;
use std::sync::Arc;

use xarf_core::{ContactInfo, HashAlgorithm};
use xarf_parser::{Parser, ParserOptions, ReportGenerator, ReportRequest};
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

#[test]
fn every_registered_type_round_trips() {
    let registry = registry();
    let generator = ReportGenerator::new(Arc::clone(&registry));
    let mut parser = Parser::new(Arc::clone(&registry), ParserOptions::strict());

    let mut checked = 0;
    for (category, types) in registry.all_types() {
        for report_type in types {
            for (evidence, optional) in [(true, true), (false, false)] {
                let report = generator
                    .generate_sample_report(category, report_type, evidence, optional)
                    .unwrap();
                let result = parser.validate(&report, false, false);
                assert!(
                    result.valid,
                    "{category}/{report_type} (evidence={evidence}, optional={optional}): {:?}",
                    result.errors
                );
                let parsed = parser.parse(&report).unwrap();
                assert_eq!(parsed.category(), category.as_str());
                assert_eq!(parsed.report_type(), report_type.as_str());
            }
            checked += 1;
        }
    }
    assert!(checked >= 19, "only {checked} types checked");
}

#[test]
fn hand_built_request_validates() {
    let registry = registry();
    let generator = ReportGenerator::new(Arc::clone(&registry));
    let contact = ContactInfo::new("Acme Abuse Desk", "abuse@acme.example", "acme.example").unwrap();

    let mut request = ReportRequest::new("content", "phishing", "203.0.113.80", contact.clone(), contact);
    request.evidence_source = Some("user_report".into());
    request.confidence = Some(1.0);
    request.tags = vec!["campaign:spring-2024".into()];
    request.evidence = vec![generator
        .add_evidence("text/html", "Landing page", "<html></html>", HashAlgorithm::Sha512)];
    request
        .additional_fields
        .insert("url".into(), "https://login.acme-verify.example/".into());

    let report = generator.generate_report(request).unwrap();
    let result = Parser::new(registry, ParserOptions::default()).validate(&report, true, false);
    assert!(result.valid, "{:?}", result.errors);
}
