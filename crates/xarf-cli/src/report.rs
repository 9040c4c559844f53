//! # Report Subcommands
//!
//! `validate`, `parse` and `convert`: everything that reads one report
//! document from disk.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value;

use xarf_core::XarfError;
use xarf_parser::{convert_legacy, is_legacy, Parser, ParserOptions, ValidationResult};
use xarf_schema::SchemaRegistry;

use crate::{print_json, read_document};

/// Arguments for `xarf validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Report to validate (v4, or v3 which is converted first).
    pub file: PathBuf,

    /// Treat every warning as an error.
    #[arg(long)]
    pub strict: bool,

    /// List optional fields the report leaves unset.
    #[arg(long)]
    pub show_missing_optional: bool,

    /// Print the full result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `xarf parse`.
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Report to parse.
    pub file: PathBuf,

    /// Fail on structural errors and unrecognised categories.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `xarf convert`.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// XARF v3 report to convert.
    pub file: PathBuf,
}

/// Execute `xarf validate`.
pub fn run_validate(args: &ValidateArgs, registry: Arc<SchemaRegistry>) -> Result<u8> {
    let document = upgrade(read_document(&args.file)?)?;
    let mut parser = Parser::new(registry, ParserOptions::default());
    let result = parser.validate(&document, args.strict, args.show_missing_optional);

    if args.json {
        print_json(&result)?;
    } else {
        print!("{}", render_result(&args.file.display().to_string(), &result));
    }
    Ok(if result.valid { 0 } else { 1 })
}

/// Execute `xarf parse`.
pub fn run_parse(args: &ParseArgs, registry: Arc<SchemaRegistry>) -> Result<u8> {
    let document = read_document(&args.file)?;
    let options = if args.strict {
        ParserOptions::strict()
    } else {
        ParserOptions::default()
    };
    let mut parser = Parser::new(registry, options);

    let report = match parser.parse(&document) {
        Ok(report) => report,
        Err(XarfError::Validation { message, errors }) => {
            for e in &errors {
                eprintln!("  error: {e}");
            }
            bail!("{}: {message}", args.file.display());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to parse {}", args.file.display())),
    };
    for e in parser.errors() {
        tracing::warn!(file = %args.file.display(), "{e}");
    }
    print_json(&report)?;
    Ok(0)
}

/// Execute `xarf convert`.
pub fn run_convert(args: &ConvertArgs) -> Result<u8> {
    let document = read_document(&args.file)?;
    if !is_legacy(&document) {
        bail!("{} is not an XARF v3 report", args.file.display());
    }
    let converted = convert_legacy(&document)
        .with_context(|| format!("failed to convert {}", args.file.display()))?;
    print_json(&converted)?;
    Ok(0)
}

fn upgrade(document: Value) -> Result<Value> {
    if !is_legacy(&document) {
        return Ok(document);
    }
    tracing::info!("converting XARF v3 report before validation");
    convert_legacy(&document).context("failed to convert XARF v3 report")
}

/// Human-readable rendering of a validation result.
pub fn render_result(label: &str, result: &ValidationResult) -> String {
    let mut out = String::new();
    let verdict = if result.valid { "valid" } else { "invalid" };
    let _ = writeln!(out, "{label}: {verdict}");
    for e in &result.errors {
        let _ = writeln!(out, "  error    {e}");
    }
    for w in &result.warnings {
        let _ = writeln!(out, "  warning  {w}");
    }
    for i in result.info.iter().flatten() {
        let _ = writeln!(out, "  info     {}: {}", i.field, i.message);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xarf_parser::{ValidationError, ValidationInfo, ValidationWarning};
    use xarf_schema::bundled_schemas_dir;

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::load(Some(&bundled_schemas_dir())))
    }

    fn write(dir: &tempfile::TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
        path
    }

    fn spam() -> Value {
        json!({
            "xarf_version": "4.0.0",
            "report_id": "3e5f0c2a-9b7d-4e1f-8a6c-5d4b3a291807",
            "timestamp": "2024-03-02T08:00:00Z",
            "reporter": {"org": "Acme", "contact": "abuse@acme.example", "domain": "acme.example"},
            "sender": {"org": "Acme", "contact": "abuse@acme.example", "domain": "acme.example"},
            "source_identifier": "198.51.100.23",
            "category": "messaging",
            "type": "spam",
            "protocol": "smtp",
            "smtp_from": "offers@bulk.example"
        })
    }

    fn v3() -> Value {
        json!({
            "Version": "3.0.0",
            "ReporterInfo": {"ReporterOrg": "Acme", "ReporterOrgEmail": "abuse@acme.example"},
            "Report": {
                "ReportClass": "Messaging",
                "ReportType": "spam",
                "Date": "2024-01-15T14:30:25Z",
                "Source": {"IP": "192.168.1.100"},
                "AdditionalInfo": {"Protocol": "smtp", "SMTPFrom": "spammer@example.com"}
            }
        })
    }

    #[test]
    fn validate_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(&dir, "good.json", &spam());
        let mut broken = spam();
        broken["confidence"] = json!(2);
        let bad = write(&dir, "bad.json", &broken);

        let args = |file: PathBuf| ValidateArgs {
            file,
            strict: false,
            show_missing_optional: true,
            json: false,
        };
        assert_eq!(run_validate(&args(good), registry()).unwrap(), 0);
        assert_eq!(run_validate(&args(bad), registry()).unwrap(), 1);
    }

    #[test]
    fn validate_strict_fails_on_unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = spam();
        doc["x_note"] = json!("hello");
        let file = write(&dir, "extra.json", &doc);

        let mut args = ValidateArgs {
            file,
            strict: false,
            show_missing_optional: false,
            json: true,
        };
        assert_eq!(run_validate(&args, registry()).unwrap(), 0);
        args.strict = true;
        assert_eq!(run_validate(&args, registry()).unwrap(), 1);
    }

    #[test]
    fn validate_accepts_legacy_input() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(&dir, "v3.json", &v3());
        let args = ValidateArgs {
            file,
            strict: false,
            show_missing_optional: false,
            json: false,
        };
        assert_eq!(run_validate(&args, registry()).unwrap(), 0);
    }

    #[test]
    fn parse_strict_reports_structural_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = spam();
        doc["xarf_version"] = json!("4.1.0");
        let file = write(&dir, "minor.json", &doc);

        let lenient = ParseArgs { file: file.clone(), strict: false };
        assert_eq!(run_parse(&lenient, registry()).unwrap(), 0);

        let strict = ParseArgs { file, strict: true };
        let err = run_parse(&strict, registry()).unwrap_err();
        assert!(err.to_string().contains("Validation failed"));
    }

    #[test]
    fn convert_refuses_v4_input() {
        let dir = tempfile::tempdir().unwrap();
        let v4 = write(&dir, "v4.json", &spam());
        assert!(run_convert(&ConvertArgs { file: v4 }).is_err());

        let legacy = write(&dir, "v3.json", &v3());
        assert_eq!(run_convert(&ConvertArgs { file: legacy }).unwrap(), 0);
    }

    #[test]
    fn rendering_lists_every_diagnostic() {
        let result = ValidationResult::new(
            vec![ValidationError::new("sender.domain", "Missing required field: sender.domain")],
            vec![ValidationWarning::new("x_note", "Unknown field 'x_note' is not defined in the XARF schema")],
            Some(vec![ValidationInfo {
                field: "confidence".into(),
                message: "RECOMMENDED: Confidence score between 0.0 and 1.0".into(),
            }]),
        );
        let text = render_result("r.json", &result);
        assert!(text.starts_with("r.json: invalid\n"));
        assert!(text.contains("  error    sender.domain: Missing required field: sender.domain\n"));
        assert!(text.contains("  warning  x_note: Unknown field"));
        assert!(text.contains("  info     confidence: RECOMMENDED:"));
    }
}
