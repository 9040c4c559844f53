//! # Legacy (v3) Conversion
//!
//! XARF v3 documents are recognised by fingerprint (a top-level `Version`
//! without `xarf_version`) and rewritten into the v4 shape before any
//! validation runs. Every conversion emits a deprecation notice on the
//! `xarf::deprecation` tracing target and bumps a process-wide counter.
//!
//! Conversion is lossy in one direction only: unknown legacy members are
//! dropped, and the original class/type strings survive as
//! `legacy:category:` / `legacy:type:` tags.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use serde_json::{json, Map, Value};
use uuid::Uuid;
use xarf_core::{Timestamp, XarfError, XARF_VERSION};

pub const DEPRECATION_TARGET: &str = "xarf::deprecation";

const DEPRECATION_NOTICE: &str = "XARF v3 format is deprecated. Please upgrade to XARF v4. \
     This report will be automatically converted, but v3 support will be removed in a future version.";

const UNKNOWN_ORG: &str = "Unknown";
const UNKNOWN_CONTACT: &str = "unknown@example.com";
const UNKNOWN_DOMAIN: &str = "example.com";
const NULL_ADDRESS: &str = "0.0.0.0";
const UNKNOWN_URL: &str = "http://unknown";
const DEFAULT_EVIDENCE_DESCRIPTION: &str = "Evidence from v3 report";

static DEPRECATION_NOTICES: AtomicU64 = AtomicU64::new(0);

/// Number of deprecation notices emitted by this process.
pub fn deprecation_notices() -> u64 {
    DEPRECATION_NOTICES.load(Ordering::Relaxed)
}

/// Whether `document` is a v3 report.
pub fn is_legacy(document: &Value) -> bool {
    document.get("Version").is_some() && document.get("xarf_version").is_none()
}

/// Rewrite a v3 document as v4.
///
/// # Errors
///
/// [`XarfError::Conversion`] when a legacy member has the wrong JSON shape
/// (for example a `Report` that is not an object).
pub fn convert(legacy: &Value) -> Result<Value, XarfError> {
    DEPRECATION_NOTICES.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(target: DEPRECATION_TARGET, "{}", DEPRECATION_NOTICE);

    let root = object(Some(legacy), "document")?;
    let reporter_info = object(root.get("ReporterInfo"), "ReporterInfo")?;
    let report = object(root.get("Report"), "Report")?;
    let source = object(report.get("Source"), "Report.Source")?;
    let additional = object(report.get("AdditionalInfo"), "Report.AdditionalInfo")?;

    let report_class = text(report, "ReportClass")?;
    let report_type = text(report, "ReportType")?;
    let category = map_category(&report_class.unwrap_or_default().to_lowercase());

    let contact = [
        text(reporter_info, "ReporterOrgEmail")?,
        text(reporter_info, "ReporterContactEmail")?,
    ]
    .into_iter()
    .flatten()
    .find(|s| !s.is_empty())
    .unwrap_or(UNKNOWN_CONTACT);
    let org = text(reporter_info, "ReporterOrg")?.unwrap_or(UNKNOWN_ORG);
    let domain = contact
        .rsplit_once('@')
        .map(|(_, d)| d)
        .filter(|d| !d.is_empty())
        .unwrap_or(UNKNOWN_DOMAIN);
    let contact_info = json!({"org": org, "contact": contact, "domain": domain});

    let timestamp = match report.get("Date") {
        Some(Value::Null) | None => Value::String(Timestamp::now().to_iso8601()),
        Some(Value::String(s)) if s.is_empty() => Value::String(Timestamp::now().to_iso8601()),
        Some(date) => date.clone(),
    };

    let mut v4 = Map::new();
    v4.insert("xarf_version".into(), json!(XARF_VERSION));
    v4.insert("report_id".into(), json!(Uuid::new_v4().to_string()));
    v4.insert("timestamp".into(), timestamp);
    v4.insert("reporter".into(), contact_info.clone());
    v4.insert("sender".into(), contact_info);
    v4.insert(
        "source_identifier".into(),
        source.get("IP").cloned().unwrap_or_else(|| json!(NULL_ADDRESS)),
    );
    v4.insert("category".into(), json!(category));
    v4.insert(
        "type".into(),
        json!(report_type.unwrap_or_default().to_lowercase()),
    );
    v4.insert(
        "evidence_source".into(),
        json!(evidence_source(text(additional, "DetectionMethod")?)),
    );
    v4.insert("legacy_version".into(), json!("3"));
    v4.insert(
        "_internal".into(),
        json!({
            "converted_from_v3": true,
            "original_version": root.get("Version").cloned().unwrap_or(Value::Null),
        }),
    );

    if let Some(attachments) = report.get("Attachment").filter(|v| !v.is_null()) {
        let evidence = convert_attachments(attachments)?;
        if !evidence.is_empty() {
            v4.insert("evidence".into(), Value::Array(evidence));
        }
    }

    let mut tags: Vec<Value> = Vec::new();
    match category {
        "messaging" => messaging_fields(&mut v4, additional),
        "connection" => connection_fields(&mut v4, report, source, additional),
        "content" => content_fields(&mut v4, report, additional),
        "infrastructure" => {
            if let Some(name) = additional.get("BotnetName") {
                tags.push(json!(format!("botnet:{}", plain(name))));
            }
            if let Some(family) = additional.get("MalwareFamily") {
                tags.push(json!(format!("malware:{}", plain(family))));
            }
        }
        _ => {}
    }

    let mut legacy_tags = Vec::new();
    if let Some(class) = report_class.filter(|s| !s.is_empty()) {
        legacy_tags.push(json!(format!("legacy:category:{class}")));
    }
    if let Some(t) = report_type.filter(|s| !s.is_empty()) {
        legacy_tags.push(json!(format!("legacy:type:{t}")));
    }
    legacy_tags.extend(tags);
    if !legacy_tags.is_empty() {
        v4.insert("tags".into(), Value::Array(legacy_tags));
    }

    tracing::debug!(category, "converted v3 report");
    Ok(Value::Object(v4))
}

fn map_category(report_class: &str) -> &'static str {
    match report_class {
        "messaging" | "activity" => "messaging",
        "connection" => "connection",
        "content" => "content",
        "infrastructure" => "infrastructure",
        "copyright" => "copyright",
        "vulnerability" => "vulnerability",
        "reputation" => "reputation",
        _ => "other",
    }
}

/// Sniff the free-text detection method. First match wins.
fn evidence_source(method: Option<&str>) -> &'static str {
    let Some(method) = method.filter(|m| !m.is_empty()) else {
        return "automated_scan";
    };
    let method = method.to_lowercase();
    if method.contains("spamtrap") {
        "spamtrap"
    } else if method.contains("honeypot") {
        "honeypot"
    } else if method.contains("user") || method.contains("manual") {
        "user_report"
    } else if method.contains("scan") {
        "automated_scan"
    } else if method.contains("vuln") {
        "vulnerability_scan"
    } else {
        "automated_scan"
    }
}

fn convert_attachments(attachments: &Value) -> Result<Vec<Value>, XarfError> {
    let Value::Array(items) = attachments else {
        return Err(XarfError::Conversion(
            "Report.Attachment must be an array".into(),
        ));
    };
    items
        .iter()
        .map(|item| {
            let item = object(Some(item), "Report.Attachment[]")?;
            Ok(json!({
                "content_type": item.get("ContentType").cloned().unwrap_or_else(|| json!("text/plain")),
                "description": item
                    .get("Description")
                    .cloned()
                    .unwrap_or_else(|| json!(DEFAULT_EVIDENCE_DESCRIPTION)),
                "payload": item.get("Data").cloned().unwrap_or_else(|| json!("")),
            }))
        })
        .collect()
}

fn messaging_fields(v4: &mut Map<String, Value>, additional: &Map<String, Value>) {
    v4.insert(
        "protocol".into(),
        additional.get("Protocol").cloned().unwrap_or_else(|| json!("smtp")),
    );
    copy(v4, additional, "SMTPFrom", "smtp_from");
    copy(v4, additional, "Subject", "subject");
    copy(v4, additional, "SMTPTo", "smtp_to");
    copy(v4, additional, "MessageId", "message_id");
}

fn connection_fields(
    v4: &mut Map<String, Value>,
    report: &Map<String, Value>,
    source: &Map<String, Value>,
    additional: &Map<String, Value>,
) {
    v4.insert(
        "destination_ip".into(),
        report.get("DestinationIp").cloned().unwrap_or_else(|| json!(NULL_ADDRESS)),
    );
    v4.insert(
        "protocol".into(),
        additional.get("Protocol").cloned().unwrap_or_else(|| json!("tcp")),
    );
    copy(v4, source, "Port", "source_port");
    copy(v4, report, "DestinationPort", "destination_port");
    copy(v4, additional, "AttackType", "attack_type");
    copy(v4, additional, "PacketCount", "packet_count");
    copy(v4, additional, "ByteCount", "byte_count");
}

fn content_fields(
    v4: &mut Map<String, Value>,
    report: &Map<String, Value>,
    additional: &Map<String, Value>,
) {
    let url = [report.get("URL"), additional.get("URL")]
        .into_iter()
        .flatten()
        .find(|v| !matches!(v, Value::Null) && v.as_str() != Some(""))
        .cloned()
        .unwrap_or_else(|| json!(UNKNOWN_URL));
    v4.insert("url".into(), url);
    copy(v4, additional, "ContentType", "content_type");
    copy(v4, additional, "AttackType", "attack_type");
}

fn copy(v4: &mut Map<String, Value>, from: &Map<String, Value>, legacy: &str, field: &str) {
    if let Some(value) = from.get(legacy) {
        v4.insert(field.into(), value.clone());
    }
}

static EMPTY: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

/// The object at `value`, or an empty one when absent or null.
fn object<'a>(value: Option<&'a Value>, name: &str) -> Result<&'a Map<String, Value>, XarfError> {
    match value {
        None | Some(Value::Null) => Ok(&EMPTY),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(XarfError::Conversion(format!("{name} must be an object"))),
    }
}

fn text<'a>(map: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, XarfError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(XarfError::Conversion(format!("{key} must be a string"))),
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
