//! # Report Generator
//!
//! Builds XARF v4 documents programmatically. Inputs are checked against
//! the same registry the parser validates with, so a generated report uses
//! only vocabulary the validator accepts.
//!
//! [`ReportGenerator::generate_sample_report`] fills every field the type
//! schema requires from the schema itself (`const`, then `examples`, then
//! `enum`, then a placeholder for the declared type and format).

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::{json, Map, Value};
use uuid::Uuid;
use xarf_core::{hash_hex, ContactInfo, EvidenceItem, HashAlgorithm, Timestamp, XarfError, XARF_VERSION};
use xarf_schema::SchemaRegistry;

const SAMPLE_ORGS: [&str; 5] = [
    "Security Operations Center",
    "Abuse Response Team",
    "Network Security Team",
    "Threat Intelligence Unit",
    "SOC Team",
];
const SAMPLE_DOMAINS: [&str; 4] = ["example.com", "security.net", "abuse.org", "soc.io"];

fn evidence_content_types(category: &str) -> &'static [&'static str] {
    match category {
        "messaging" => &["message/rfc822", "text/plain", "text/html"],
        "connection" | "infrastructure" => &["application/pcap", "text/plain", "application/json"],
        "content" => &["image/png", "text/html", "application/pdf"],
        "copyright" => &["text/html", "image/png", "application/pdf"],
        "vulnerability" => &["text/plain", "application/json", "image/png"],
        "reputation" => &["application/json", "text/plain", "text/csv"],
        _ => &["text/plain"],
    }
}

/// Inputs to [`ReportGenerator::generate_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub category: String,
    pub report_type: String,
    pub source_identifier: String,
    pub reporter: ContactInfo,
    pub sender: ContactInfo,
    pub evidence_source: Option<String>,
    pub description: Option<String>,
    pub evidence: Vec<EvidenceItem>,
    pub confidence: Option<f64>,
    pub tags: Vec<String>,
    /// Category-specific fields, merged last.
    pub additional_fields: Map<String, Value>,
}

impl ReportRequest {
    pub fn new(
        category: impl Into<String>,
        report_type: impl Into<String>,
        source_identifier: impl Into<String>,
        reporter: ContactInfo,
        sender: ContactInfo,
    ) -> Self {
        Self {
            category: category.into(),
            report_type: report_type.into(),
            source_identifier: source_identifier.into(),
            reporter,
            sender,
            evidence_source: None,
            description: None,
            evidence: Vec::new(),
            confidence: None,
            tags: Vec::new(),
            additional_fields: Map::new(),
        }
    }
}

/// Registry-backed report builder.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    registry: Arc<SchemaRegistry>,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(SchemaRegistry::shared())
    }
}

impl ReportGenerator {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// A random UUID v4.
    pub fn generate_uuid(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// The current instant as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn generate_timestamp(&self) -> String {
        Timestamp::now().to_iso8601()
    }

    /// Hex digest of `data`.
    pub fn generate_hash(&self, data: &[u8], algorithm: HashAlgorithm) -> String {
        hash_hex(data, algorithm)
    }

    /// An evidence item whose `hash` covers `payload`.
    pub fn add_evidence(
        &self,
        content_type: &str,
        description: &str,
        payload: &str,
        algorithm: HashAlgorithm,
    ) -> EvidenceItem {
        let digest = self.generate_hash(payload.as_bytes(), algorithm);
        EvidenceItem {
            content_type: content_type.to_string(),
            payload: payload.to_string(),
            description: Some(description.to_string()),
            hash: Some(format!("{algorithm}:{digest}")),
            size: None,
        }
    }

    /// Build a complete v4 document.
    ///
    /// # Errors
    ///
    /// [`XarfError::Generation`] for an empty source identifier, a contact
    /// missing a required field, an unregistered category or type, an
    /// evidence source outside the registry's vocabulary, or a confidence
    /// outside `0.0..=1.0`.
    pub fn generate_report(&self, request: ReportRequest) -> Result<Value, XarfError> {
        if request.source_identifier.is_empty() {
            return Err(XarfError::Generation("source_identifier is required".into()));
        }
        let reporter = self.contact_value(&request.reporter, "reporter")?;
        let sender = self.contact_value(&request.sender, "sender")?;
        self.check_category_and_type(&request.category, &request.report_type)?;
        if let Some(source) = &request.evidence_source {
            let known = self.registry.evidence_sources();
            if !known.is_empty() && !known.contains(source) {
                return Err(XarfError::Generation(format!(
                    "Invalid evidence_source '{source}'. Must be one of: {}",
                    joined(known.iter())
                )));
            }
        }
        if let Some(c) = request.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(XarfError::Generation(
                    "confidence must be between 0.0 and 1.0".into(),
                ));
            }
        }

        let mut report = Map::new();
        report.insert("xarf_version".into(), json!(XARF_VERSION));
        report.insert("report_id".into(), json!(self.generate_uuid()));
        report.insert("timestamp".into(), json!(self.generate_timestamp()));
        report.insert("reporter".into(), reporter);
        report.insert("sender".into(), sender);
        report.insert("source_identifier".into(), json!(request.source_identifier));
        report.insert("category".into(), json!(request.category));
        report.insert("type".into(), json!(request.report_type));
        if let Some(source) = request.evidence_source.filter(|s| !s.is_empty()) {
            report.insert("evidence_source".into(), json!(source));
        }
        if let Some(description) = request.description.filter(|s| !s.is_empty()) {
            report.insert("description".into(), json!(description));
        }
        if !request.evidence.is_empty() {
            report.insert("evidence".into(), serde_json::to_value(&request.evidence)?);
        }
        if let Some(c) = request.confidence {
            report.insert("confidence".into(), json!(c));
        }
        if !request.tags.is_empty() {
            report.insert("tags".into(), json!(request.tags));
        }
        report.extend(request.additional_fields);

        tracing::debug!(
            category = %request.category,
            report_type = %request.report_type,
            "generated report"
        );
        Ok(Value::Object(report))
    }

    /// Evidence with a random hex payload and a content type typical for
    /// `category`.
    pub fn generate_random_evidence(
        &self,
        category: &str,
        description: Option<&str>,
    ) -> EvidenceItem {
        let content_type = evidence_content_types(category)
            .choose(&mut OsRng)
            .copied()
            .unwrap_or("text/plain");
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let payload: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let description = description
            .map(str::to_string)
            .unwrap_or_else(|| format!("Sample {category} evidence data"));
        self.add_evidence(content_type, &description, &payload, HashAlgorithm::Sha256)
    }

    /// A sample report for `category`/`report_type` that passes validation.
    ///
    /// `include_optional` adds confidence, tags and (for types that declare
    /// it) a severity.
    pub fn generate_sample_report(
        &self,
        category: &str,
        report_type: &str,
        include_evidence: bool,
        include_optional: bool,
    ) -> Result<Value, XarfError> {
        self.check_category_and_type(category, report_type)?;
        let contract = self
            .registry
            .type_contract(category, report_type)
            .unwrap_or_default();

        let (reporter, sender) = sample_contacts()?;
        let mut request = ReportRequest::new(
            category,
            report_type,
            format!("192.0.2.{}", OsRng.gen_range(0..256u16)),
            reporter,
            sender,
        );
        request.description = Some(format!("Sample {report_type} report for testing"));
        request.evidence_source = contract
            .properties
            .get("evidence_source")
            .and_then(|p| p.get("enum"))
            .and_then(Value::as_array)
            .and_then(|values| values.choose(&mut OsRng))
            .and_then(Value::as_str)
            .map(str::to_string);

        for field in &contract.required {
            let value = contract
                .properties
                .get(field)
                .map(|prop| self.sample_value(prop))
                .unwrap_or_else(|| json!("sample"));
            request.additional_fields.insert(field.clone(), value);
        }
        // smtp_from is mandatory whenever the protocol is smtp.
        if request.additional_fields.get("protocol").and_then(Value::as_str) == Some("smtp")
            && !request.additional_fields.contains_key("smtp_from")
        {
            let value = contract
                .properties
                .get("smtp_from")
                .map(|prop| self.sample_value(prop))
                .unwrap_or_else(|| json!("sender@example.com"));
            request.additional_fields.insert("smtp_from".into(), value);
        }

        if include_evidence {
            request.evidence = vec![self.generate_random_evidence(category, None)];
        }
        if include_optional {
            if let Some(prop) = contract.properties.get("severity") {
                let declared: Vec<&str> = prop
                    .get("enum")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .collect();
                let severities: Vec<&str> = if declared.is_empty() {
                    self.registry.severities().iter().map(String::as_str).collect()
                } else {
                    declared
                };
                if let Some(severity) = severities.choose(&mut OsRng) {
                    request
                        .additional_fields
                        .insert("severity".into(), json!(severity));
                }
            }
            let hundredths = 70 + OsRng.gen_range(0..30u32);
            request.confidence = Some(f64::from(hundredths) / 100.0);
            request.tags = vec![
                format!("category:{category}"),
                format!("type:{report_type}"),
                "source:sample".to_string(),
            ];
        }

        self.generate_report(request)
    }

    fn sample_value(&self, prop: &Value) -> Value {
        if let Some(c) = prop.get("const") {
            return c.clone();
        }
        for key in ["examples", "enum"] {
            if let Some(first) = prop.get(key).and_then(Value::as_array).and_then(|a| a.first()) {
                return first.clone();
            }
        }
        let declared = match prop.get("type") {
            Some(Value::String(t)) => t.as_str(),
            Some(Value::Array(ts)) => ts.first().and_then(Value::as_str).unwrap_or("string"),
            _ => "string",
        };
        let minimum = prop.get("minimum").and_then(Value::as_f64);
        match declared {
            "integer" => json!(minimum.map_or(1, |m| m.ceil() as i64)),
            "number" => json!(minimum.unwrap_or(0.0)),
            "boolean" => json!(false),
            "array" => json!([]),
            "object" => json!({}),
            _ => match prop.get("format").and_then(Value::as_str) {
                Some("email") => json!("sample@example.com"),
                Some("date-time") => json!(self.generate_timestamp()),
                Some("uri") => json!("https://example.com/sample"),
                Some("ipv4") => json!("192.0.2.1"),
                Some("ipv6") => json!("2001:db8::1"),
                _ => json!("sample"),
            },
        }
    }

    fn contact_value(&self, contact: &ContactInfo, name: &str) -> Result<Value, XarfError> {
        let value = serde_json::to_value(contact)?;
        for field in self.registry.contact_required_fields() {
            let present = value
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.is_empty());
            if !present {
                return Err(XarfError::Generation(format!("{name}.{field} is required")));
            }
        }
        Ok(value)
    }

    fn check_category_and_type(&self, category: &str, report_type: &str) -> Result<(), XarfError> {
        if !self.registry.is_valid_category(category) {
            return Err(XarfError::Generation(format!(
                "Invalid category '{category}'. Must be one of: {}",
                joined(self.registry.categories().iter())
            )));
        }
        if !self.registry.is_valid_type(category, report_type) {
            return Err(XarfError::Generation(format!(
                "Invalid type '{report_type}' for category '{category}'. Must be one of: {}",
                joined(self.registry.types_for_category(category).iter())
            )));
        }
        Ok(())
    }
}

fn pick(options: &[&'static str]) -> &'static str {
    options.choose(&mut OsRng).copied().unwrap_or("example.com")
}

fn sample_contacts() -> Result<(ContactInfo, ContactInfo), XarfError> {
    let reporter_domain = pick(&SAMPLE_DOMAINS);
    let sender_domain = pick(&SAMPLE_DOMAINS);
    let reporter = ContactInfo::new(
        pick(&SAMPLE_ORGS),
        format!("abuse@{reporter_domain}"),
        reporter_domain,
    )?;
    let sender = ContactInfo::new(
        pick(&SAMPLE_ORGS),
        format!("report@{sender_domain}"),
        sender_domain,
    )?;
    Ok((reporter, sender))
}

fn joined<'a>(values: impl Iterator<Item = &'a String>) -> String {
    values.map(String::as_str).collect::<Vec<_>>().join(", ")
}
