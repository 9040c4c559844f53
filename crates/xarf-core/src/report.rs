//! # Report Model
//!
//! The typed, category-polymorphic record a successful parse produces.
//!
//! Every report shares the fields in [`ReportBase`]. Messaging, connection
//! and content reports get a dedicated variant with their well-known
//! fields; every other category, and an unrecognised category in lenient
//! mode, lands in [`Report::Base`]. Keys a variant does not model are kept
//! in an insertion-ordered `extra` map and written back out on
//! serialization, so nothing in the source document is dropped.
//!
//! Field constraints (version pattern, port and confidence ranges, text
//! lengths, contact and evidence shapes) are checked when the report is
//! built from a document; a report that exists satisfies them.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::digest::is_evidence_hash;
use crate::error::XarfError;
use crate::temporal::Timestamp;

/// Wire pattern for `xarf_version`.
pub const VERSION_PATTERN: &str = r"^4\.[0-9]+\.[0-9]+$";

/// The version this toolkit emits and fully supports.
pub const XARF_VERSION: &str = "4.0.0";

pub const CONTACT_ORG_MAX_CHARS: usize = 200;
pub const EVIDENCE_DESCRIPTION_MAX_CHARS: usize = 500;
pub const EVIDENCE_MAX_SIZE: u64 = 5_242_880;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(VERSION_PATTERN).unwrap());

/// Whether `v` is a well-formed XARF v4 version string.
pub fn is_v4_version(v: &str) -> bool {
    VERSION_RE.is_match(v)
}

/// Organisation identity for `reporter`, `sender` and `on_behalf_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactInfo {
    pub org: String,
    /// Contact email address. Email-shaped by convention, not verified.
    pub contact: String,
    pub domain: String,
}

impl ContactInfo {
    pub fn new(
        org: impl Into<String>,
        contact: impl Into<String>,
        domain: impl Into<String>,
    ) -> Result<Self, XarfError> {
        let info = Self {
            org: org.into(),
            contact: contact.into(),
            domain: domain.into(),
        };
        info.check("contact")?;
        Ok(info)
    }

    fn check(&self, field: &str) -> Result<(), XarfError> {
        for (name, value) in [
            ("org", &self.org),
            ("contact", &self.contact),
            ("domain", &self.domain),
        ] {
            if value.is_empty() {
                return Err(XarfError::Model(format!("{field}.{name} must not be empty")));
            }
        }
        if self.org.chars().count() > CONTACT_ORG_MAX_CHARS {
            return Err(XarfError::Model(format!(
                "{field}.org must be at most {CONTACT_ORG_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}

/// One artifact supporting a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvidenceItem {
    /// MIME type of the payload.
    pub content_type: String,
    /// Evidence body, base64 by convention.
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `algorithm:hexdigest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Decoded payload size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl EvidenceItem {
    fn check(&self, field: &str) -> Result<(), XarfError> {
        if let Some(desc) = &self.description {
            if desc.chars().count() > EVIDENCE_DESCRIPTION_MAX_CHARS {
                return Err(XarfError::Model(format!(
                    "{field}.description must be at most {EVIDENCE_DESCRIPTION_MAX_CHARS} characters"
                )));
            }
        }
        if let Some(hash) = &self.hash {
            if !is_evidence_hash(hash) {
                return Err(XarfError::Model(format!(
                    "{field}.hash must be algorithm:hexdigest, got {hash:?}"
                )));
            }
        }
        if let Some(size) = self.size {
            if size > EVIDENCE_MAX_SIZE {
                return Err(XarfError::Model(format!(
                    "{field}.size must be <= {EVIDENCE_MAX_SIZE}"
                )));
            }
        }
        Ok(())
    }
}

/// Fields shared by every report, whatever its category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBase {
    pub xarf_version: String,
    pub report_id: String,
    /// ISO 8601, kept as written. See [`ReportBase::parsed_timestamp`].
    pub timestamp: String,
    pub reporter: ContactInfo,
    pub sender: ContactInfo,
    pub source_identifier: String,
    pub category: String,
    #[serde(rename = "type")]
    pub report_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<EvidenceItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_behalf_of: Option<ContactInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_version: Option<String>,
    /// Processing metadata, never forwarded to recipients.
    #[serde(rename = "_internal", default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<Map<String, Value>>,
}

impl ReportBase {
    /// The report timestamp as a UTC instant.
    pub fn parsed_timestamp(&self) -> Result<Timestamp, XarfError> {
        Timestamp::parse(&self.timestamp)
    }

    fn check(&self) -> Result<(), XarfError> {
        if !is_v4_version(&self.xarf_version) {
            return Err(XarfError::Model(format!(
                "xarf_version {:?} does not match {VERSION_PATTERN}",
                self.xarf_version
            )));
        }
        self.reporter.check("reporter")?;
        self.sender.check("sender")?;
        if let Some(on_behalf_of) = &self.on_behalf_of {
            on_behalf_of.check("on_behalf_of")?;
        }
        if self.source_port == Some(0) {
            return Err(XarfError::Model("source_port must be >= 1".into()));
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(XarfError::Model(format!(
                    "confidence must be between 0.0 and 1.0, got {confidence}"
                )));
            }
        }
        if let Some(description) = &self.description {
            if description.chars().count() > DESCRIPTION_MAX_CHARS {
                return Err(XarfError::Model(format!(
                    "description must be at most {DESCRIPTION_MAX_CHARS} characters"
                )));
            }
        }
        for (i, item) in self.evidence.iter().flatten().enumerate() {
            item.check(&format!("evidence.{i}"))?;
        }
        Ok(())
    }
}

/// Spam, phishing and other abuse delivered over a messaging protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingReport {
    #[serde(flatten)]
    pub base: ReportBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_victim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// DDoS, scans, login attacks and other network-level abuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionReport {
    #[serde(flatten)]
    pub base: ReportBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_logins: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usernames_attempted: Option<Vec<String>>,
    /// Sequential, distributed and so on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_pattern: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Malicious or compromised web content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentReport {
    #[serde(flatten)]
    pub base: ReportBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_pages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerability_exploited: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_parameters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_detected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_exposed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_potentially_affected: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Shape for categories without a dedicated variant. Category-specific
/// fields live in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseReport {
    #[serde(flatten)]
    pub base: ReportBase,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A parsed XARF v4 report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Messaging(MessagingReport),
    Connection(ConnectionReport),
    Content(ContentReport),
    Base(BaseReport),
}

impl Report {
    /// Build the variant selected by `category` from a full document.
    ///
    /// `messaging`, `connection` and `content` get their own variant;
    /// anything else, including categories the caller does not recognise,
    /// builds [`Report::Base`].
    ///
    /// # Errors
    ///
    /// [`XarfError::Model`] when a field is missing, has the wrong type, or
    /// breaks one of the field constraints.
    pub fn from_document(category: &str, document: Value) -> Result<Self, XarfError> {
        let report = match category {
            "messaging" => Self::Messaging(from_value(document)?),
            "connection" => {
                let report: ConnectionReport = from_value(document)?;
                if report.destination_port == Some(0) {
                    return Err(XarfError::Model("destination_port must be >= 1".into()));
                }
                Self::Connection(report)
            }
            "content" => Self::Content(from_value(document)?),
            _ => Self::Base(from_value(document)?),
        };
        report.base().check()?;
        Ok(report)
    }

    /// Build [`Report::Base`] regardless of the document's category.
    pub fn base_from_document(document: Value) -> Result<Self, XarfError> {
        let report = Self::Base(from_value(document)?);
        report.base().check()?;
        Ok(report)
    }

    /// The shared fields.
    pub fn base(&self) -> &ReportBase {
        match self {
            Self::Messaging(r) => &r.base,
            Self::Connection(r) => &r.base,
            Self::Content(r) => &r.base,
            Self::Base(r) => &r.base,
        }
    }

    /// Keys the variant does not model, in document order.
    pub fn extra(&self) -> &Map<String, Value> {
        match self {
            Self::Messaging(r) => &r.extra,
            Self::Connection(r) => &r.extra,
            Self::Content(r) => &r.extra,
            Self::Base(r) => &r.extra,
        }
    }

    pub fn category(&self) -> &str {
        &self.base().category
    }

    pub fn report_type(&self) -> &str {
        &self.base().report_type
    }

    pub fn report_id(&self) -> &str {
        &self.base().report_id
    }

    /// Serialize back to a JSON document, extra keys included.
    pub fn to_value(&self) -> Result<Value, XarfError> {
        Ok(serde_json::to_value(self)?)
    }
}

fn from_value<T: serde::de::DeserializeOwned>(document: Value) -> Result<T, XarfError> {
    serde_json::from_value(document).map_err(|e| XarfError::Model(e.to_string()))
}
