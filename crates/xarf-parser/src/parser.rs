//! # Parser
//!
//! Turns JSON text or an already-decoded document into a typed [`Report`],
//! and answers "is this a valid report, and why not?" without building one.
//!
//! ## Parse pipeline
//!
//! 1. Decode text; anything but a JSON object is a parse failure.
//! 2. Convert v3 documents (see [`crate::compat`]).
//! 3. Structural pre-check ([`Parser::validate_structure`]). Strict parsers
//!    stop here on failure; lenient ones record the errors and carry on.
//! 4. Dispatch on `category` into the matching [`Report`] variant. An
//!    unrecognised category is fatal when strict and builds the base shape
//!    otherwise.
//!
//! ## Validation passes
//!
//! [`Parser::validate`] layers hand-written checks over the schema pass so
//! that the most common problems get domain wording (`reporter.domain`,
//! "smtp_from required when protocol is smtp") and so that unknown or
//! missing-optional fields can be reported, which plain schema conformance
//! cannot express. Errors are deduplicated by `(field, message)`.
//!
//! Each call resets the parser's per-call state; nothing leaks from one
//! document into the next.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use xarf_core::{Report, Timestamp, XarfError, XARF_VERSION};
use xarf_schema::{SchemaRegistry, SchemaValidator, ROOT_FIELD};

use crate::compat;
use crate::diagnostics::{ValidationError, ValidationInfo, ValidationResult, ValidationWarning};

/// Construction-time parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Fail `parse` on structural errors and unknown categories.
    pub strict: bool,
    /// Include the JSON Schema pass in `validate`.
    pub use_schema_validation: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            strict: false,
            use_schema_validation: true,
        }
    }
}

impl ParserOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Parser input: JSON text or a decoded document.
#[derive(Debug, Clone)]
pub enum Input<'a> {
    Text(&'a str),
    Document(Value),
}

impl<'a> From<&'a str> for Input<'a> {
    fn from(s: &'a str) -> Self {
        Self::Text(s)
    }
}

impl<'a> From<&'a String> for Input<'a> {
    fn from(s: &'a String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Input<'_> {
    fn from(v: Value) -> Self {
        Self::Document(v)
    }
}

impl From<&Value> for Input<'_> {
    fn from(v: &Value) -> Self {
        Self::Document(v.clone())
    }
}

impl Input<'_> {
    fn decode(self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Text(s) => serde_json::from_str(s),
            Self::Document(v) => Ok(v),
        }
    }
}

/// XARF v4 parser and validator bound to one schema registry.
#[derive(Debug)]
pub struct Parser {
    registry: Arc<SchemaRegistry>,
    schema_validator: Option<SchemaValidator>,
    options: ParserOptions,
    errors: Vec<String>,
    warnings: Vec<ValidationWarning>,
}

impl Parser {
    pub fn new(registry: Arc<SchemaRegistry>, options: ParserOptions) -> Self {
        let schema_validator = options
            .use_schema_validation
            .then(|| SchemaValidator::new(Arc::clone(&registry)));
        Self {
            registry,
            schema_validator,
            options,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A parser over the process-wide shared registry.
    pub fn with_options(options: ParserOptions) -> Self {
        Self::new(SchemaRegistry::shared(), options)
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    /// Structural errors recorded by the last `parse` or
    /// `validate_structure` call.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Warnings from the last `validate` call.
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    fn clear_state(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }

    /// Parse a v4 or v3 report into its typed model.
    ///
    /// # Errors
    ///
    /// - [`XarfError::Parse`] for malformed JSON, a non-object document, a
    ///   failed v3 conversion, or a document the model rejects.
    /// - [`XarfError::Validation`] in strict mode when the structural
    ///   pre-check fails or the category is not recognised.
    pub fn parse<'a>(&mut self, input: impl Into<Input<'a>>) -> Result<Report, XarfError> {
        self.clear_state();

        let mut data = input
            .into()
            .decode()
            .map_err(|e| XarfError::Parse(format!("Invalid JSON: {e}")))?;
        if !data.is_object() {
            return Err(XarfError::Parse("Report must be a JSON object".into()));
        }

        if compat::is_legacy(&data) {
            data = compat::convert(&data).map_err(|e| {
                XarfError::Parse(format!("Failed to convert XARF v3 report: {e}"))
            })?;
        }

        if !self.validate_structure(&data) && self.options.strict {
            return Err(XarfError::validation("Validation failed", self.errors.clone()));
        }

        let category = data
            .get("category")
            .map(display_value)
            .unwrap_or_default();

        if !self.registry.is_valid_category(&category) {
            let message = format!(
                "Invalid category '{category}'. Valid categories: {}",
                listing(self.registry.categories())
            );
            if self.options.strict {
                return Err(XarfError::validation(message.clone(), vec![message]));
            }
            tracing::debug!(%category, "unrecognised category, building base report");
            self.errors.push(message);
            return Report::base_from_document(data).map_err(|e| parse_failure(&category, e));
        }

        Report::from_document(&category, data).map_err(|e| parse_failure(&category, e))
    }

    /// Fast-fail structural pre-check. Records the first problem found in
    /// [`Parser::errors`] and returns whether the document passed.
    pub fn validate_structure(&mut self, data: &Value) -> bool {
        match self.structure_problem(data) {
            Some(problem) => {
                self.errors.push(problem);
                false
            }
            None => true,
        }
    }

    fn structure_problem(&self, data: &Value) -> Option<String> {
        let Some(doc) = data.as_object() else {
            return Some("Report must be a JSON object".into());
        };

        let missing: BTreeSet<&String> = self
            .registry
            .required_fields()
            .iter()
            .filter(|f| !doc.contains_key(f.as_str()))
            .collect();
        if !missing.is_empty() {
            return Some(format!("Missing required fields: {missing:?}"));
        }

        if doc.get("xarf_version").and_then(Value::as_str) != Some(XARF_VERSION) {
            return Some(format!(
                "Unsupported XARF version: {}",
                doc.get("xarf_version").map(display_value).unwrap_or_default()
            ));
        }

        let contact_required = self.registry.contact_required_fields();
        for (name, label) in [("reporter", "Reporter"), ("sender", "Sender")] {
            let empty = Map::new();
            let contact = match doc.get(name) {
                None => &empty,
                Some(Value::Object(c)) => c,
                Some(_) => return Some(format!("{label} must be an object")),
            };
            let missing: BTreeSet<&String> = contact_required
                .iter()
                .filter(|f| !contact.contains_key(f.as_str()))
                .collect();
            if !missing.is_empty() {
                return Some(format!("Missing {name} fields: {missing:?}"));
            }
        }

        let timestamp_ok = doc
            .get("timestamp")
            .and_then(Value::as_str)
            .is_some_and(Timestamp::is_valid);
        if !timestamp_ok {
            return Some(format!(
                "Invalid timestamp format: {}",
                doc.get("timestamp").map(display_value).unwrap_or_default()
            ));
        }

        let Some(category) = non_blank_str(doc, "category") else {
            return Some("Missing category field".into());
        };
        if !self.registry.is_valid_category(category) {
            return Some(format!(
                "Invalid category '{category}'. Valid: {}",
                listing(self.registry.categories())
            ));
        }
        let Some(report_type) = non_blank_str(doc, "type") else {
            return Some("Missing type field".into());
        };
        if !self.registry.is_valid_type(category, report_type) {
            return Some(format!(
                "Invalid type '{report_type}' for category '{category}'. Valid: {}",
                listing(&self.registry.types_for_category(category))
            ));
        }
        None
    }

    /// Validate without building a report.
    ///
    /// `strict` promotes every warning to an error for this call only.
    /// `show_missing_optional` adds one info entry per optional field the
    /// document leaves unset. Never fails: malformed input yields an
    /// invalid result with a `$root` error.
    pub fn validate<'a>(
        &mut self,
        input: impl Into<Input<'a>>,
        strict: bool,
        show_missing_optional: bool,
    ) -> ValidationResult {
        self.clear_state();

        let data = match input.into().decode() {
            Ok(v) => v,
            Err(e) => {
                return ValidationResult::new(
                    vec![ValidationError::new(ROOT_FIELD, format!("Invalid JSON: {e}"))],
                    Vec::new(),
                    None,
                )
            }
        };
        let Some(doc) = data.as_object() else {
            return ValidationResult::new(
                vec![ValidationError::new(ROOT_FIELD, "Report must be a JSON object")
                    .with_value(data.clone())],
                Vec::new(),
                None,
            );
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(validator) = &self.schema_validator {
            errors.extend(validator.validate(&data).errors.into_iter().map(|e| {
                ValidationError {
                    field: e.field,
                    message: e.message,
                    value: e.value,
                }
            }));
        }

        self.check_required(doc, &mut errors);
        self.check_formats(doc, &mut errors);
        self.check_values(doc, &mut errors, &mut warnings);
        self.check_category_rules(doc, &mut errors, &mut warnings);
        self.collect_unknown_fields(doc, &mut warnings);

        let mut seen = HashSet::new();
        errors.retain(|e: &ValidationError| seen.insert((e.field.clone(), e.message.clone())));

        if strict {
            errors.extend(warnings.drain(..).map(ValidationError::from));
        }

        let info = show_missing_optional.then(|| self.missing_optional_fields(doc));

        self.warnings = warnings.clone();
        ValidationResult::new(errors, warnings, info)
    }

    fn check_required(&self, doc: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
        for name in self.registry.required_fields() {
            if !doc.contains_key(name) {
                errors.push(ValidationError::new(
                    name.as_str(),
                    format!("Missing required field: {name}"),
                ));
            }
        }
    }

    fn check_formats(&self, doc: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
        if let Some(ts) = doc.get("timestamp").filter(|v| !is_blank(v)) {
            if !ts.as_str().is_some_and(Timestamp::is_valid) {
                errors.push(
                    ValidationError::new(
                        "timestamp",
                        format!("Invalid timestamp format: {}", display_value(ts)),
                    )
                    .with_value(ts.clone()),
                );
            }
        }

        for prefix in ["reporter", "sender"] {
            let Some(Value::Object(contact)) = doc.get(prefix) else {
                continue;
            };
            for field in self.registry.contact_required_fields() {
                if !contact.contains_key(field) {
                    let path = format!("{prefix}.{field}");
                    let message = format!("Missing required field: {path}");
                    errors.push(ValidationError::new(path, message));
                }
            }
        }
    }

    fn check_values(
        &self,
        doc: &Map<String, Value>,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        let category = non_blank_str(doc, "category");
        if let Some(category) = category {
            if !self.registry.is_valid_category(category) {
                errors.push(
                    ValidationError::new(
                        "category",
                        format!(
                            "Invalid category '{category}'. Valid: {}",
                            listing(self.registry.categories())
                        ),
                    )
                    .with_value(Value::from(category)),
                );
            }
        }

        if let (Some(category), Some(report_type)) = (category, non_blank_str(doc, "type")) {
            if !self.registry.is_valid_type(category, report_type) {
                errors.push(
                    ValidationError::new(
                        "type",
                        format!(
                            "Invalid type '{report_type}' for category '{category}'. Valid: {}",
                            listing(&self.registry.types_for_category(category))
                        ),
                    )
                    .with_value(Value::from(report_type)),
                );
            }
        }

        if let Some(source) = non_blank_str(doc, "evidence_source") {
            let known = self.registry.evidence_sources();
            if !known.is_empty() && !known.contains(source) {
                warnings.push(
                    ValidationWarning::new(
                        "evidence_source",
                        format!(
                            "Unknown evidence_source '{source}'. Known sources: {}",
                            listing(known)
                        ),
                    )
                    .with_value(Value::from(source)),
                );
            }
        }
    }

    fn check_category_rules(
        &self,
        doc: &Map<String, Value>,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        let (Some(category), Some(_)) = (non_blank_str(doc, "category"), non_blank_str(doc, "type"))
        else {
            return;
        };
        let blank = |key: &str| doc.get(key).map_or(true, is_blank);
        match category {
            "messaging" => {
                if doc.get("protocol").and_then(Value::as_str) == Some("smtp") && blank("smtp_from") {
                    errors.push(ValidationError::new(
                        "smtp_from",
                        "smtp_from required when protocol is smtp",
                    ));
                }
            }
            "connection" => {
                if blank("destination_ip") {
                    warnings.push(ValidationWarning::new(
                        "destination_ip",
                        "destination_ip recommended for connection reports",
                    ));
                }
            }
            "content" => {
                if blank("url") {
                    warnings.push(ValidationWarning::new(
                        "url",
                        "url recommended for content reports",
                    ));
                }
            }
            _ => {}
        }
    }

    fn collect_unknown_fields(
        &self,
        doc: &Map<String, Value>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        // Without a bundle every key would look unknown.
        if !self.registry.is_loaded() {
            return;
        }
        let core = self.registry.core_property_names();
        let type_fields = match (non_blank_str(doc, "category"), non_blank_str(doc, "type")) {
            (Some(c), Some(t)) => self.registry.category_fields(c, t),
            _ => Vec::new(),
        };
        for (name, value) in doc {
            if !core.contains(name) && !type_fields.contains(name) {
                warnings.push(
                    ValidationWarning::new(
                        name.as_str(),
                        format!("Unknown field '{name}' is not defined in the XARF schema"),
                    )
                    .with_value(value.clone()),
                );
            }
        }
    }

    fn missing_optional_fields(&self, doc: &Map<String, Value>) -> Vec<ValidationInfo> {
        self.registry
            .optional_field_info(non_blank_str(doc, "category"), non_blank_str(doc, "type"))
            .into_iter()
            .filter(|info| doc.get(&info.field).map_or(true, Value::is_null))
            .map(|info| {
                let prefix = if info.recommended { "RECOMMENDED" } else { "OPTIONAL" };
                let description = if info.description.is_empty() {
                    format!("Optional field: {}", info.field)
                } else {
                    info.description
                };
                ValidationInfo {
                    message: format!("{prefix}: {description}"),
                    field: info.field,
                }
            })
            .collect()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::with_options(ParserOptions::default())
    }
}

fn parse_failure(category: &str, e: XarfError) -> XarfError {
    XarfError::Parse(format!("Failed to parse {category} report: {e}"))
}

fn non_blank_str<'a>(doc: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Strings unquoted, anything else as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Sorted `["a", "b"]` rendering used in diagnostic messages.
fn listing(values: &BTreeSet<String>) -> String {
    format!("{:?}", values.iter().collect::<Vec<_>>())
}
