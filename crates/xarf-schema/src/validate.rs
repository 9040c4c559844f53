//! # Schema Validation
//!
//! Validates report documents against the bundle's JSON Schemas
//! (Draft 2020-12): always the core schema, plus the type schema matching
//! the document's `category`/`type` when one is registered.
//!
//! ## Schema Resolution
//!
//! Type schemas reference the core schema and their category's base
//! fragment with relative `$ref`s. Those are resolved against the loaded
//! bundle by [`LocalSchemaRetriever`]; nothing is fetched over the network.
//!
//! ## Error shape
//!
//! Engine errors are flattened into [`SchemaValidationError`] records with
//! a dot-joined field path (`$root` for the document itself) and a short,
//! stable message. A type schema `allOf`-includes the core schema, so a
//! core violation is reported by both passes; callers that want each
//! violation once should dedupe by `(field, message)`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{Retrieve, Uri, ValidationError, ValidationOptions, Validator};
use serde::Serialize;
use serde_json::Value;
use xarf_core::XarfError;

use crate::registry::SchemaRegistry;

/// Field path used for errors on the document root.
pub const ROOT_FIELD: &str = "$root";

static SHARED: RwLock<Option<Arc<SchemaValidator>>> = RwLock::new(None);

/// Resolves `$ref` URIs to schemas already loaded from the bundle.
struct LocalSchemaRetriever {
    schemas_by_uri: HashMap<String, Value>,
}

impl LocalSchemaRetriever {
    fn from_registry(registry: &SchemaRegistry) -> Self {
        let mut schemas_by_uri = HashMap::new();
        for (relative, schema) in registry.bundle().map(|b| b.documents()).unwrap_or_default() {
            if let Some(id) = schema.get("$id").and_then(Value::as_str) {
                schemas_by_uri.insert(id.to_string(), schema.clone());
            }
            let filename = relative.rsplit('/').next().unwrap_or(&relative).to_string();
            schemas_by_uri.insert(filename, schema.clone());
            schemas_by_uri.insert(relative, schema.clone());
        }
        Self { schemas_by_uri }
    }
}

impl Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();

        if let Some(value) = self.schemas_by_uri.get(uri_str) {
            return Ok(value.clone());
        }

        // Bundles without `$id`s resolve relative refs against a synthetic
        // base, so fall back to the filename.
        let filename = uri_str.rsplit('/').next().unwrap_or(uri_str);
        if let Some(value) = self.schemas_by_uri.get(filename) {
            return Ok(value.clone());
        }

        // Anything else (metaschemas included) is treated as permissive.
        Ok(serde_json::json!({}))
    }
}

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaValidationError {
    /// Dot-joined path to the offending value, or `$root`.
    pub field: String,
    pub message: String,
    /// The offending value.
    pub value: Option<Value>,
    /// Dot-joined path of the schema keyword that failed.
    pub schema_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaValidationResult {
    pub valid: bool,
    pub errors: Vec<SchemaValidationError>,
}

impl SchemaValidationResult {
    fn from_errors(errors: Vec<SchemaValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Compiled validators for every schema in a registry's bundle.
///
/// Validators are built once at construction; `validate` is read-only and
/// the type is `Send + Sync`.
pub struct SchemaValidator {
    registry: Arc<SchemaRegistry>,
    core: Option<Validator>,
    /// Keyed by `category/raw-type`, matching the bundle's filenames.
    types: BTreeMap<String, Validator>,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("core", &self.core.is_some())
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaValidator {
    /// Compile validators for `registry`'s bundle.
    ///
    /// A degraded registry gives a validator that accepts everything. A
    /// type schema that fails to compile is skipped with a warning.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let Some(bundle) = registry.bundle() else {
            return Self {
                registry,
                core: None,
                types: BTreeMap::new(),
            };
        };

        let core = match build_options(&registry).build(bundle.core()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "core schema failed to compile");
                None
            }
        };

        let mut types = BTreeMap::new();
        for t in bundle.types() {
            let key = format!("{}/{}", t.category, t.raw_type);
            match build_options(&registry).build(&t.schema) {
                Ok(v) => {
                    types.insert(key, v);
                }
                Err(e) => tracing::warn!(schema = %key, error = %e, "type schema failed to compile"),
            }
        }
        tracing::debug!(types = types.len(), "compiled schema validators");

        Self {
            registry,
            core,
            types,
        }
    }

    /// Validator over the process-wide shared registry, compiled on first
    /// use and reused until [`SchemaRegistry::reset_shared`] swaps the
    /// registry out.
    pub fn shared() -> Arc<SchemaValidator> {
        let registry = SchemaRegistry::shared();
        if let Some(validator) = SHARED
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|v| Arc::ptr_eq(&v.registry, &registry))
        {
            return Arc::clone(validator);
        }
        let mut slot = SHARED.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(validator) = slot.as_ref().filter(|v| Arc::ptr_eq(&v.registry, &registry)) {
            return Arc::clone(validator);
        }
        let validator = Arc::new(Self::new(registry));
        *slot = Some(Arc::clone(&validator));
        validator
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Whether the core schema is available.
    pub fn is_loaded(&self) -> bool {
        self.core.is_some()
    }

    /// Validate `report` against the core schema and, when `category` and
    /// `type` are both strings naming a registered type, its type schema.
    pub fn validate(&self, report: &Value) -> SchemaValidationResult {
        let mut errors = Vec::new();
        if let Some(core) = &self.core {
            errors.extend(core.iter_errors(report).map(convert_error));
        }
        if let Some(validator) = self.type_validator(report) {
            errors.extend(validator.iter_errors(report).map(convert_error));
        }
        SchemaValidationResult::from_errors(errors)
    }

    /// Like [`SchemaValidator::validate`], but a failure becomes
    /// [`XarfError::Validation`] whose `errors` read `field: message`.
    pub fn validate_strict(&self, report: &Value) -> Result<(), XarfError> {
        let result = self.validate(report);
        if result.valid {
            return Ok(());
        }
        let messages: Vec<String> = result
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        Err(XarfError::validation(
            format!("Schema validation failed: {}", messages.join("; ")),
            messages,
        ))
    }

    fn type_validator(&self, report: &Value) -> Option<&Validator> {
        let category = report.get("category")?.as_str()?;
        let type_name = report.get("type")?.as_str()?;
        if category.is_empty() || type_name.is_empty() {
            return None;
        }
        let file = self.registry.bundle()?.type_schema(category, type_name)?;
        self.types
            .get(&format!("{}/{}", file.category, file.raw_type))
    }
}

fn build_options(registry: &SchemaRegistry) -> ValidationOptions {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);
    opts.with_retriever(LocalSchemaRetriever::from_registry(registry));
    opts
}

/// Validate `report` with a validator over the shared registry.
pub fn validate_report(report: &Value) -> SchemaValidationResult {
    SchemaValidator::shared().validate(report)
}

/// Strict form of [`validate_report`].
pub fn validate_report_strict(report: &Value) -> Result<(), XarfError> {
    SchemaValidator::shared().validate_strict(report)
}

fn convert_error(error: ValidationError<'_>) -> SchemaValidationError {
    let field = dotted(&error.instance_path.to_string());
    SchemaValidationError {
        field: if field.is_empty() {
            ROOT_FIELD.to_string()
        } else {
            field
        },
        message: message_for(&error),
        value: Some(error.instance.clone().into_owned()),
        schema_path: dotted(&error.schema_path.to_string()),
    }
}

fn message_for(error: &ValidationError<'_>) -> String {
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            format!("Missing required field: {}", plain(property))
        }
        ValidationErrorKind::Type { kind } => {
            let expected = match kind {
                TypeKind::Single(t) => t.to_string(),
                TypeKind::Multiple(ts) => ts
                    .clone()
                    .into_iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            format!(
                "Expected type '{expected}', got '{}'",
                json_type_name(&error.instance)
            )
        }
        ValidationErrorKind::Enum { options } => {
            let allowed: Vec<String> = options
                .as_array()
                .map(|values| values.iter().map(plain).collect())
                .unwrap_or_else(|| vec![plain(options)]);
            format!("Value must be one of: {}", allowed.join(", "))
        }
        ValidationErrorKind::Pattern { pattern, .. } => {
            format!("Value does not match pattern: {pattern}")
        }
        ValidationErrorKind::Format { format, .. } => {
            format!("Invalid format, expected: {format}")
        }
        ValidationErrorKind::MinLength { limit, .. } => {
            format!("Value must be at least {limit} characters")
        }
        ValidationErrorKind::MaxLength { limit, .. } => {
            format!("Value must be at most {limit} characters")
        }
        ValidationErrorKind::Minimum { limit, .. } => format!("Value must be >= {limit}"),
        ValidationErrorKind::Maximum { limit, .. } => format!("Value must be <= {limit}"),
        ValidationErrorKind::AdditionalProperties { unexpected, .. } => {
            format!("Unknown property: {}", unexpected.join(", "))
        }
        _ => error.to_string(),
    }
}

/// `/sender/org` → `sender.org`, undoing JSON Pointer escapes.
fn dotted(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

/// Strings unquoted, anything else as JSON.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
