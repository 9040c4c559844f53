//! # Validation Diagnostics
//!
//! Errors block validity, warnings do not (unless a strict call promotes
//! them), and info entries are opt-in hints about optional fields a report
//! leaves unset.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Dotted path, e.g. `reporter.domain`, or `$root`.
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationInfo {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl ValidationWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl From<ValidationWarning> for ValidationError {
    fn from(w: ValidationWarning) -> Self {
        Self {
            field: w.field,
            message: w.message,
            value: w.value,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of [`crate::Parser::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// `errors.is_empty()`, fixed at construction.
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    /// Present only when missing optional fields were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Vec<ValidationInfo>>,
}

impl ValidationResult {
    pub fn new(
        errors: Vec<ValidationError>,
        warnings: Vec<ValidationWarning>,
        info: Option<Vec<ValidationInfo>>,
    ) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            info,
        }
    }
}
