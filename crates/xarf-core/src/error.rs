//! # Error Types
//!
//! One error enum for the whole toolkit. Validation diagnostics are data
//! (see `xarf-parser::diagnostics`) and only become an [`XarfError`] at the
//! strict boundaries: `Parser::parse` in strict mode and the
//! `validate_*_strict` wrappers.

use thiserror::Error;

/// Top-level error type for XARF parsing, conversion, validation and
/// generation.
#[derive(Error, Debug)]
pub enum XarfError {
    /// Malformed input, a failed legacy conversion, or a report that could
    /// not be turned into its typed model.
    #[error("parse error: {0}")]
    Parse(String),

    /// A legacy (v3) document had members of the wrong shape.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Validation failed in strict mode.
    #[error("{message}")]
    Validation {
        /// Summary of the failure.
        message: String,
        /// Every individual problem that was found.
        errors: Vec<String>,
    },

    /// The schema bundle could not be read or compiled.
    #[error("schema error: {0}")]
    Schema(String),

    /// Report generation was given inputs it cannot honour.
    #[error("generation error: {0}")]
    Generation(String),

    /// A typed report field violated its own constraint.
    #[error("model error: {0}")]
    Model(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl XarfError {
    /// Build a [`XarfError::Validation`] from a summary and the collected
    /// problem strings.
    pub fn validation(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    /// The individual problems carried by a validation failure; empty for
    /// every other variant.
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_is_the_message() {
        let err = XarfError::validation("Validation failed", vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Validation failed");
        assert_eq!(err.errors(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn non_validation_errors_carry_no_problem_list() {
        let err = XarfError::Parse("Invalid JSON".into());
        assert!(err.errors().is_empty());
        assert!(err.to_string().starts_with("parse error:"));
    }

    #[test]
    fn serde_errors_convert() {
        let e = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: XarfError = e.into();
        assert!(matches!(err, XarfError::Serialization(_)));
    }
}
