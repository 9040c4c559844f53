//! # xarf-parser: Parsing, Validation, Conversion & Generation
//!
//! The document-level half of the toolkit, built on the vocabulary and
//! schema checks in `xarf-schema`.
//!
//! - [`Parser`] decodes and validates v4 reports, converting v3 input on
//!   the way in.
//! - [`compat`] detects and converts legacy v3 documents.
//! - [`ReportGenerator`] builds v4 documents and schema-valid samples.
//! - [`diagnostics`] holds the error, warning and info records that
//!   [`Parser::validate`] returns.
//!
//! ## Crate Policy
//!
//! - Validation never panics and never returns `Err`; problems are data.
//! - Parsing returns `Err` only for input that cannot become a report.
//! - Every category, type and evidence source check goes through
//!   [`xarf_schema::SchemaRegistry`]; there are no hard-coded vocabularies.

pub mod compat;
pub mod diagnostics;
pub mod generator;
pub mod parser;

pub use compat::{convert as convert_legacy, deprecation_notices, is_legacy, DEPRECATION_TARGET};
pub use diagnostics::{ValidationError, ValidationInfo, ValidationResult, ValidationWarning};
pub use generator::{ReportGenerator, ReportRequest};
pub use parser::{Input, Parser, ParserOptions};
