//! # xarf-schema: Schema Bundle, Registry & Validation
//!
//! Everything that reads the XARF v4 JSON Schema bundle.
//!
//! ## Loading (`loader`)
//!
//! [`SchemaLocation`] decides where the bundle lives (explicit path,
//! `XARF_SCHEMAS_DIR`, an enclosing working tree, or the copy shipped with
//! the crate) and [`SchemaBundle`] reads the core schema, every
//! `{category}-{type}.json` type schema, and the `-base.json` fragments.
//!
//! ## Vocabulary (`registry`)
//!
//! [`SchemaRegistry`] derives categories, types, required fields, contact
//! requirements and evidence sources from the bundle, with lazily cached
//! answers and a degraded mode when no bundle is available.
//!
//! ## Validation (`validate`)
//!
//! [`SchemaValidator`] compiles the core and type schemas once and
//! reports violations with stable, human-readable messages.
//!
//! ## Crate Policy
//!
//! - Depends only on `xarf-core` internally.
//! - Never fetches schemas over the network.
//! - A missing bundle degrades every answer; it is never a panic.

pub mod loader;
pub mod registry;
pub mod validate;

pub use loader::{
    bundled_schemas_dir, LocationOrigin, SchemaBundle, SchemaLocation, TypeSchemaFile,
    CORE_SCHEMA_FILE, SCHEMAS_DIR_ENV,
};
pub use registry::{FieldMetadata, OptionalFieldInfo, SchemaRegistry, TypeContract};
pub use validate::{
    validate_report, validate_report_strict, SchemaValidationError, SchemaValidationResult,
    SchemaValidator, ROOT_FIELD,
};
