//! # Schema Loader
//!
//! Locates the XARF v4 schema bundle on disk and reads it into memory.
//! No interpretation happens here; the registry and validator do that.
//!
//! ## Layout
//!
//! ```text
//! <root>/v4/xarf-core.json
//! <root>/v4/types/{category}-{type}.json
//! <root>/v4/types/{category}-base.json      (shared fragments)
//! ```
//!
//! ## Resolution order
//!
//! 1. An explicit directory handed in by the caller.
//! 2. The `XARF_SCHEMAS_DIR` environment variable.
//! 3. The first `schemas/` directory with a core schema found walking up
//!    from the current directory.
//! 4. The bundle shipped in this repository.
//!
//! The first two are authoritative: if they point at a directory without a
//! bundle, loading fails rather than falling through.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use xarf_core::XarfError;

/// Environment variable naming the schema root directory.
pub const SCHEMAS_DIR_ENV: &str = "XARF_SCHEMAS_DIR";

pub const CORE_SCHEMA_FILE: &str = "xarf-core.json";

const BASE_SUFFIX: &str = "-base.json";

/// Where a schema bundle was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOrigin {
    Explicit,
    Environment,
    WorkingTree,
    Bundled,
}

/// A resolved `v4/` directory and how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocation {
    v4_dir: PathBuf,
    origin: LocationOrigin,
}

impl SchemaLocation {
    /// Resolve the bundle location. See the module docs for the order.
    ///
    /// # Errors
    ///
    /// [`XarfError::Schema`] if no candidate holds a core schema.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, XarfError> {
        if let Some(dir) = explicit {
            return Self::at(dir, LocationOrigin::Explicit);
        }
        if let Some(dir) = std::env::var_os(SCHEMAS_DIR_ENV) {
            return Self::at(Path::new(&dir), LocationOrigin::Environment);
        }
        if let Some(v4_dir) = std::env::current_dir()
            .ok()
            .and_then(|cwd| find_upwards(&cwd))
        {
            return Ok(Self {
                v4_dir,
                origin: LocationOrigin::WorkingTree,
            });
        }
        Self::at(&bundled_schemas_dir(), LocationOrigin::Bundled)
    }

    /// Accepts either the schema root (containing `v4/`) or the `v4/`
    /// directory itself.
    pub fn at(dir: &Path, origin: LocationOrigin) -> Result<Self, XarfError> {
        v4_dir_within(dir)
            .map(|v4_dir| Self { v4_dir, origin })
            .ok_or_else(|| {
                XarfError::Schema(format!(
                    "no {CORE_SCHEMA_FILE} under {} or {}",
                    dir.display(),
                    dir.join("v4").display()
                ))
            })
    }

    pub fn v4_dir(&self) -> &Path {
        &self.v4_dir
    }

    pub fn types_dir(&self) -> PathBuf {
        self.v4_dir.join("types")
    }

    pub fn origin(&self) -> LocationOrigin {
        self.origin
    }
}

/// The schema directory shipped with this repository.
pub fn bundled_schemas_dir() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates/
    dir.pop(); // repo root
    dir.join("schemas")
}

fn v4_dir_within(dir: &Path) -> Option<PathBuf> {
    let nested = dir.join("v4");
    if nested.join(CORE_SCHEMA_FILE).is_file() {
        return Some(nested);
    }
    if dir.join(CORE_SCHEMA_FILE).is_file() {
        return Some(dir.to_path_buf());
    }
    None
}

fn find_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join("schemas").join("v4");
        if candidate.join(CORE_SCHEMA_FILE).is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

/// A type schema file, split into its category and raw type segment.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSchemaFile {
    pub category: String,
    /// Type segment as written in the filename, hyphens intact.
    pub raw_type: String,
    pub schema: Value,
}

/// Everything read from one bundle directory.
#[derive(Debug, Clone)]
pub struct SchemaBundle {
    location: SchemaLocation,
    core: Value,
    /// Keyed by `{category}/{raw_type}`.
    types: BTreeMap<String, TypeSchemaFile>,
    /// Keyed by filename, e.g. `messaging-base.json`.
    fragments: BTreeMap<String, Value>,
}

impl SchemaBundle {
    /// Read the core schema plus every type schema and base fragment.
    ///
    /// A missing `types/` directory yields a bundle with no types. Type
    /// files that are not valid JSON, or whose name does not split into
    /// `category-type`, are skipped with a warning.
    ///
    /// # Errors
    ///
    /// [`XarfError::Schema`] if the core schema cannot be read or parsed.
    pub fn load(location: SchemaLocation) -> Result<Self, XarfError> {
        let core_path = location.v4_dir().join(CORE_SCHEMA_FILE);
        let core = read_json(&core_path)?;

        let mut types = BTreeMap::new();
        let mut fragments = BTreeMap::new();
        let types_dir = location.types_dir();

        let mut paths: Vec<PathBuf> = match std::fs::read_dir(&types_dir) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect(),
            Err(e) => {
                tracing::warn!(dir = %types_dir.display(), error = %e, "no type schema directory");
                Vec::new()
            }
        };
        paths.sort();

        for path in paths {
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let schema = match read_json(&path) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(file = filename, error = %e, "skipping unreadable schema");
                    continue;
                }
            };
            if filename.ends_with(BASE_SUFFIX) {
                fragments.insert(filename.to_string(), schema);
                continue;
            }
            match split_type_filename(filename) {
                Some((category, raw_type)) => {
                    types.insert(
                        format!("{category}/{raw_type}"),
                        TypeSchemaFile {
                            category: category.to_string(),
                            raw_type: raw_type.to_string(),
                            schema,
                        },
                    );
                }
                None => {
                    tracing::warn!(file = filename, "type schema name is not category-type.json");
                }
            }
        }

        tracing::debug!(
            dir = %location.v4_dir().display(),
            types = types.len(),
            fragments = fragments.len(),
            "loaded schema bundle"
        );

        Ok(Self {
            location,
            core,
            types,
            fragments,
        })
    }

    pub fn location(&self) -> &SchemaLocation {
        &self.location
    }

    pub fn core(&self) -> &Value {
        &self.core
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeSchemaFile> {
        self.types.values()
    }

    /// Find the type schema for `category`/`type_name`: exact segment
    /// first, then with underscores turned into hyphens.
    pub fn type_schema(&self, category: &str, type_name: &str) -> Option<&TypeSchemaFile> {
        self.types
            .get(&format!("{category}/{type_name}"))
            .or_else(|| {
                let hyphenated = type_name.replace('_', "-");
                self.types.get(&format!("{category}/{hyphenated}"))
            })
    }

    /// Look up a `-base.json` fragment by a relative reference such as
    /// `./content-base.json`.
    pub fn fragment(&self, reference: &str) -> Option<&Value> {
        let mut name = reference;
        loop {
            if let Some(rest) = name.strip_prefix("../") {
                name = rest;
            } else if let Some(rest) = name.strip_prefix("./") {
                name = rest;
            } else {
                break;
            }
        }
        self.fragments.get(name)
    }

    /// Every loaded document with the path it was read from, relative to
    /// the `v4/` directory.
    pub fn documents(&self) -> Vec<(String, &Value)> {
        let mut docs = vec![(CORE_SCHEMA_FILE.to_string(), &self.core)];
        for t in self.types.values() {
            docs.push((
                format!("types/{}-{}.json", t.category, t.raw_type),
                &t.schema,
            ));
        }
        for (name, schema) in &self.fragments {
            docs.push((format!("types/{name}"), schema));
        }
        docs
    }
}

/// Split `messaging-bulk-messaging.json` into `("messaging", "bulk-messaging")`.
pub fn split_type_filename(filename: &str) -> Option<(&str, &str)> {
    let stem = filename.strip_suffix(".json")?;
    let (category, raw_type) = stem.split_once('-')?;
    if category.is_empty() || raw_type.is_empty() {
        return None;
    }
    Some((category, raw_type))
}

fn read_json(path: &Path) -> Result<Value, XarfError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        XarfError::Schema(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        XarfError::Schema(format!("invalid JSON in {}: {e}", path.display()))
    })
}
