//! # Schema Registry
//!
//! Answers vocabulary questions ("is this a category?", "which fields does
//! this type add?") by reading the schema bundle. Categories, types,
//! required fields and evidence sources are all derived from schema
//! content; nothing here is a hardcoded table except the severity scale,
//! which the bundle does not enumerate yet.
//!
//! ## Lifecycle
//!
//! A registry is an ordinary value. Build one with [`SchemaRegistry::load`]
//! (or [`SchemaRegistry::from_bundle`]) and hand an `Arc` of it to whoever
//! needs it. [`SchemaRegistry::shared`] returns a lazily built process-wide
//! default for callers that do not care.
//!
//! Every derived set is computed on first use and cached; repeated calls
//! return the same reference.
//!
//! ## Degraded mode
//!
//! If no bundle can be loaded the registry still works: every query
//! answers empty, `false` or `None`, and [`SchemaRegistry::is_loaded`]
//! reports `false`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::loader::{SchemaBundle, SchemaLocation};

const DEFAULT_CONTACT_REQUIRED: [&str; 3] = ["org", "contact", "domain"];
const SEVERITIES: [&str; 4] = ["low", "medium", "high", "critical"];

static SHARED: RwLock<Option<Arc<SchemaRegistry>>> = RwLock::new(None);

/// Description of one core-schema property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMetadata {
    pub description: String,
    pub required: bool,
    /// Carries `x-recommended: true`.
    pub recommended: bool,
    pub field_type: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub format: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// An optional field a report may set, and where it is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionalFieldInfo {
    pub field: String,
    pub description: String,
    pub recommended: bool,
    /// `core`, or `{category}/{type}` for type-specific fields.
    pub source: String,
}

/// What a type schema declares: its properties, merged from the inline
/// `allOf` branches and the `-base.json` fragment it references, and every
/// field it requires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeContract {
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

/// Schema-derived validation vocabulary.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    bundle: Option<SchemaBundle>,
    categories: OnceLock<BTreeSet<String>>,
    types_per_category: OnceLock<BTreeMap<String, BTreeSet<String>>>,
    evidence_sources: OnceLock<BTreeSet<String>>,
    severities: OnceLock<BTreeSet<String>>,
    required_fields: OnceLock<BTreeSet<String>>,
    contact_required_fields: OnceLock<BTreeSet<String>>,
    core_property_names: OnceLock<BTreeSet<String>>,
}

impl SchemaRegistry {
    /// Load from `explicit`, or discover the bundle when `None`.
    ///
    /// Never fails: a bundle that cannot be located or read yields a
    /// degraded registry and a warning.
    pub fn load(explicit: Option<&Path>) -> Self {
        match SchemaLocation::resolve(explicit).and_then(SchemaBundle::load) {
            Ok(bundle) => Self::from_bundle(bundle),
            Err(e) => {
                tracing::warn!(error = %e, "schema bundle unavailable, registry is degraded");
                Self::degraded()
            }
        }
    }

    pub fn from_bundle(bundle: SchemaBundle) -> Self {
        Self {
            bundle: Some(bundle),
            ..Self::default()
        }
    }

    /// A registry with no bundle.
    pub fn degraded() -> Self {
        Self::default()
    }

    /// The process-wide default registry, built by discovery on first use.
    pub fn shared() -> Arc<SchemaRegistry> {
        if let Some(registry) = SHARED
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(registry);
        }
        let mut slot = SHARED.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slot.get_or_insert_with(|| Arc::new(SchemaRegistry::load(None))))
    }

    /// Drop the process-wide default so the next [`SchemaRegistry::shared`]
    /// rebuilds it. Meant for test isolation; not for use while other
    /// threads are reading the shared registry.
    pub fn reset_shared() {
        *SHARED.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle.is_some()
    }

    pub fn bundle(&self) -> Option<&SchemaBundle> {
        self.bundle.as_ref()
    }

    pub fn core_schema(&self) -> Option<&Value> {
        self.bundle.as_ref().map(SchemaBundle::core)
    }

    fn core_properties(&self) -> Option<&Map<String, Value>> {
        self.core_schema()?.get("properties")?.as_object()
    }

    // ---- categories and types ----

    /// The core schema's `properties.category.enum`.
    pub fn categories(&self) -> &BTreeSet<String> {
        self.categories.get_or_init(|| {
            self.core_properties()
                .and_then(|p| p.get("category"))
                .map(|c| string_array(c, "enum"))
                .unwrap_or_default()
        })
    }

    /// Exact, case-sensitive.
    pub fn is_valid_category(&self, category: &str) -> bool {
        self.categories().contains(category)
    }

    /// Every registered type, grouped by category. Type names use
    /// underscores even when the filename uses hyphens.
    pub fn all_types(&self) -> &BTreeMap<String, BTreeSet<String>> {
        self.types_per_category.get_or_init(|| {
            let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for t in self.bundle.iter().flat_map(SchemaBundle::types) {
                map.entry(t.category.clone())
                    .or_default()
                    .insert(t.raw_type.replace('-', "_"));
            }
            map
        })
    }

    /// Empty for an unknown category.
    pub fn types_for_category(&self, category: &str) -> BTreeSet<String> {
        self.all_types().get(category).cloned().unwrap_or_default()
    }

    pub fn is_valid_type(&self, category: &str, type_name: &str) -> bool {
        self.all_types()
            .get(category)
            .is_some_and(|types| types.contains(type_name))
    }

    // ---- evidence sources and severities ----

    /// Union of the core schema's `evidence_source.examples` and every
    /// `evidence_source.enum` declared in a type schema's `allOf` branches.
    pub fn evidence_sources(&self) -> &BTreeSet<String> {
        self.evidence_sources.get_or_init(|| {
            let mut sources = self
                .core_properties()
                .and_then(|p| p.get("evidence_source"))
                .map(|e| string_array(e, "examples"))
                .unwrap_or_default();
            for t in self.bundle.iter().flat_map(SchemaBundle::types) {
                for branch in all_of(&t.schema) {
                    if let Some(prop) = branch.pointer("/properties/evidence_source") {
                        sources.extend(string_array(prop, "enum"));
                    }
                }
            }
            sources
        })
    }

    /// Membership is advisory. Callers skip the check when
    /// [`SchemaRegistry::evidence_sources`] is empty.
    pub fn is_valid_evidence_source(&self, source: &str) -> bool {
        self.evidence_sources().contains(source)
    }

    /// Fixed scale. The bundle does not enumerate severities, so this is
    /// the one vocabulary not derived from schema content.
    pub fn severities(&self) -> &BTreeSet<String> {
        self.severities
            .get_or_init(|| SEVERITIES.iter().map(|s| s.to_string()).collect())
    }

    pub fn is_valid_severity(&self, severity: &str) -> bool {
        self.severities().contains(severity)
    }

    // ---- fields ----

    /// The core schema's `required` array.
    pub fn required_fields(&self) -> &BTreeSet<String> {
        self.required_fields.get_or_init(|| {
            self.core_schema()
                .map(|core| string_array(core, "required"))
                .unwrap_or_default()
        })
    }

    /// `$defs.contact_info.required`, or `org`/`contact`/`domain` when the
    /// definition is absent or lists nothing.
    pub fn contact_required_fields(&self) -> &BTreeSet<String> {
        self.contact_required_fields.get_or_init(|| {
            let declared = self
                .core_schema()
                .and_then(|core| core.pointer("/$defs/contact_info"))
                .map(|def| string_array(def, "required"))
                .unwrap_or_default();
            if declared.is_empty() {
                DEFAULT_CONTACT_REQUIRED.iter().map(|s| s.to_string()).collect()
            } else {
                declared
            }
        })
    }

    pub fn core_property_names(&self) -> &BTreeSet<String> {
        self.core_property_names.get_or_init(|| {
            self.core_properties()
                .map(|p| p.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Core properties that are not required.
    pub fn optional_fields(&self) -> BTreeSet<String> {
        self.core_property_names()
            .difference(self.required_fields())
            .cloned()
            .collect()
    }

    /// The type schema for `category`/`type_name`, tolerant of
    /// underscore/hyphen spelling in the type.
    pub fn type_schema(&self, category: &str, type_name: &str) -> Option<&Value> {
        self.bundle
            .as_ref()?
            .type_schema(category, type_name)
            .map(|t| &t.schema)
    }

    /// Metadata for one core-schema property; `None` for unknown names.
    pub fn field_metadata(&self, name: &str) -> Option<FieldMetadata> {
        let prop = self.core_properties()?.get(name)?;
        Some(FieldMetadata {
            description: str_field(prop, "description").unwrap_or_default(),
            required: self.required_fields().contains(name),
            recommended: is_recommended(prop),
            field_type: str_field(prop, "type"),
            enum_values: prop.get("enum").and_then(Value::as_array).cloned(),
            format: str_field(prop, "format"),
            minimum: prop.get("minimum").and_then(Value::as_f64),
            maximum: prop.get("maximum").and_then(Value::as_f64),
        })
    }

    /// Fields a type adds on top of the core schema.
    ///
    /// Order is first-seen: direct properties, then `allOf` branches, then
    /// one level of `-base.json` references. Core property names and the
    /// literal `category`/`type` are left out.
    pub fn category_fields(&self, category: &str, type_name: &str) -> Vec<String> {
        let Some(schema) = self.type_schema(category, type_name) else {
            return Vec::new();
        };
        let mut fields = Vec::new();
        self.collect_fields(schema, true, &mut fields);
        fields
    }

    fn collect_fields(&self, schema: &Value, follow_refs: bool, out: &mut Vec<String>) {
        let core = self.core_property_names();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for name in props.keys() {
                let excluded = core.contains(name) || name == "category" || name == "type";
                if !excluded && !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
        for branch in all_of(schema) {
            match branch.get("$ref").and_then(Value::as_str) {
                Some(reference) => {
                    if !follow_refs || !reference.contains("-base.json") {
                        continue;
                    }
                    if let Some(base) = self.bundle.as_ref().and_then(|b| b.fragment(reference)) {
                        self.collect_fields(base, false, out);
                    }
                }
                None => self.collect_fields(branch, follow_refs, out),
            }
        }
    }

    /// Properties and required fields of one type schema. `None` when the
    /// type is not registered.
    pub fn type_contract(&self, category: &str, type_name: &str) -> Option<TypeContract> {
        let schema = self.type_schema(category, type_name)?;
        let mut contract = TypeContract::default();
        self.merge_contract(schema, true, &mut contract);
        Some(contract)
    }

    fn merge_contract(&self, schema: &Value, follow_refs: bool, contract: &mut TypeContract) {
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                contract.properties.insert(name.clone(), prop.clone());
            }
        }
        for name in schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            if !contract.required.iter().any(|r| r == name) {
                contract.required.push(name.to_string());
            }
        }
        for branch in all_of(schema) {
            match branch.get("$ref").and_then(Value::as_str) {
                Some(reference) if follow_refs && reference.contains("-base.json") => {
                    if let Some(base) = self.bundle.as_ref().and_then(|b| b.fragment(reference)) {
                        self.merge_contract(base, false, contract);
                    }
                }
                Some(_) => {}
                None => self.merge_contract(branch, follow_refs, contract),
            }
        }
    }

    /// Union of [`SchemaRegistry::category_fields`] over every type
    /// registered under `category`.
    pub fn all_fields_for_category(&self, category: &str) -> BTreeSet<String> {
        self.types_for_category(category)
            .iter()
            .flat_map(|t| self.category_fields(category, t))
            .collect()
    }

    /// Optional fields with their descriptions.
    ///
    /// Always lists the core optional fields (source `core`). When both
    /// `category` and `type_name` are given and a type schema exists, also
    /// lists the properties declared inline in its `allOf` branches that
    /// are not required by the type or the branch and are not core
    /// properties.
    pub fn optional_field_info(
        &self,
        category: Option<&str>,
        type_name: Option<&str>,
    ) -> Vec<OptionalFieldInfo> {
        let mut out: Vec<OptionalFieldInfo> = self
            .optional_fields()
            .into_iter()
            .filter_map(|field| {
                let meta = self.field_metadata(&field)?;
                Some(OptionalFieldInfo {
                    field,
                    description: meta.description,
                    recommended: meta.recommended,
                    source: "core".to_string(),
                })
            })
            .collect();

        let (Some(category), Some(type_name)) = (category, type_name) else {
            return out;
        };
        let Some(schema) = self.type_schema(category, type_name) else {
            return out;
        };

        let type_required = string_array(schema, "required");
        let core = self.core_property_names();
        let source = format!("{category}/{type_name}");
        for branch in all_of(schema) {
            let branch_required = string_array(branch, "required");
            let Some(props) = branch.get("properties").and_then(Value::as_object) else {
                continue;
            };
            for (field, prop) in props {
                if type_required.contains(field)
                    || branch_required.contains(field)
                    || core.contains(field)
                    || out.iter().any(|info| &info.field == field)
                {
                    continue;
                }
                out.push(OptionalFieldInfo {
                    field: field.clone(),
                    description: str_field(prop, "description").unwrap_or_default(),
                    recommended: is_recommended(prop),
                    source: source.clone(),
                });
            }
        }
        out
    }
}

fn all_of(schema: &Value) -> impl Iterator<Item = &Value> {
    schema
        .get("allOf")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn string_array(value: &Value, key: &str) -> BTreeSet<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn is_recommended(prop: &Value) -> bool {
    prop.get("x-recommended").and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::bundled_schemas_dir;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::load(Some(&bundled_schemas_dir()))
    }

    #[test]
    fn categories_come_from_core_enum() {
        let r = registry();
        assert!(r.is_loaded());
        for c in ["messaging", "connection", "content", "infrastructure"] {
            assert!(r.is_valid_category(c), "{c}");
        }
        assert!(!r.is_valid_category("Messaging"));
        assert!(!r.is_valid_category(""));
    }

    #[test]
    fn caches_are_identity_stable() {
        let r = registry();
        assert!(std::ptr::eq(r.categories(), r.categories()));
        assert!(std::ptr::eq(r.all_types(), r.all_types()));
        assert!(std::ptr::eq(r.evidence_sources(), r.evidence_sources()));
        assert!(std::ptr::eq(r.required_fields(), r.required_fields()));
        assert!(std::ptr::eq(r.contact_required_fields(), r.contact_required_fields()));
        assert!(std::ptr::eq(r.severities(), r.severities()));
    }

    #[test]
    fn types_are_normalised_to_underscores() {
        let r = registry();
        assert!(r.is_valid_type("messaging", "bulk_messaging"));
        assert!(!r.is_valid_type("messaging", "bulk-messaging"));
        assert!(!r.is_valid_type("messaging", "base"));
        assert!(r.types_for_category("nonexistent").is_empty());
    }

    #[test]
    fn type_schema_tolerates_either_spelling() {
        let r = registry();
        assert!(r.type_schema("messaging", "bulk_messaging").is_some());
        assert!(r.type_schema("messaging", "bulk-messaging").is_some());
        assert!(r.type_schema("messaging", "nope").is_none());
    }

    #[test]
    fn evidence_sources_merge_core_examples_and_type_enums() {
        let r = registry();
        assert!(r.is_valid_evidence_source("spamtrap"));
        // Declared only in type schemas.
        assert!(r.is_valid_evidence_source("flow_analysis"));
        assert!(!r.is_valid_evidence_source("carrier_pigeon"));
    }

    #[test]
    fn contact_required_fields_read_from_defs() {
        let r = registry();
        let expected: BTreeSet<String> =
            ["org", "contact", "domain"].iter().map(|s| s.to_string()).collect();
        assert_eq!(r.contact_required_fields(), &expected);
    }

    #[test]
    fn severities_are_fixed() {
        let r = SchemaRegistry::degraded();
        assert_eq!(r.severities().len(), 4);
        assert!(r.is_valid_severity("critical"));
        assert!(!r.is_valid_severity("urgent"));
    }

    #[test]
    fn field_metadata_reports_bounds_and_flags() {
        let r = registry();
        let confidence = r.field_metadata("confidence").unwrap();
        assert!(!confidence.required);
        assert!(confidence.recommended);
        assert_eq!(confidence.field_type.as_deref(), Some("number"));
        assert_eq!(confidence.minimum, Some(0.0));
        assert_eq!(confidence.maximum, Some(1.0));

        let category = r.field_metadata("category").unwrap();
        assert!(category.required);
        assert!(category.enum_values.is_some());

        assert!(r.field_metadata("no_such_field").is_none());
    }

    #[test]
    fn category_fields_follow_base_reference() {
        let r = registry();
        let fields = r.category_fields("messaging", "spam");
        // allOf order: the base fragment, then the inline branch.
        assert_eq!(fields.first().map(String::as_str), Some("protocol"));
        let smtp_from = fields.iter().position(|f| f == "smtp_from").unwrap();
        let recipient_count = fields.iter().position(|f| f == "recipient_count").unwrap();
        assert!(smtp_from < recipient_count);
        assert!(fields.contains(&"smtp_from".to_string()));
        assert!(fields.contains(&"protocol".to_string()));
        assert!(!fields.contains(&"category".to_string()));
        assert!(!fields.contains(&"evidence_source".to_string()));
        let unique: BTreeSet<&String> = fields.iter().collect();
        assert_eq!(unique.len(), fields.len());
    }

    #[test]
    fn type_contract_merges_base_fragment() {
        let r = registry();
        let spam = r.type_contract("messaging", "spam").unwrap();
        assert_eq!(spam.required, ["protocol", "smtp_from"]);
        assert!(spam.properties.contains_key("subject"));
        assert!(spam.properties.contains_key("recipient_count"));
        assert_eq!(spam.properties["type"]["const"], "spam");

        let ddos = r.type_contract("connection", "ddos").unwrap();
        for field in ["destination_ip", "protocol", "first_seen"] {
            assert!(ddos.required.iter().any(|f| f == field), "{field}");
        }
        assert!(r.type_contract("messaging", "nope").is_none());
    }

    #[test]
    fn all_fields_for_category_is_a_union() {
        let r = registry();
        let all = r.all_fields_for_category("connection");
        assert!(all.contains("peak_bps"));
        assert!(all.contains("service"));
        assert!(all.contains("destination_ip"));
    }

    #[test]
    fn optional_field_info_core_only() {
        let r = registry();
        let info = r.optional_field_info(None, None);
        assert!(info.iter().all(|i| i.source == "core"));
        assert!(info.iter().any(|i| i.field == "confidence" && i.recommended));
        assert!(info.iter().all(|i| i.field != "report_id"));
    }

    #[test]
    fn optional_field_info_with_type() {
        let r = registry();
        let info = r.optional_field_info(Some("vulnerability"), Some("cve"));
        let typed: Vec<&OptionalFieldInfo> =
            info.iter().filter(|i| i.source == "vulnerability/cve").collect();
        assert!(typed.iter().any(|i| i.field == "cvss_score" && i.recommended));
        assert!(typed.iter().any(|i| i.field == "severity"));
        // Required by the type.
        assert!(typed.iter().all(|i| i.field != "cve_id"));
        // Core properties are never re-listed as type-specific.
        assert!(typed.iter().all(|i| i.field != "evidence_source"));
    }

    #[test]
    fn degraded_registry_answers_empty() {
        let dir = tempfile::tempdir().unwrap();
        let r = SchemaRegistry::load(Some(dir.path()));
        assert!(!r.is_loaded());
        assert!(r.categories().is_empty());
        assert!(!r.is_valid_category("messaging"));
        assert!(r.all_types().is_empty());
        assert!(!r.is_valid_type("messaging", "spam"));
        assert!(r.evidence_sources().is_empty());
        assert!(r.required_fields().is_empty());
        assert_eq!(r.contact_required_fields().len(), 3);
        assert!(r.field_metadata("confidence").is_none());
        assert!(r.category_fields("messaging", "spam").is_empty());
        assert!(r.optional_field_info(Some("messaging"), Some("spam")).is_empty());
    }

    #[test]
    fn shared_registry_is_reused_until_reset() {
        let a = SchemaRegistry::shared();
        let b = SchemaRegistry::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
