//! Integration test: the shipped schema bundle is internally consistent.
//!
//! Every type file must agree with its filename, use a category the core
//! schema enumerates, and compile into a validator.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use xarf_schema::{SchemaRegistry, SchemaValidator};

/// Find the repository root.
fn repo_root() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates/
    dir.pop(); // repo root
    dir
}

fn registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::load(Some(&repo_root().join("schemas"))))
}

#[test]
fn every_type_category_is_enumerated_by_core() {
    let r = registry();
    assert!(r.is_loaded());
    for category in r.all_types().keys() {
        assert!(
            r.is_valid_category(category),
            "type files use category '{category}' missing from the core enum"
        );
    }
}

#[test]
fn every_core_category_has_types() {
    let r = registry();
    for category in r.categories() {
        assert!(
            !r.types_for_category(category).is_empty(),
            "category '{category}' has no type schemas"
        );
    }
}

#[test]
fn type_consts_match_filenames() {
    let r = registry();
    for (category, types) in r.all_types() {
        for type_name in types {
            let schema = r.type_schema(category, type_name).unwrap();
            let consts: Vec<(&Value, &Value)> = schema["allOf"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|b| {
                    let props = b.get("properties")?;
                    Some((props.pointer("/category/const")?, props.pointer("/type/const")?))
                })
                .collect();
            assert_eq!(consts.len(), 1, "{category}/{type_name}");
            assert_eq!(consts[0].0, category.as_str());
            assert_eq!(consts[0].1, type_name.as_str());
        }
    }
}

#[test]
fn every_type_schema_compiles() {
    let r = registry();
    let total: usize = r.all_types().values().map(|t| t.len()).sum();
    let validator = SchemaValidator::new(Arc::clone(&r));
    assert!(validator.is_loaded());
    assert!(total >= 19, "expected the full type set, found {total}");
    let debug = format!("{validator:?}");
    for (category, types) in r.all_types() {
        for type_name in types {
            let key = format!("{category}/{}", type_name.replace('_', "-"));
            assert!(debug.contains(&key), "{key} did not compile");
        }
    }
}

#[test]
fn required_type_fields_are_described() {
    let r = registry();
    for (category, types) in r.all_types() {
        for type_name in types {
            let known = r.category_fields(category, type_name);
            let schema = r.type_schema(category, type_name).unwrap();
            for branch in schema["allOf"].as_array().unwrap() {
                for req in branch
                    .get("required")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                {
                    assert!(
                        known.iter().any(|f| f == req),
                        "{category}/{type_name} requires undeclared field '{req}'"
                    );
                }
            }
        }
    }
}
