//! # Schema Subcommand
//!
//! Read-only views over the schema registry: the category list, the types
//! of one category, and the fields one type adds to the core schema.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::Value;

use xarf_schema::SchemaRegistry;

/// Arguments for `xarf schema`.
#[derive(Args, Debug)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommand,
}

/// Available schema views.
#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// List every category.
    Categories,

    /// List the types registered under a category.
    Types {
        /// Category name.
        category: String,
    },

    /// List the fields a type adds to the core schema.
    Fields {
        /// Category name.
        category: String,
        /// Type name.
        #[arg(value_name = "TYPE")]
        report_type: String,
    },
}

/// Execute `xarf schema`.
pub fn run_schema(args: &SchemaArgs, registry: Arc<SchemaRegistry>) -> Result<u8> {
    if !registry.is_loaded() {
        bail!("no schema bundle found; pass --schemas or set XARF_SCHEMAS_DIR");
    }
    let text = match &args.command {
        SchemaCommand::Categories => list(registry.categories().iter()),
        SchemaCommand::Types { category } => {
            if !registry.is_valid_category(category) {
                bail!("unknown category '{category}'");
            }
            list(registry.types_for_category(category).iter())
        }
        SchemaCommand::Fields {
            category,
            report_type,
        } => render_fields(&registry, category, report_type)?,
    };
    print!("{text}");
    Ok(0)
}

fn list<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names.fold(String::new(), |mut out, name| {
        let _ = writeln!(out, "{name}");
        out
    })
}

/// One line per type-specific field: name, requirement level, description.
pub fn render_fields(registry: &SchemaRegistry, category: &str, report_type: &str) -> Result<String> {
    let Some(contract) = registry.type_contract(category, report_type) else {
        bail!("unknown type '{report_type}' for category '{category}'");
    };
    let fields = registry.category_fields(category, report_type);
    let width = fields.iter().map(String::len).max().unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "{category}/{report_type}");
    for name in &fields {
        let prop = contract.properties.get(name);
        let level = if contract.required.contains(name) {
            "required"
        } else if prop
            .and_then(|p| p.get("x-recommended"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            "recommended"
        } else {
            "optional"
        };
        let description = prop
            .and_then(|p| p.get("description"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let _ = writeln!(out, "  {name:<width$}  {level:<11}  {description}");
    }
    Ok(out)
}
