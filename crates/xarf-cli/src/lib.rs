//! # xarf-cli: Command-Line Interface for XARF v4
//!
//! Provides the `xarf` binary. Handlers live here so they can be tested
//! without spawning a process; `main.rs` only parses arguments and
//! dispatches.
//!
//! ## Subcommands
//!
//! - `xarf validate`: Layered validation with errors, warnings and info.
//! - `xarf parse`: Typed parse, printed back as JSON.
//! - `xarf convert`: Legacy v3 to v4 conversion.
//! - `xarf generate`: Schema-valid sample reports.
//! - `xarf schema`: Registry introspection.
//!
//! ```bash
//! xarf validate report.json --strict --show-missing-optional
//! xarf convert legacy.json > report.json
//! xarf generate --category connection --type ddos
//! xarf schema fields messaging spam
//! ```
//!
//! Every handler returns the process exit code: `0` on success, `1` when
//! a document is invalid. Hard failures surface as `anyhow` errors.

pub mod generate;
pub mod report;
pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// Read and decode a JSON document from `path`.
pub fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Pretty-print a JSON value on stdout.
pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}
