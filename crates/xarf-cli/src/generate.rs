//! # Generate Subcommand
//!
//! Prints a sample report for one category/type pair. The output always
//! passes `xarf validate`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use xarf_parser::ReportGenerator;
use xarf_schema::SchemaRegistry;

use crate::print_json;

/// Arguments for `xarf generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Report category (e.g. messaging, connection).
    #[arg(long)]
    pub category: String,

    /// Report type within the category (e.g. spam, ddos).
    #[arg(long = "type")]
    pub report_type: String,

    /// Leave out the sample evidence item.
    #[arg(long)]
    pub no_evidence: bool,

    /// Leave out confidence, tags and severity.
    #[arg(long)]
    pub no_optional: bool,
}

/// Execute `xarf generate`.
pub fn run_generate(args: &GenerateArgs, registry: Arc<SchemaRegistry>) -> Result<u8> {
    let report = ReportGenerator::new(registry)
        .generate_sample_report(
            &args.category,
            &args.report_type,
            !args.no_evidence,
            !args.no_optional,
        )
        .with_context(|| {
            format!(
                "failed to generate a {}/{} report",
                args.category, args.report_type
            )
        })?;
    print_json(&report)?;
    Ok(0)
}
