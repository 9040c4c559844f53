//! # xarf CLI entry point
//!
//! Parses command-line arguments, loads the schema registry once, and
//! dispatches to the subcommand handlers in `xarf_cli`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use xarf_cli::generate::{run_generate, GenerateArgs};
use xarf_cli::report::{run_convert, run_parse, run_validate, ConvertArgs, ParseArgs, ValidateArgs};
use xarf_cli::schema::{run_schema, SchemaArgs};
use xarf_schema::SchemaRegistry;

/// XARF v4 toolkit.
///
/// Validates, parses and generates XARF v4 abuse reports, and converts
/// legacy v3 reports to v4.
#[derive(Parser, Debug)]
#[command(name = "xarf", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Schema directory (containing `v4/xarf-core.json`). Overrides
    /// XARF_SCHEMAS_DIR and discovery.
    #[arg(long, global = true)]
    schemas: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a report and list errors, warnings and optional fields.
    Validate(ValidateArgs),

    /// Parse a report into its typed model and print it as JSON.
    Parse(ParseArgs),

    /// Convert a legacy XARF v3 report to v4.
    Convert(ConvertArgs),

    /// Generate a sample report for a category and type.
    Generate(GenerateArgs),

    /// Inspect categories, types and fields known to the schema registry.
    Schema(SchemaArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let registry = Arc::new(SchemaRegistry::load(cli.schemas.as_deref()));
    if let Some(bundle) = registry.bundle() {
        tracing::debug!(
            schemas = %bundle.location().v4_dir().display(),
            origin = ?bundle.location().origin(),
            types = bundle.types().count(),
            "schema bundle loaded"
        );
    }

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args, registry),
        Commands::Parse(args) => run_parse(&args, registry),
        Commands::Convert(args) => run_convert(&args),
        Commands::Generate(args) => run_generate(&args, registry),
        Commands::Schema(args) => run_schema(&args, registry),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
