//! Check a coeffect manifest.
//!
//! Loads a JSON program manifest, runs the checker and prints diagnostics
//! followed by the resolved context of every declaration.
//!
//! Usage: `check <manifest.json> [--parallel] [--format text|json] [--deny-warnings]`

use clap::Parser;
use coeffects_check::{check, CheckOptions};
use coeffects_tools::{load_program, OutputFormat, Report};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "check")]
#[command(about = "Check capability annotations of a program manifest")]
struct Args {
    /// Path to the JSON program manifest
    manifest: PathBuf,

    /// Check overrides in parallel
    #[arg(long)]
    parallel: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Fail on warnings
    #[arg(long)]
    deny_warnings: bool,
}

fn main() {
    coeffects_tools::init_logging();

    let args = Args::parse();

    info!("Loading manifest from: {}", args.manifest.display());
    let program = match load_program(&args.manifest) {
        Ok(program) => program,
        Err(e) => {
            error!("{:#}", e);
            process::exit(2);
        }
    };

    let options = CheckOptions {
        parallel: args.parallel,
        deny_warnings: args.deny_warnings,
    };
    let result = check(&program, &options);
    let report = Report::new(&result);

    match report.render(&program, args.format) {
        Ok(rendered) => print!("{}", rendered),
        Err(e) => {
            error!("{:#}", e);
            process::exit(2);
        }
    }

    if !report.ok {
        error!("{} diagnostic(s), check failed", report.diagnostics.len());
        process::exit(1);
    }
    info!("Checked {} declaration(s)", report.declarations.len());
}
