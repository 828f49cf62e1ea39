use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::error;
use usbfill::config::AppConfig;
use usbfill::context::AppContext;
use usbfill::core::orchestrator::{Orchestrator, PipelineError, RunSummary};
use usbfill::adapters;
use usbfill::logging::{self, LogConfig};

const EXIT_CONFIG: u8 = 1;
const EXIT_SOURCE_MISSING: u8 = 2;
const EXIT_NO_DRIVES: u8 = 3;
const EXIT_FORMAT_FAILED: u8 = 4;
const EXIT_VERIFICATION_FAILED: u8 = 5;

#[derive(Parser, Serialize)]
#[command(name = "usbfill")]
#[command(about = "Fills multiple removable drives from a source directory concurrently", long_about = None)]
struct Cli {
    /// Source directory to duplicate.
    #[arg(short, long)]
    source: PathBuf,

    /// Drives to copy to, as concatenated letters (e.g. ABCD).
    #[arg(short, long)]
    copyto: String,

    /// Skip verification of the target drives.
    #[arg(short = 'n', long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    no_verify: bool,

    /// Number of expected drives; polls until that many are mounted.
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    drives: Option<u32>,

    /// Format each target drive before copying (needs admin privileges).
    #[arg(short, long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    format: bool,

    /// Repeat continuously, prompting between runs.
    #[arg(short, long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    repeat: bool,

    /// Back volumes with subdirectories of this directory instead of real
    /// drive letters.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation_root: Option<PathBuf>,

    /// Verbose logging.
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::new(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("usbfill: {e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    logging::init(LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
    });

    let adapter = match adapters::get_adapter(&config) {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let ctx = AppContext::new(config, adapter);
    match Orchestrator::new(ctx).start().await {
        Ok(summary) => exit_for(&summary),
        Err(PipelineError::SourceMissing(path)) => {
            error!(path = %path.display(), "Source directory does not exist");
            ExitCode::from(EXIT_SOURCE_MISSING)
        }
        Err(PipelineError::NoDrivesFound) => {
            error!("No candidate drives are mounted");
            ExitCode::from(EXIT_NO_DRIVES)
        }
        Err(PipelineError::Internal(e)) => {
            error!("{e:#}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

/// Map the aggregated outcome to an exit code. A verification failure
/// outranks a format failure.
fn exit_for(summary: &RunSummary) -> ExitCode {
    if summary.verification_failures > 0 {
        ExitCode::from(EXIT_VERIFICATION_FAILED)
    } else if summary.format_failures > 0 {
        ExitCode::from(EXIT_FORMAT_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}
