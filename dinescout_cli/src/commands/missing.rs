//! The `missing` subcommand: cleaned records absent from the enriched file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dinescout_lib::validation::validate_input_file;
use dinescout_lib::{write_missing_report, PipelineConfig};

#[derive(Args)]
pub struct MissingArgs {
    /// Cleaned file (default: from config)
    #[arg(long)]
    pub cleaned: Option<PathBuf>,

    /// Enriched file (default: from config)
    #[arg(long)]
    pub enriched: Option<PathBuf>,

    /// Report output (default: from config)
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub fn run(args: &MissingArgs, config: &PipelineConfig) -> Result<()> {
    let cleaned = args
        .cleaned
        .clone()
        .unwrap_or_else(|| config.paths.cleaned_path());
    let enriched = args
        .enriched
        .clone()
        .unwrap_or_else(|| config.paths.enriched_path());
    let report = args
        .report
        .clone()
        .unwrap_or_else(|| config.paths.missing_path());
    validate_input_file(&cleaned)?;

    let count = write_missing_report(&cleaned, &enriched, &report)?;
    eprintln!("{} restaurants missing; wrote {}", count, report.display());
    Ok(())
}
