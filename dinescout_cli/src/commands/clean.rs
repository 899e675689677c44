//! The `clean` subcommand: normalize addresses, fill cities, drop duplicates.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dinescout_lib::validation::validate_input_file;
use dinescout_lib::{clean_file, CleanSummary, PipelineConfig};

#[derive(Args)]
pub struct CleanArgs {
    /// Input record file, raw or cleaned (default: raw file from config)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output file (default: cleaned file from config)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub(crate) fn report(summary: &CleanSummary) {
    eprintln!(
        "Cleaned {} rows: {} without a zip dropped",
        summary.rows_read, summary.without_zip
    );
    eprintln!(
        "  After city fill: {} entries, {} missing city",
        summary.after_city_fill.total, summary.after_city_fill.missing_city
    );
    eprintln!(
        "  After duplicate removal: {} entries, {} complete",
        summary.after_dedup.total, summary.after_dedup.complete
    );
}

pub fn run(args: &CleanArgs, config: &PipelineConfig) -> Result<()> {
    let input = args.input.clone().unwrap_or_else(|| config.paths.raw_path());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.paths.cleaned_path());
    validate_input_file(&input)?;

    let summary = clean_file(&input, &output)?;
    report(&summary);
    eprintln!("Wrote {}", output.display());
    Ok(())
}
