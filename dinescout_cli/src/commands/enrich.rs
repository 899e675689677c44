//! The `enrich` subcommand: map-provider enrichment of the cleaned file.
//!
//! Workers run on the blocking pool inside the library; this module only
//! drives the progress bar from their per-row events.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use dinescout_lib::validation::{validate_input_file, validate_workers};
use dinescout_lib::{
    pending_rows, ChromeSessionFactory, Deadline, EnrichSummary, EnrichmentPool, PipelineConfig,
    RecordOutcome, RecordTable, WorkerSettings,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

#[derive(Args)]
pub struct EnrichArgs {
    /// Cleaned input file (default: from config)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Enriched output file (default: from config)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Number of browser workers (default: from config)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip rows already present in the output file
    #[arg(long)]
    pub resume: bool,
}

pub(crate) async fn enrich(
    config: &PipelineConfig,
    input: &Path,
    output: &Path,
    workers: usize,
    resume: bool,
    deadline: Deadline,
) -> Result<EnrichSummary> {
    validate_input_file(input)?;
    let table = RecordTable::read(input)?;
    if table.is_empty() {
        bail!("{} has no records to enrich", input.display());
    }

    let settings = WorkerSettings::from_config(config)?;
    let factory =
        ChromeSessionFactory::new(config.browser.clone(), config.scrape.user_agents.clone());
    let pool = EnrichmentPool::new(factory, settings, workers);

    eprintln!(
        "Enriching {} records from {} with {} workers",
        table.len(),
        input.display(),
        workers
    );

    let pending = pending_rows(&table, output, resume)?.len();
    let pb = ProgressBar::new(pending as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({eta}) {msg}",
        )?,
    );
    pb.set_message("enriching...");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let work = pool.run(&table, output, resume, deadline, Some(tx));
    let progress = async {
        let mut ok = 0usize;
        let mut fallback = 0usize;
        while let Some(event) = rx.recv().await {
            match event.outcome {
                RecordOutcome::Enriched { .. } => ok += 1,
                RecordOutcome::Fallback { reason } => {
                    fallback += 1;
                    pb.println(format!(
                        "  Warning: row {} ({}) written without enrichment: {}",
                        event.row, event.name, reason
                    ));
                }
            }
            pb.set_message(format!("{} ok, {} fallback", ok, fallback));
            pb.inc(1);
        }
    };
    let (result, ()) = tokio::join!(work, progress);
    let summary = result?;

    pb.finish_with_message(format!(
        "done: {} enriched, {} fallback",
        summary.enriched, summary.fallback
    ));
    if summary.resumed > 0 {
        eprintln!("  {} rows already enriched, skipped", summary.resumed);
    }
    if summary.not_processed > 0 {
        eprintln!(
            "  {} rows not processed: run deadline reached",
            summary.not_processed
        );
    }
    eprintln!("Wrote {}", output.display());
    Ok(summary)
}

pub async fn run(args: &EnrichArgs, config: &PipelineConfig, deadline: Deadline) -> Result<()> {
    let workers = validate_workers(args.workers.unwrap_or(config.enrich.workers))?;
    let input = args
        .input
        .clone()
        .unwrap_or_else(|| config.paths.cleaned_path());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.paths.enriched_path());
    enrich(config, &input, &output, workers, args.resume, deadline).await?;
    Ok(())
}
