//! The `run` subcommand: every stage in sequence under one deadline.

use anyhow::Result;
use clap::Args;
use dinescout_lib::validation::{validate_input_file, validate_workers};
use dinescout_lib::{clean_file, write_missing_report, Deadline, PipelineConfig};

use super::{clean, enrich, load, scrape};

#[derive(Args)]
pub struct RunArgs {
    /// Archive pages to walk (default: from config)
    #[arg(long)]
    pub pages: Option<u32>,

    /// Number of browser workers (default: from config)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip rows already present in the enriched file
    #[arg(long)]
    pub resume: bool,

    /// Reuse the existing raw file instead of scraping
    #[arg(long)]
    pub skip_scrape: bool,
}

pub async fn run(args: &RunArgs, config: &PipelineConfig, deadline: Deadline) -> Result<()> {
    let paths = &config.paths;
    let raw = paths.raw_path();
    let cleaned = paths.cleaned_path();
    let enriched = paths.enriched_path();
    let workers = validate_workers(args.workers.unwrap_or(config.enrich.workers))?;

    if args.skip_scrape {
        validate_input_file(&raw)?;
        eprintln!("Skipping scrape; using {}", raw.display());
    } else {
        eprintln!("== Scrape ==");
        let settings = scrape::scrape_settings(config, args.pages)?;
        let summary = scrape::scrape(config, settings, &raw, &cleaned, deadline).await?;
        if summary.deadline_reached {
            eprintln!("Deadline reached during scrape; later stages skipped");
            return Ok(());
        }
    }

    eprintln!("== Clean ==");
    let summary = clean_file(&raw, &cleaned)?;
    clean::report(&summary);
    if summary.after_dedup.total == 0 {
        eprintln!("No cleaned records; nothing to enrich");
        return Ok(());
    }

    eprintln!("== Enrich ==");
    let summary = enrich::enrich(config, &cleaned, &enriched, workers, args.resume, deadline).await?;

    eprintln!("== Load ==");
    load::load(&enriched, &paths.database_path())?;

    let missing = write_missing_report(&cleaned, &enriched, &paths.missing_path())?;
    if missing > 0 || summary.not_processed > 0 {
        eprintln!(
            "{} restaurants missing from {}; see {}",
            missing,
            enriched.display(),
            paths.missing_path().display()
        );
    }
    Ok(())
}
