//! The `scrape` subcommand: walk the listing archive into the raw and cleaned files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use dinescout_lib::dinescout_api::Client;
use dinescout_lib::validation::validate_pages;
use dinescout_lib::{
    ChromeSessionFactory, Deadline, ListingParser, ListingScraper, PipelineConfig, ScrapeSettings,
    ScrapeSummary,
};

#[derive(Args)]
pub struct ScrapeArgs {
    /// Archive pages to walk, starting at page 1
    #[arg(long)]
    pub pages: Option<u32>,

    /// Raw listing file (default: from config)
    #[arg(long)]
    pub raw: Option<PathBuf>,

    /// Cleaned listing file (default: from config)
    #[arg(long)]
    pub cleaned: Option<PathBuf>,
}

pub(crate) fn scrape_settings(config: &PipelineConfig, pages: Option<u32>) -> Result<ScrapeSettings> {
    let mut settings = ScrapeSettings::from_config(config);
    if let Some(pages) = pages {
        settings.pages = validate_pages(pages)?;
    }
    Ok(settings)
}

pub(crate) async fn scrape(
    config: &PipelineConfig,
    settings: ScrapeSettings,
    raw: &Path,
    cleaned: &Path,
    deadline: Deadline,
) -> Result<ScrapeSummary> {
    let s = &config.scrape;
    let client = Client::with_base_url(&s.base_url)
        .with_user_agents(s.user_agents.clone())
        .with_retry(s.retry_attempts, Duration::from_secs(s.retry_delay_secs))
        .with_timeout(Duration::from_secs(s.request_timeout_secs));
    let parser = ListingParser::new(&s.selectors)?;
    let factory = ChromeSessionFactory::new(config.browser.clone(), s.user_agents.clone());

    eprintln!(
        "Scraping up to {} archive pages from {}",
        settings.pages, s.base_url
    );
    let scraper = ListingScraper::new(client, parser, factory, settings);
    let summary = scraper.run(raw, cleaned, deadline).await?;

    eprintln!(
        "Scrape complete: {} pages ({} failed), {} articles ({} skipped)",
        summary.pages_fetched, summary.pages_failed, summary.articles, summary.articles_skipped
    );
    eprintln!(
        "  {} new restaurants, {} already known, {} without a zip",
        summary.accepted, summary.duplicates, summary.without_zip
    );
    if summary.deadline_reached {
        eprintln!("  Stopped early: run deadline reached");
    }
    Ok(summary)
}

pub async fn run(args: &ScrapeArgs, config: &PipelineConfig, deadline: Deadline) -> Result<()> {
    let settings = scrape_settings(config, args.pages)?;
    let raw = args.raw.clone().unwrap_or_else(|| config.paths.raw_path());
    let cleaned = args
        .cleaned
        .clone()
        .unwrap_or_else(|| config.paths.cleaned_path());
    scrape(config, settings, &raw, &cleaned, deadline).await?;
    Ok(())
}
