//! Listing scraper: archive pages to raw and cleaned record files.
//!
//! Archive pages are plain HTTP; articles are rendered in a browser session
//! because their cards are built client-side. Each accepted card is appended
//! to the raw file and, once normalized, to the cleaned file straight away,
//! so an interrupted run keeps everything it already found.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;

use dinescout_api::types::{CleanedRecord, RestaurantStub, CLEANED_HEADERS, RAW_HEADERS};
use dinescout_api::Client;

use crate::address::normalize;
use crate::browser::{create_session_with_retry, BrowserError, SessionFactory};
use crate::config::{DelayRange, PipelineConfig};
use crate::deadline::Deadline;
use crate::dedup::{fill_missing_city, CleaningStats};
use crate::error::PipelineError;
use crate::listing::ListingParser;
use crate::records::{read_records, write_records_atomic, AppendWriter, RecordTable};

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub pages: u32,
    pub between_articles: DelayRange,
    pub between_pages: DelayRange,
    pub card_wait: Duration,
    pub city_fill_interval: Duration,
    pub session_attempts: u32,
    pub session_backoff: Duration,
}

impl ScrapeSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let s = &config.scrape;
        Self {
            pages: s.pages,
            between_articles: s.between_articles,
            between_pages: s.between_pages,
            card_wait: Duration::from_secs(s.card_wait_secs),
            city_fill_interval: Duration::from_secs(s.city_fill_interval_secs),
            session_attempts: config.browser.session_attempts,
            session_backoff: Duration::from_secs(config.browser.session_backoff_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub articles: usize,
    pub articles_skipped: usize,
    pub accepted: usize,
    /// Cards already present in the raw file.
    pub duplicates: usize,
    /// Accepted cards whose address yielded no zip.
    pub without_zip: usize,
    pub deadline_reached: bool,
}

fn headers(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

/// Rewrites an existing record file under `expected` when it was written
/// without the optional columns. Rows keep their values; new columns are empty.
fn upgrade_header<T: DeserializeOwned + Serialize>(
    path: &Path,
    expected: &[&str],
) -> Result<(), PipelineError> {
    let found = RecordTable::read_if_exists(path)?;
    let current = found
        .headers()
        .iter()
        .map(String::as_str)
        .eq(expected.iter().copied());
    if found.headers().is_empty() || current {
        return Ok(());
    }
    let records: Vec<T> = read_records(path)?;
    tracing::info!(
        "Upgrading {} to the current header ({} rows)",
        path.display(),
        records.len()
    );
    write_records_atomic(path, expected, &records)?;
    Ok(())
}

/// Per-run state: output writers, seen keys and the city-fill clock.
struct ScrapeRun {
    raw: AppendWriter,
    cleaned: AppendWriter,
    cleaned_path: PathBuf,
    seen: HashSet<(String, String)>,
    last_city_fill: Instant,
    city_fill_interval: Duration,
    summary: ScrapeSummary,
}

impl ScrapeRun {
    fn open(raw: &Path, cleaned: &Path, city_fill_interval: Duration) -> Result<Self, PipelineError> {
        upgrade_header::<RestaurantStub>(raw, RAW_HEADERS)?;
        upgrade_header::<CleanedRecord>(cleaned, CLEANED_HEADERS)?;
        let seen: HashSet<(String, String)> = RecordTable::read_if_exists(raw)?
            .keys(RAW_HEADERS[0], RAW_HEADERS[2])
            .into_iter()
            .collect();
        if !seen.is_empty() {
            tracing::info!("{} restaurants already in {}", seen.len(), raw.display());
        }
        Ok(Self {
            raw: AppendWriter::open(raw, &headers(RAW_HEADERS))?,
            cleaned: AppendWriter::open(cleaned, &headers(CLEANED_HEADERS))?,
            cleaned_path: cleaned.to_path_buf(),
            seen,
            last_city_fill: Instant::now(),
            city_fill_interval,
            summary: ScrapeSummary::default(),
        })
    }

    fn accept(&mut self, stub: RestaurantStub) -> Result<(), PipelineError> {
        if !self.seen.insert(stub.key()) {
            tracing::debug!("Duplicate entry skipped: {}", stub.name);
            self.summary.duplicates += 1;
            return Ok(());
        }
        self.raw.append(&stub)?;
        self.summary.accepted += 1;

        let address = normalize(&stub.address);
        if address.zip.is_empty() {
            tracing::debug!("No zip for {} ({}), not cleaned", stub.name, stub.address);
            self.summary.without_zip += 1;
            return Ok(());
        }
        tracing::info!("Saved {}", stub.name);
        self.cleaned.append(&CleanedRecord::from_stub(stub, address))?;
        Ok(())
    }

    fn city_fill_due(&self) -> bool {
        self.last_city_fill.elapsed() >= self.city_fill_interval
    }

    /// Rewrites the cleaned file with missing cities filled in.
    fn fill_cities(&mut self) -> Result<CleaningStats, PipelineError> {
        let records: Vec<CleanedRecord> = read_records(&self.cleaned_path)?;
        let filled = fill_missing_city(records);
        write_records_atomic(&self.cleaned_path, CLEANED_HEADERS, &filled)?;
        // The rename replaced the file the old handle pointed at.
        self.cleaned = AppendWriter::open(&self.cleaned_path, &headers(CLEANED_HEADERS))?;
        self.last_city_fill = Instant::now();
        let stats = CleaningStats::collect(&filled);
        stats.log("City fill");
        Ok(stats)
    }
}

/// Renders `url` and extracts its cards, reloading once on failure.
///
/// The session is dropped when the failure means it is no longer usable.
fn scrape_article<F: SessionFactory + ?Sized>(
    session: &mut Option<F::Session>,
    factory: &F,
    parser: &ListingParser,
    url: &str,
    settings: &ScrapeSettings,
) -> Result<Vec<RestaurantStub>, BrowserError> {
    use crate::browser::PageSession;

    if session.is_none() {
        *session = Some(create_session_with_retry(
            factory,
            settings.session_attempts,
            settings.session_backoff,
        )?);
    }
    let Some(s) = session.as_mut() else {
        return Err(BrowserError::Session("session unavailable".to_string()));
    };

    let first = s
        .navigate(url)
        .and_then(|_| s.wait_for(parser.card_selector(), settings.card_wait))
        .and_then(|_| s.content());
    let html = match first {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!("Loading {} failed ({}), reloading once", url, e);
            let retry = s
                .reload()
                .and_then(|_| s.wait_for(parser.card_selector(), settings.card_wait))
                .and_then(|_| s.content());
            match retry {
                Ok(html) => html,
                Err(e) => {
                    if e.is_fatal() {
                        *session = None;
                    }
                    return Err(e);
                }
            }
        }
    };
    Ok(parser.entries(&html))
}

pub struct ListingScraper<F: SessionFactory> {
    client: Client,
    parser: Arc<ListingParser>,
    factory: Arc<F>,
    settings: ScrapeSettings,
}

impl<F: SessionFactory + 'static> ListingScraper<F> {
    pub fn new(client: Client, parser: ListingParser, factory: F, settings: ScrapeSettings) -> Self {
        Self {
            client,
            parser: Arc::new(parser),
            factory: Arc::new(factory),
            settings,
        }
    }

    /// Walks the archive and appends accepted cards to `raw` and `cleaned`.
    pub async fn run(
        &self,
        raw: &Path,
        cleaned: &Path,
        deadline: Deadline,
    ) -> Result<ScrapeSummary, PipelineError> {
        let mut run = ScrapeRun::open(raw, cleaned, self.settings.city_fill_interval)?;
        let mut session: Option<F::Session> = None;

        'pages: for page in 1..=self.settings.pages {
            if deadline.expired() {
                run.summary.deadline_reached = true;
                break;
            }
            let html = match self.client.archive_page(page).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::error!("Archive page {} failed: {}", page, e);
                    run.summary.pages_failed += 1;
                    continue;
                }
            };
            run.summary.pages_fetched += 1;

            let links = self.parser.article_links(&html);
            if links.is_empty() {
                tracing::info!("Archive page {} has no articles, stopping", page);
                break;
            }
            tracing::info!("Archive page {}: {} articles", page, links.len());

            for link in links {
                if deadline.expired() {
                    run.summary.deadline_reached = true;
                    break 'pages;
                }
                let url = match self.client.resolve_link(&link) {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::warn!("Skipping article link {}: {}", link, e);
                        continue;
                    }
                };
                run.summary.articles += 1;
                tracing::info!("Scraping {}", url);

                let factory = Arc::clone(&self.factory);
                let parser = Arc::clone(&self.parser);
                let settings = self.settings.clone();
                let article_url = url.clone();
                let (returned, result) = tokio::task::spawn_blocking(move || {
                    let mut session = session;
                    let result = scrape_article(
                        &mut session,
                        factory.as_ref(),
                        &parser,
                        &article_url,
                        &settings,
                    );
                    (session, result)
                })
                .await?;
                session = returned;

                match result {
                    Ok(stubs) => {
                        tracing::info!("{}: {} entries", url, stubs.len());
                        for stub in stubs {
                            run.accept(stub)?;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Skipping article {}: {}", url, e);
                        run.summary.articles_skipped += 1;
                    }
                }

                if run.city_fill_due() {
                    run.fill_cities()?;
                }
                tokio::time::sleep(self.settings.between_articles.sample()).await;
            }
            tokio::time::sleep(self.settings.between_pages.sample()).await;
        }

        drop(session);
        run.fill_cities()?;
        if run.summary.deadline_reached {
            tracing::warn!("Run deadline reached; scraping stopped early");
        }
        Ok(run.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dinescout_api::types::{MAPS_LINK_NOT_FOUND, PHONE_NOT_FOUND};

    fn stub(name: &str, address: &str) -> RestaurantStub {
        RestaurantStub {
            name: name.to_string(),
            address: address.to_string(),
            phone: PHONE_NOT_FOUND.to_string(),
            maps_link: MAPS_LINK_NOT_FOUND.to_string(),
            ..RestaurantStub::default()
        }
    }

    #[test]
    fn accept_writes_raw_and_cleaned_and_skips_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let cleaned = dir.path().join("cleaned.csv");
        let mut run = ScrapeRun::open(&raw, &cleaned, Duration::from_secs(300)).unwrap();

        run.accept(stub("Cafe", "1 Main St, Austin, TX 78701")).unwrap();
        run.accept(stub("Cafe", "1 Main St, Austin, TX 78701")).unwrap();
        run.accept(stub("Pop-up", "Somewhere downtown")).unwrap();

        assert_eq!(run.summary.accepted, 2);
        assert_eq!(run.summary.duplicates, 1);
        assert_eq!(run.summary.without_zip, 1);
        assert_eq!(RecordTable::read(&raw).unwrap().len(), 2);
        let cleaned_rows: Vec<CleanedRecord> = read_records(&cleaned).unwrap();
        assert_eq!(cleaned_rows.len(), 1);
        assert_eq!(cleaned_rows[0].zip, "78701");
    }

    #[test]
    fn seen_keys_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let cleaned = dir.path().join("cleaned.csv");
        {
            let mut run = ScrapeRun::open(&raw, &cleaned, Duration::from_secs(300)).unwrap();
            run.accept(stub("Cafe", "1 Main St, Austin, TX 78701")).unwrap();
        }
        let mut run = ScrapeRun::open(&raw, &cleaned, Duration::from_secs(300)).unwrap();
        run.accept(stub("Cafe", "1 Main St, Austin, TX 78701")).unwrap();
        assert_eq!(run.summary.duplicates, 1);
        assert_eq!(RecordTable::read(&raw).unwrap().len(), 1);
    }

    #[test]
    fn older_files_without_optional_columns_are_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let cleaned = dir.path().join("cleaned.csv");
        std::fs::write(
            &raw,
            "Restaurant Name,Restaurant Description,Address,Phone,Website,Google Maps Link\n\
             Cafe,Coffee,\"1 Main St, Austin, TX 78701\",555-0100,https://cafe.example,https://maps.example/cafe\n",
        )
        .unwrap();

        let mut run = ScrapeRun::open(&raw, &cleaned, Duration::from_secs(300)).unwrap();
        run.accept(stub("Cafe", "1 Main St, Austin, TX 78701")).unwrap();
        run.accept(stub("Deli", "2 Oak St, Austin, TX 78701")).unwrap();
        assert_eq!(run.summary.duplicates, 1);

        let table = RecordTable::read(&raw).unwrap();
        let expected: Vec<String> = RAW_HEADERS.iter().map(|h| h.to_string()).collect();
        assert_eq!(table.headers(), expected.as_slice());
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Phone"), Some("555-0100"));
        assert_eq!(table.get(0, "Venue ID"), Some(""));
    }

    #[test]
    fn city_fill_rewrites_and_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let cleaned = dir.path().join("cleaned.csv");
        let mut run = ScrapeRun::open(&raw, &cleaned, Duration::ZERO).unwrap();

        run.accept(stub("A", "1 Main St, Austin, TX 78701")).unwrap();
        run.accept(stub("B", "2 Oak St, TX 78701")).unwrap();
        assert!(run.city_fill_due());
        let stats = run.fill_cities().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.missing_city, 0);

        run.accept(stub("C", "3 Elm St, Dallas, TX 75201")).unwrap();
        let rows: Vec<CleanedRecord> = read_records(&cleaned).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].city, "Austin");
        assert_eq!(rows[2].name, "C");
    }
}
