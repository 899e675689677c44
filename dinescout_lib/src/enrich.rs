//! Concurrent map-provider enrichment of cleaned records.
//!
//! The input is split into contiguous chunks, one per worker. Each worker
//! runs on the blocking pool with its own browser session and appends one
//! output row per input row, whatever happened while scraping it.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use csv::StringRecord;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use dinescout_api::types::{enrichment_columns, MAPS_LINK_NOT_FOUND};

use crate::browser::{create_session_with_retry, BrowserError, PageSession, SessionFactory};
use crate::config::{DelayRange, PipelineConfig};
use crate::deadline::Deadline;
use crate::error::PipelineError;
use crate::maps::{search_url, Enrichment, MapParser};
use crate::records::{AppendWriter, RecordTable};

pub const NAME_COLUMN: &str = "Restaurant Name";
pub const ADDRESS_COLUMN: &str = "Address";
pub const CITY_COLUMN: &str = "City";
pub const STATE_COLUMN: &str = "State";
pub const MAPS_LINK_COLUMN: &str = "Google Maps Link";

/// Columns an enrichment input must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[NAME_COLUMN, ADDRESS_COLUMN, CITY_COLUMN, STATE_COLUMN];

/// How one input row ended up in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The place page was scraped; `fields` values were found.
    Enriched { fields: usize },
    /// Written with sentinel enrichment values.
    Fallback { reason: String },
}

/// Progress notification sent after each row is written.
#[derive(Debug, Clone)]
pub struct RecordEvent {
    pub chunk: usize,
    /// 1-based row number in the input file.
    pub row: usize,
    pub name: String,
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub input_rows: usize,
    /// Rows already present in the output and skipped by resume.
    pub resumed: usize,
    pub enriched: usize,
    pub fallback: usize,
    /// Rows left unwritten because the deadline passed.
    pub not_processed: usize,
}

impl EnrichSummary {
    fn merge(&mut self, other: &EnrichSummary) {
        self.enriched += other.enriched;
        self.fallback += other.fallback;
        self.not_processed += other.not_processed;
    }
}

/// Per-run settings shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub parser: MapParser,
    pub columns: Vec<String>,
    pub search_url: String,
    pub tab_selector: String,
    pub about_tab_text: String,
    /// Selectors waited on, each with its own bounded wait, before reading the page.
    pub wait_selectors: Vec<String>,
    pub element_wait: Duration,
    pub about_tab_wait: Duration,
    pub between_records: DelayRange,
    pub session_attempts: u32,
    pub session_backoff: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let enrich = &config.enrich;
        let s = &enrich.selectors;
        Ok(Self {
            parser: MapParser::new(s, &enrich.amenity_sections)?,
            columns: enrichment_columns(&enrich.amenity_sections),
            search_url: enrich.search_url.clone(),
            tab_selector: s.tab.clone(),
            about_tab_text: s.about_tab_text.clone(),
            wait_selectors: vec![s.star_rating.clone(), s.reviews.clone(), s.category.clone()],
            element_wait: Duration::from_secs(enrich.element_wait_secs),
            about_tab_wait: Duration::from_secs(enrich.about_tab_wait_secs),
            between_records: enrich.between_records,
            session_attempts: config.browser.session_attempts,
            session_backoff: Duration::from_secs(config.browser.session_backoff_secs),
        })
    }
}

/// Splits `len` rows into at most `workers` contiguous ranges of
/// `ceil(len / workers)` rows.
pub fn chunk_ranges(len: usize, workers: usize) -> Vec<std::ops::Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let size = len.div_ceil(workers.max(1));
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// Output header: the input header followed by any enrichment column it
/// does not already have.
pub fn output_headers(input: &[String], columns: &[String]) -> Vec<String> {
    let mut out = input.to_vec();
    for c in columns {
        if !out.contains(c) {
            out.push(c.clone());
        }
    }
    out
}

/// Rows of `input` still to be written, with their 1-based row numbers.
///
/// With `resume`, rows whose (name, address) already appear in `output`
/// are left out.
pub fn pending_rows(
    input: &RecordTable,
    output: &Path,
    resume: bool,
) -> Result<Vec<(usize, StringRecord)>, PipelineError> {
    let done: HashSet<(String, String)> = if resume {
        RecordTable::read_if_exists(output)?
            .keys(NAME_COLUMN, ADDRESS_COLUMN)
            .into_iter()
            .collect()
    } else {
        HashSet::new()
    };

    let name_idx = input.column(NAME_COLUMN).unwrap_or_default();
    let addr_idx = input.column(ADDRESS_COLUMN).unwrap_or_default();
    Ok(input
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            let key = (
                row.get(name_idx).unwrap_or_default().to_string(),
                row.get(addr_idx).unwrap_or_default().to_string(),
            );
            !done.contains(&key)
        })
        .map(|(i, row)| (i + 1, row.clone()))
        .collect())
}

pub struct EnrichmentPool<F: SessionFactory> {
    factory: Arc<F>,
    settings: Arc<WorkerSettings>,
    workers: usize,
}

impl<F: SessionFactory + 'static> EnrichmentPool<F> {
    pub fn new(factory: F, settings: WorkerSettings, workers: usize) -> Self {
        Self {
            factory: Arc::new(factory),
            settings: Arc::new(settings),
            workers: workers.max(1),
        }
    }

    /// Enriches every row of `input` into `output`.
    ///
    /// With `resume`, rows whose (name, address) is already in `output` are
    /// skipped. Empty input or missing columns fail before any browser work.
    pub async fn run(
        &self,
        input: &RecordTable,
        output: &Path,
        resume: bool,
        deadline: Deadline,
        events: Option<mpsc::UnboundedSender<RecordEvent>>,
    ) -> Result<EnrichSummary, PipelineError> {
        if input.is_empty() {
            return Err(PipelineError::InvalidInput(
                "no records to enrich".to_string(),
            ));
        }
        input.require_columns(REQUIRED_COLUMNS)?;

        let mut summary = EnrichSummary {
            input_rows: input.len(),
            ..EnrichSummary::default()
        };

        let headers = output_headers(input.headers(), &self.settings.columns);
        let pending = pending_rows(input, output, resume)?;
        let writer = AppendWriter::open(output, &headers)?;
        let input_headers = Arc::new(input.headers().to_vec());

        summary.resumed = input.len() - pending.len();
        if summary.resumed > 0 {
            tracing::info!(
                "Resuming: {} of {} rows already enriched",
                summary.resumed,
                input.len()
            );
        }
        if pending.is_empty() {
            return Ok(summary);
        }

        let ranges = chunk_ranges(pending.len(), self.workers);
        tracing::info!(
            "Enriching {} rows with {} workers",
            pending.len(),
            ranges.len()
        );

        let mut join_set = JoinSet::new();
        for (chunk_id, range) in ranges.into_iter().enumerate() {
            let rows = pending[range].to_vec();
            let factory = Arc::clone(&self.factory);
            let settings = Arc::clone(&self.settings);
            let headers = Arc::clone(&input_headers);
            let writer = writer.clone();
            let events = events.clone();
            join_set.spawn_blocking(move || {
                run_chunk(
                    chunk_id + 1,
                    &rows,
                    factory.as_ref(),
                    &settings,
                    &headers,
                    &writer,
                    deadline,
                    events.as_ref(),
                )
            });
        }
        drop(events);

        let mut first_err = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(chunk)) => summary.merge(&chunk),
                Ok(Err(e)) => {
                    tracing::error!("Enrichment worker failed: {}", e);
                    first_err.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!("Enrichment worker panicked: {}", e);
                    first_err.get_or_insert(PipelineError::from(e));
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        tracing::info!(
            "Enrichment finished: {} enriched, {} fallback, {} not processed",
            summary.enriched,
            summary.fallback,
            summary.not_processed
        );
        Ok(summary)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_chunk<F: SessionFactory + ?Sized>(
    chunk: usize,
    rows: &[(usize, StringRecord)],
    factory: &F,
    settings: &WorkerSettings,
    headers: &[String],
    writer: &AppendWriter,
    deadline: Deadline,
    events: Option<&mpsc::UnboundedSender<RecordEvent>>,
) -> Result<EnrichSummary, PipelineError> {
    let mut summary = EnrichSummary::default();
    let mut session: Option<F::Session> = None;
    let total = rows.len();

    for (pos, (row_no, row)) in rows.iter().enumerate() {
        if deadline.expired() {
            tracing::warn!(
                "Chunk {}: deadline reached, {} rows not processed",
                chunk,
                total - pos
            );
            summary.not_processed += total - pos;
            break;
        }

        let name = field(headers, row, NAME_COLUMN).to_string();
        tracing::info!("Chunk {}: processing {}/{} ({})", chunk, pos + 1, total, name);

        if session.is_none() {
            match create_session_with_retry(
                factory,
                settings.session_attempts,
                settings.session_backoff,
            ) {
                Ok(s) => session = Some(s),
                Err(e) => tracing::error!("Chunk {}: no browser session: {}", chunk, e),
            }
        }

        let result = match session.as_mut() {
            Some(s) => enrich_one(s, settings, headers, row),
            None => Err(PipelineError::Browser(BrowserError::Session(
                "session unavailable".to_string(),
            ))),
        };

        let (enrichment, outcome) = match result {
            Ok(e) => {
                let fields = e.found();
                (Some(e), RecordOutcome::Enriched { fields })
            }
            Err(e) => {
                tracing::error!("Chunk {}: row {} ({}) failed: {}", chunk, row_no, name, e);
                // Release the session; the next row gets a fresh one.
                session = None;
                (
                    None,
                    RecordOutcome::Fallback {
                        reason: e.to_string(),
                    },
                )
            }
        };

        let out = output_row(headers, row, &settings.columns, enrichment.as_ref());
        writer.append_fields(&out)?;
        match outcome {
            RecordOutcome::Enriched { .. } => summary.enriched += 1,
            RecordOutcome::Fallback { .. } => summary.fallback += 1,
        }
        tracing::info!("Chunk {}: saved {}", chunk, name);

        if let Some(tx) = events {
            let _ = tx.send(RecordEvent {
                chunk,
                row: *row_no,
                name,
                outcome,
            });
        }

        if pos + 1 < total {
            std::thread::sleep(settings.between_records.sample());
        }
    }

    Ok(summary)
}

fn field<'a>(headers: &[String], row: &'a StringRecord, name: &str) -> &'a str {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|i| row.get(i))
        .unwrap_or_default()
}

/// Map URL for a row: its own link, or a text search.
pub fn target_url(
    search_base: &str,
    headers: &[String],
    row: &StringRecord,
) -> Result<String, PipelineError> {
    let link = field(headers, row, MAPS_LINK_COLUMN).trim();
    if !link.is_empty() && link != MAPS_LINK_NOT_FOUND {
        return Ok(link.to_string());
    }
    search_url(
        search_base,
        field(headers, row, NAME_COLUMN),
        field(headers, row, ADDRESS_COLUMN),
        field(headers, row, CITY_COLUMN),
        field(headers, row, STATE_COLUMN),
    )
}

fn enrich_one<S: PageSession + ?Sized>(
    session: &mut S,
    settings: &WorkerSettings,
    headers: &[String],
    row: &StringRecord,
) -> Result<Enrichment, PipelineError> {
    let url = target_url(&settings.search_url, headers, row)?;
    session.navigate(&url)?;

    if let Err(e) = session.click(
        &settings.tab_selector,
        Some(&settings.about_tab_text),
        settings.about_tab_wait,
    ) {
        tracing::debug!("About tab not clickable for {}: {}", url, e);
    }
    for selector in &settings.wait_selectors {
        if let Err(e) = session.wait_for(selector, settings.element_wait) {
            tracing::debug!("{} on {}", e, url);
        }
    }

    let html = session.content()?;
    let current = session.current_url().unwrap_or_else(|_| url.clone());
    Ok(settings.parser.extract(&html, &current))
}

/// Input fields followed by enrichment values. Enrichment columns already in
/// the input are overwritten only when the page was scraped.
pub fn output_row(
    headers: &[String],
    row: &StringRecord,
    columns: &[String],
    enrichment: Option<&Enrichment>,
) -> Vec<String> {
    let fallback = Enrichment::default();
    let source = enrichment.unwrap_or(&fallback);
    let mut out: Vec<String> = (0..headers.len())
        .map(|i| row.get(i).unwrap_or_default().to_string())
        .collect();
    for c in columns {
        match headers.iter().position(|h| h == c) {
            Some(i) if enrichment.is_some() => out[i] = source.value(c),
            Some(_) => {}
            None => out.push(source.value(c)),
        }
    }
    out
}
