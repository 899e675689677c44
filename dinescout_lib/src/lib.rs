//! Library layer for DineScout: listing scraper, address cleaning, map
//! enrichment and the SQLite store.
//!
//! Wraps the `dinescout_api` listing client with browser-driven scraping,
//! CSV record files shared between stages, and the loader that upserts the
//! enriched file into SQLite.

pub mod address;
pub mod browser;
pub mod clean;
pub mod config;
pub mod db;
pub mod deadline;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod listing;
pub mod maps;
pub mod records;
pub mod report;
pub mod scrape;
pub mod validation;

pub use dinescout_api;
pub use dinescout_api::types;

pub use browser::{BrowserError, ChromeSessionFactory, PageSession, SessionFactory};
pub use clean::{clean_file, CleanSummary};
pub use config::{ConfigError, PipelineConfig};
pub use db::{Db, DbError, LoadSummary};
pub use deadline::Deadline;
pub use enrich::{
    pending_rows, EnrichSummary, EnrichmentPool, RecordEvent, RecordOutcome, WorkerSettings,
};
pub use error::PipelineError;
pub use listing::ListingParser;
pub use maps::MapParser;
pub use records::{RecordFileError, RecordTable};
pub use report::write_missing_report;
pub use scrape::{ListingScraper, ScrapeSettings, ScrapeSummary};
