//! Pipeline configuration: TOML file, environment overrides, defaults.
//!
//! Every field has a default so an empty (or absent) file is a valid
//! configuration. Environment variables are applied on top of the file and
//! the CLI applies its flags last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dinescout_api::types::DEFAULT_AMENITY_SECTIONS;
use dinescout_api::user_agent::DEFAULT_USER_AGENTS;
use dinescout_api::DEFAULT_ARCHIVE_URL;
use serde::{Deserialize, Serialize};

pub const ENV_BASE_URL: &str = "DINESCOUT_BASE_URL";
pub const ENV_WORKERS: &str = "DINESCOUT_WORKERS";
pub const ENV_DB: &str = "DINESCOUT_DB";
pub const ENV_TIMEOUT_SECS: &str = "DINESCOUT_TIMEOUT_SECS";
pub const ENV_DATA_DIR: &str = "DINESCOUT_DATA_DIR";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: {value}")]
    Env { var: String, value: String },
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub scrape: ScrapeConfig,
    pub browser: BrowserConfig,
    pub enrich: EnrichConfig,
    pub run: RunConfig,
}

impl PipelineConfig {
    /// Loads `path`, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `DINESCOUT_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Applies overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.scrape.base_url = url;
        }
        if let Some(raw) = lookup(ENV_WORKERS) {
            self.enrich.workers = parse_env(ENV_WORKERS, &raw)?;
        }
        if let Some(db) = lookup(ENV_DB) {
            self.paths.database = PathBuf::from(db);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.run.timeout_secs = parse_env(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.paths.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: raw.to_string(),
    })
}

/// Locations of the stage files. Relative paths resolve against `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub raw: PathBuf,
    pub cleaned: PathBuf,
    pub enriched: PathBuf,
    pub missing: PathBuf,
    pub database: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            raw: PathBuf::from("raw/raw_restaurants.csv"),
            cleaned: PathBuf::from("raw/cleaned_restaurants.csv"),
            enriched: PathBuf::from("processed/cleaned_restaurants_enhanced.csv"),
            missing: PathBuf::from("processed/missing_restaurants.csv"),
            database: PathBuf::from("restaurants.db"),
        }
    }
}

impl PathsConfig {
    pub fn raw_path(&self) -> PathBuf {
        self.data_dir.join(&self.raw)
    }

    pub fn cleaned_path(&self) -> PathBuf {
        self.data_dir.join(&self.cleaned)
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.data_dir.join(&self.enriched)
    }

    pub fn missing_path(&self) -> PathBuf {
        self.data_dir.join(&self.missing)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }
}

/// A `[min, max]` range of seconds to sleep between units of work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub const fn none() -> Self {
        Self::new(0.0, 0.0)
    }

    /// A uniformly random duration within the range.
    pub fn sample(&self) -> Duration {
        use rand::Rng;
        if self.max_secs <= self.min_secs {
            return Duration::from_secs_f64(self.min_secs.max(0.0));
        }
        let secs = rand::thread_rng().gen_range(self.min_secs..=self.max_secs);
        Duration::from_secs_f64(secs.max(0.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub base_url: String,
    /// Number of archive pages to walk, starting at page 1.
    pub pages: u32,
    pub user_agents: Vec<String>,
    pub between_articles: DelayRange,
    pub between_pages: DelayRange,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    /// Bounded wait for the listing cards of a rendered article.
    pub card_wait_secs: u64,
    pub city_fill_interval_secs: u64,
    pub selectors: ListingSelectors,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARCHIVE_URL.to_string(),
            pages: 1,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            between_articles: DelayRange::new(5.0, 10.0),
            between_pages: DelayRange::new(2.0, 5.0),
            retry_attempts: 3,
            retry_delay_secs: 5,
            request_timeout_secs: 30,
            card_wait_secs: 30,
            city_fill_interval_secs: 300,
            selectors: ListingSelectors::default(),
        }
    }
}

/// CSS selectors for the archive and article pages of the listing site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub article_link: String,
    pub card: String,
    pub name: String,
    pub description: String,
    pub info: String,
    pub address: String,
    pub info_row: String,
    pub info_icon: String,
    pub phone_icon: String,
    pub website_icon: String,
    pub phone_link: String,
    pub embeds: String,
    pub venue_id_attr: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            article_link: "div.c-compact-river__entry a".to_string(),
            card: "section.c-mapstack__card".to_string(),
            name: "h1".to_string(),
            description: "div.c-entry-content.venu-card p".to_string(),
            info: "div.c-mapstack__info".to_string(),
            address: "div.c-mapstack__address".to_string(),
            info_row: "div.info".to_string(),
            info_icon: "div.info-icon svg use".to_string(),
            phone_icon: "#icon-phone".to_string(),
            website_icon: "#icon-world".to_string(),
            phone_link: "div.c-mapstack__phone-url a".to_string(),
            embeds: "div.c-mapstack__video iframe, div.c-mapstack__card-media iframe".to_string(),
            venue_id_attr: "data-venue-id".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Extra Chrome command-line flags.
    pub args: Vec<String>,
    pub page_load_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub session_attempts: u32,
    /// First backoff between session attempts; doubled after each failure.
    pub session_backoff_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            args: [
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--disable-notifications",
                "--disable-infobars",
                "--ignore-certificate-errors",
                "--disable-software-rasterizer",
                "--disable-webgl",
                "--log-level=3",
                "--silent",
            ]
            .iter()
            .map(|a| a.to_string())
            .collect(),
            page_load_timeout_secs: 30,
            idle_timeout_secs: 300,
            session_attempts: 3,
            session_backoff_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub workers: usize,
    /// Text-search URL used when a record has no map link.
    pub search_url: String,
    pub element_wait_secs: u64,
    pub about_tab_wait_secs: u64,
    pub between_records: DelayRange,
    /// Amenity section titles written as enrichment columns.
    pub amenity_sections: Vec<String>,
    pub selectors: MapSelectors,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            search_url: "https://www.google.com/maps/search/".to_string(),
            element_wait_secs: 10,
            about_tab_wait_secs: 15,
            between_records: DelayRange::new(2.0, 4.0),
            amenity_sections: DEFAULT_AMENITY_SECTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            selectors: MapSelectors::default(),
        }
    }
}

/// CSS selectors for a map-provider place page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSelectors {
    /// Tab buttons; the one whose text contains `about_tab_text` is clicked.
    pub tab: String,
    pub about_tab_text: String,
    pub star_rating: String,
    pub reviews: String,
    pub category: String,
    pub price_range: String,
    pub section: String,
    pub section_title: String,
    pub section_item: String,
    /// Class fragment marking an item as not offered.
    pub unavailable_class: String,
    /// Sub-element whose presence marks an item as not offered.
    pub unavailable_badge: String,
}

impl Default for MapSelectors {
    fn default() -> Self {
        Self {
            tab: "button[role='tab']".to_string(),
            about_tab_text: "About".to_string(),
            star_rating: "span.ceNzKf".to_string(),
            reviews: "span[aria-label*='reviews']".to_string(),
            category: "button[jsaction='pane.rating.category']".to_string(),
            price_range: "span[aria-label^='Price']".to_string(),
            section: "div.iP2t7d".to_string(),
            section_title: "h2.iL3Qke".to_string(),
            section_item: "div.iNvpkb".to_string(),
            unavailable_class: "unavailable".to_string(),
            unavailable_badge: "span[aria-label^='No ']".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Wall-clock budget for one CLI invocation.
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { timeout_secs: 1800 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.enrich.workers, 4);
        assert_eq!(cfg.scrape.base_url, DEFAULT_ARCHIVE_URL);
        assert_eq!(cfg.scrape.retry_attempts, 3);
        assert_eq!(cfg.run.timeout_secs, 1800);
        assert_eq!(cfg.enrich.amenity_sections.len(), 11);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            [enrich]
            workers = 8

            [enrich.selectors]
            star_rating = "span.rating"

            [scrape.between_articles]
            min_secs = 0.0
            max_secs = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.enrich.workers, 8);
        assert_eq!(cfg.enrich.selectors.star_rating, "span.rating");
        assert_eq!(cfg.enrich.selectors.section, "div.iP2t7d");
        assert_eq!(cfg.scrape.between_articles, DelayRange::new(0.0, 1.0));
        assert_eq!(cfg.scrape.pages, 1);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "http://localhost:9000/archive"),
            (ENV_WORKERS, "2"),
            (ENV_DB, "/tmp/x.db"),
            (ENV_TIMEOUT_SECS, "60"),
            (ENV_DATA_DIR, "/srv/data"),
        ]
        .into_iter()
        .collect();
        let mut cfg = PipelineConfig::default();
        cfg.apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.scrape.base_url, "http://localhost:9000/archive");
        assert_eq!(cfg.enrich.workers, 2);
        assert_eq!(cfg.run.timeout_secs, 60);
        assert_eq!(cfg.paths.database_path(), PathBuf::from("/tmp/x.db"));
        assert_eq!(
            cfg.paths.raw_path(),
            PathBuf::from("/srv/data/raw/raw_restaurants.csv")
        );
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut cfg = PipelineConfig::default();
        let err = cfg
            .apply_env_from(|k| (k == ENV_WORKERS).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }

    #[test]
    fn delay_sample_stays_in_range() {
        let range = DelayRange::new(0.5, 1.5);
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_secs_f64(0.5));
            assert!(d <= Duration::from_secs_f64(1.5));
        }
        assert_eq!(DelayRange::none().sample(), Duration::ZERO);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PipelineConfig::load(Some(Path::new("/nonexistent/dinescout.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
