use std::path::Path;

use url::Url;

use crate::config::{DelayRange, PipelineConfig};
use crate::error::PipelineError;

pub const MAX_WORKERS: usize = 32;
pub const MAX_PAGES: u32 = 500;

/// Validate the enrichment worker count (must be 1..=32).
pub fn validate_workers(workers: usize) -> Result<usize, PipelineError> {
    if !(1..=MAX_WORKERS).contains(&workers) {
        return Err(PipelineError::InvalidInput(format!(
            "workers must be between 1 and {}",
            MAX_WORKERS
        )));
    }
    Ok(workers)
}

/// Validate the number of archive pages to walk (must be 1..=500).
pub fn validate_pages(pages: u32) -> Result<u32, PipelineError> {
    if !(1..=MAX_PAGES).contains(&pages) {
        return Err(PipelineError::InvalidInput(format!(
            "pages must be between 1 and {}",
            MAX_PAGES
        )));
    }
    Ok(pages)
}

/// Validate a delay range: non-negative, finite and ordered.
pub fn validate_delay(name: &str, range: &DelayRange) -> Result<(), PipelineError> {
    let ok = range.min_secs.is_finite()
        && range.max_secs.is_finite()
        && range.min_secs >= 0.0
        && range.min_secs <= range.max_secs;
    if !ok {
        return Err(PipelineError::InvalidInput(format!(
            "{} delay must satisfy 0 <= min_secs <= max_secs (got {}..{})",
            name, range.min_secs, range.max_secs
        )));
    }
    Ok(())
}

/// Validate a timeout in seconds (must be non-zero).
pub fn validate_timeout(name: &str, secs: u64) -> Result<u64, PipelineError> {
    if secs == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(secs)
}

/// Validate an absolute http(s) URL.
pub fn validate_url(name: &str, input: &str) -> Result<Url, PipelineError> {
    let url = Url::parse(input.trim())
        .map_err(|e| PipelineError::InvalidInput(format!("{} is not a valid URL: {}", name, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PipelineError::InvalidInput(format!(
            "{} must use http or https, got '{}'",
            name, other
        ))),
    }
}

/// Validate that an input file exists and is a regular file.
pub fn validate_input_file(path: &Path) -> Result<(), PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::InvalidInput(format!(
            "input file {} does not exist",
            path.display()
        )));
    }
    Ok(())
}

/// Validate the whole configuration before any work starts.
pub fn validate_config(config: &PipelineConfig) -> Result<(), PipelineError> {
    validate_url("scrape.base_url", &config.scrape.base_url)?;
    validate_url("enrich.search_url", &config.enrich.search_url)?;
    validate_pages(config.scrape.pages)?;
    validate_workers(config.enrich.workers)?;

    if config.scrape.user_agents.iter().all(|ua| ua.trim().is_empty()) {
        return Err(PipelineError::InvalidInput(
            "scrape.user_agents must contain at least one agent".to_string(),
        ));
    }
    if config.scrape.retry_attempts == 0 {
        return Err(PipelineError::InvalidInput(
            "scrape.retry_attempts must be >= 1".to_string(),
        ));
    }
    if config.browser.session_attempts == 0 {
        return Err(PipelineError::InvalidInput(
            "browser.session_attempts must be >= 1".to_string(),
        ));
    }
    if config.enrich.amenity_sections.is_empty() {
        return Err(PipelineError::InvalidInput(
            "enrich.amenity_sections must not be empty".to_string(),
        ));
    }

    validate_delay("scrape.between_articles", &config.scrape.between_articles)?;
    validate_delay("scrape.between_pages", &config.scrape.between_pages)?;
    validate_delay("enrich.between_records", &config.enrich.between_records)?;

    validate_timeout("scrape.request_timeout_secs", config.scrape.request_timeout_secs)?;
    validate_timeout("scrape.card_wait_secs", config.scrape.card_wait_secs)?;
    validate_timeout("scrape.city_fill_interval_secs", config.scrape.city_fill_interval_secs)?;
    validate_timeout(
        "browser.page_load_timeout_secs",
        config.browser.page_load_timeout_secs,
    )?;
    validate_timeout("enrich.element_wait_secs", config.enrich.element_wait_secs)?;
    validate_timeout("run.timeout_secs", config.run.timeout_secs)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- workers --

    #[test]
    fn workers_in_range() {
        assert_eq!(validate_workers(1).unwrap(), 1);
        assert_eq!(validate_workers(32).unwrap(), 32);
    }

    #[test]
    fn workers_zero_rejected() {
        assert!(validate_workers(0).is_err());
    }

    #[test]
    fn workers_too_many_rejected() {
        assert!(validate_workers(33).is_err());
    }

    // -- pages --

    #[test]
    fn pages_zero_rejected() {
        assert!(validate_pages(0).is_err());
        assert_eq!(validate_pages(3).unwrap(), 3);
    }

    // -- delays --

    #[test]
    fn delay_ordered_ok() {
        assert!(validate_delay("d", &DelayRange::new(1.0, 2.0)).is_ok());
        assert!(validate_delay("d", &DelayRange::none()).is_ok());
    }

    #[test]
    fn delay_reversed_rejected() {
        assert!(validate_delay("d", &DelayRange::new(3.0, 2.0)).is_err());
    }

    #[test]
    fn delay_negative_rejected() {
        assert!(validate_delay("d", &DelayRange::new(-1.0, 2.0)).is_err());
    }

    #[test]
    fn delay_nan_rejected() {
        assert!(validate_delay("d", &DelayRange::new(f64::NAN, 2.0)).is_err());
    }

    // -- urls --

    #[test]
    fn url_https_ok() {
        assert!(validate_url("u", "https://www.eater.com/maps/archives").is_ok());
    }

    #[test]
    fn url_other_scheme_rejected() {
        assert!(validate_url("u", "ftp://example.com").is_err());
    }

    #[test]
    fn url_garbage_rejected() {
        assert!(validate_url("u", "not a url").is_err());
    }

    // -- timeouts --

    #[test]
    fn timeout_zero_rejected() {
        assert!(validate_timeout("t", 0).is_err());
        assert_eq!(validate_timeout("t", 5).unwrap(), 5);
    }

    // -- whole config --

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&PipelineConfig::default()).is_ok());
    }

    #[test]
    fn empty_user_agents_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.scrape.user_agents = vec!["  ".to_string()];
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn empty_amenity_sections_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.enrich.amenity_sections.clear();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn input_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_input_file(&dir.path().join("missing.csv")).is_err());
        assert!(validate_input_file(dir.path()).is_err());
        let file = dir.path().join("present.csv");
        std::fs::write(&file, "a\n").unwrap();
        assert!(validate_input_file(&file).is_ok());
    }
}
