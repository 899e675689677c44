//! HTTP client for the listing site's map archive.

use std::time::Duration;

use url::Url;

use crate::{user_agent::pick_user_agent, Error};

/// Archive of map-style restaurant round-ups scraped by default.
pub const DEFAULT_ARCHIVE_URL: &str = "https://www.eater.com/maps/archives";

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the listing site's paginated archive.
///
/// Every request builds a fresh `reqwest::Client` with a user agent drawn
/// from the configured pool, so consecutive requests rotate identities.
/// Failed requests are retried a bounded number of times with a fixed
/// delay between attempts.
pub struct Client {
    /// Archive URL; page 1 is the bare URL, later pages add `?page=N`.
    base_url: String,
    user_agents: Vec<String>,
    max_attempts: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a client pointing at the production archive.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_ARCHIVE_URL)
    }

    /// Creates a client with a custom archive URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agents: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replaces the user-agent pool. An empty pool uses the built-in agents.
    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        self.user_agents = user_agents;
        self
    }

    /// Sets the attempt budget and the delay between attempts.
    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of archive page `page` (1-based).
    pub fn archive_url(&self, page: u32) -> String {
        if page <= 1 {
            self.base_url.clone()
        } else {
            format!("{}?page={}", self.base_url, page)
        }
    }

    /// Resolves a possibly relative article link against the archive URL.
    pub fn resolve_link(&self, href: &str) -> Result<String, Error> {
        let base = Url::parse(&self.base_url).map_err(|e| {
            tracing::error!("Invalid archive URL {}: {}", self.base_url, e);
            Error::InvalidUrl(self.base_url.clone())
        })?;
        base.join(href)
            .map(String::from)
            .map_err(|_| Error::InvalidUrl(href.to_string()))
    }

    /// Fetches the HTML of archive page `page`, retrying transient failures.
    pub async fn archive_page(&self, page: u32) -> Result<String, Error> {
        let url = self.archive_url(page);
        self.get_html_with_retry(&url).await
    }

    /// Fetches `url`, making up to `max_attempts` attempts. The error of the
    /// last attempt is returned when every attempt fails.
    pub async fn get_html_with_retry(&self, url: &str) -> Result<String, Error> {
        let mut attempt = 1;
        loop {
            match self.get_html(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!("Giving up on {} after {} attempts: {}", url, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        self.max_attempts,
                        url,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn get_html(&self, url: &str) -> Result<String, Error> {
        let client = reqwest::Client::builder()
            .user_agent(pick_user_agent(&self.user_agents))
            .timeout(self.timeout)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })?;
        let resp = client
            .get(url)
            .header("accept", "text/html,application/xhtml+xml")
            .header("accept-language", "en-US,en;q=0.9")
            .header("cache-control", "no-cache")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get {}: {}", url, e);
                Error::RequestFailed
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            Error::RequestFailed
        })?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_bare_archive_url() {
        let client = Client::with_base_url("https://example.com/maps/archives/");
        assert_eq!(client.archive_url(1), "https://example.com/maps/archives");
        assert_eq!(
            client.archive_url(4),
            "https://example.com/maps/archives?page=4"
        );
    }

    #[test]
    fn resolves_relative_article_links() {
        let client = Client::with_base_url("https://example.com/maps/archives");
        assert_eq!(
            client.resolve_link("/maps/best-tacos").unwrap(),
            "https://example.com/maps/best-tacos"
        );
        assert_eq!(
            client.resolve_link("https://other.example/maps/x").unwrap(),
            "https://other.example/maps/x"
        );
    }

    #[test]
    fn truncates_long_bodies_on_char_boundary() {
        let body = "é".repeat(1500);
        let out = truncate_body(&body);
        assert!(out.ends_with("...[truncated]"));
    }
}
