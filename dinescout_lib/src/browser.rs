//! Rendered-page sessions driven through a headless browser.
//!
//! Stages talk to [`PageSession`] and obtain sessions from a
//! [`SessionFactory`]; the production implementation is Chrome via
//! `headless_chrome`. A session owns its browser process, which is shut
//! down when the session is dropped. All calls block, so callers run them
//! on tokio's blocking pool.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};

use dinescout_api::user_agent::pick_user_agent;

use crate::config::BrowserConfig;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("session failure: {0}")]
    Session(String),
}

impl BrowserError {
    /// True when the session should be discarded and recreated.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Launch(_) | Self::Session(_))
    }
}

/// One rendered-page session.
pub trait PageSession: Send {
    /// Loads `url` and waits for the navigation to settle.
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Waits up to `timeout` for an element matching `selector`.
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Clicks the first element matching `selector` (and containing `text`,
    /// when given), waiting up to `timeout` for it to appear.
    fn click(
        &mut self,
        selector: &str,
        text: Option<&str>,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    fn reload(&mut self) -> Result<(), BrowserError>;

    /// Serialized DOM of the current page.
    fn content(&mut self) -> Result<String, BrowserError>;

    fn current_url(&mut self) -> Result<String, BrowserError>;
}

/// Creates sessions. Shared by reference across worker threads.
pub trait SessionFactory: Send + Sync {
    type Session: PageSession + 'static;

    fn create(&self) -> Result<Self::Session, BrowserError>;
}

/// Creates a session, retrying with exponential backoff. Blocks the calling
/// thread between attempts.
pub fn create_session_with_retry<F>(
    factory: &F,
    attempts: u32,
    backoff: Duration,
) -> Result<F::Session, BrowserError>
where
    F: SessionFactory + ?Sized,
{
    let attempts = attempts.max(1);
    let mut delay = backoff;
    let mut attempt = 1;
    loop {
        match factory.create() {
            Ok(session) => return Ok(session),
            Err(e) if attempt >= attempts => {
                tracing::error!(
                    "Giving up on browser session after {} attempts: {}",
                    attempt,
                    e
                );
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    "Browser session attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    delay
                );
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

/// Launches one Chrome process per session.
pub struct ChromeSessionFactory {
    config: BrowserConfig,
    user_agents: Vec<String>,
}

impl ChromeSessionFactory {
    pub fn new(config: BrowserConfig, user_agents: Vec<String>) -> Self {
        Self {
            config,
            user_agents,
        }
    }
}

impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    fn create(&self) -> Result<ChromeSession, BrowserError> {
        let flags: Vec<OsString> = self.config.args.iter().map(OsString::from).collect();
        let options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false)
            .window_size(Some((self.config.window_width, self.config.window_height)))
            .idle_browser_timeout(Duration::from_secs(self.config.idle_timeout_secs))
            .args(flags.iter().map(|f| f.as_os_str()).collect())
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::Session(e.to_string()))?;
        tab.set_default_timeout(Duration::from_secs(self.config.page_load_timeout_secs));
        let agent = pick_user_agent(&self.user_agents);
        tab.set_user_agent(&agent, Some("en-US,en;q=0.9"), None)
            .map_err(|e| BrowserError::Session(e.to_string()))?;

        tracing::debug!("Launched browser session");
        Ok(ChromeSession { browser, tab })
    }
}

/// A Chrome process with one tab.
pub struct ChromeSession {
    // Dropping the browser kills the process; keep it alive with the tab.
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
}

impl PageSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| navigation_error(url, e))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| navigation_error(url, e))?;
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|_| BrowserError::Timeout(selector.to_string()))
    }

    fn click(
        &mut self,
        selector: &str,
        text: Option<&str>,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.wait_for(selector, timeout)?;
        let elements = self
            .tab
            .find_elements(selector)
            .map_err(|_| BrowserError::Timeout(selector.to_string()))?;
        for element in elements {
            let matches = match text {
                Some(wanted) => element
                    .get_inner_text()
                    .map(|t| t.contains(wanted))
                    .unwrap_or(false),
                None => true,
            };
            if matches {
                element
                    .click()
                    .map_err(|e| BrowserError::Session(e.to_string()))?;
                return Ok(());
            }
        }
        Err(BrowserError::Timeout(format!(
            "{} containing {:?}",
            selector,
            text.unwrap_or_default()
        )))
    }

    fn reload(&mut self) -> Result<(), BrowserError> {
        self.tab
            .reload(false, None)
            .map_err(|e| BrowserError::Session(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| BrowserError::Session(e.to_string()))?;
        Ok(())
    }

    fn content(&mut self) -> Result<String, BrowserError> {
        self.tab
            .get_content()
            .map_err(|e| BrowserError::Session(e.to_string()))
    }

    fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.tab.get_url())
    }
}

fn navigation_error(url: &str, e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Navigation {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            tracing::debug!("Closing browser tab failed: {}", e);
        }
        tracing::debug!("Browser session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NullSession;

    impl PageSession for NullSession {
        fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            Ok(())
        }
        fn wait_for(&mut self, _s: &str, _t: Duration) -> Result<(), BrowserError> {
            Ok(())
        }
        fn click(&mut self, _s: &str, _x: Option<&str>, _t: Duration) -> Result<(), BrowserError> {
            Ok(())
        }
        fn reload(&mut self) -> Result<(), BrowserError> {
            Ok(())
        }
        fn content(&mut self) -> Result<String, BrowserError> {
            Ok(String::new())
        }
        fn current_url(&mut self) -> Result<String, BrowserError> {
            Ok(String::new())
        }
    }

    struct FlakyFactory {
        failures: u32,
        calls: AtomicU32,
    }

    impl SessionFactory for FlakyFactory {
        type Session = NullSession;

        fn create(&self) -> Result<NullSession, BrowserError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(BrowserError::Launch("boom".into()))
            } else {
                Ok(NullSession)
            }
        }
    }

    #[test]
    fn retry_succeeds_after_failures() {
        let factory = FlakyFactory {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        assert!(create_session_with_retry(&factory, 3, Duration::from_millis(1)).is_ok());
        assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retry_gives_up_with_last_error() {
        let factory = FlakyFactory {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let err = create_session_with_retry(&factory, 3, Duration::from_millis(1))
            .err()
            .unwrap();
        assert_eq!(err, BrowserError::Launch("boom".into()));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn fatal_classification() {
        assert!(BrowserError::Session("x".into()).is_fatal());
        assert!(BrowserError::Launch("x".into()).is_fatal());
        assert!(!BrowserError::Timeout("x".into()).is_fatal());
        assert!(!BrowserError::Navigation {
            url: "u".into(),
            reason: "r".into()
        }
        .is_fatal());
    }
}
