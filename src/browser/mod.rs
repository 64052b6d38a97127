//! Result acquisition from served runner pages.
//!
//! A call to [`Browser::get_page_results`] moves through
//! `Loading -> Polling -> Completed | TimedOut | Errored` under one deadline
//! fixed when the call starts. Nothing is retried except the container poll.

pub mod chrome;
pub mod http;
pub mod results;

pub use chrome::ChromeDriver;
pub use http::HttpDriver;
pub use results::{parse_results, TestResult, TestStatus};

use crate::error::{BrowserError, Phase, Result};
use crate::suite::RESULTS_DIV_ID;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default wall-clock budget for one page.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between looks at the results element.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on closing a tab after an acquisition.
const CLOSE_PAGE_TIMEOUT: Duration = Duration::from_secs(2);

/// Which browser runs the pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserKind {
    /// Launch Chrome (system install or auto-downloaded)
    Chrome {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Fetch pages over HTTP without running scripts
    Static,
}

impl BrowserKind {
    /// Headless Chrome, adding `--no-sandbox` when running under CI.
    pub fn chrome_auto() -> Self {
        let is_ci = std::env::var("CI").is_ok()
            || std::env::var("GITHUB_ACTIONS").is_ok()
            || std::env::var("GITLAB_CI").is_ok()
            || std::env::var("JENKINS_HOME").is_ok()
            || std::env::var("CIRCLECI").is_ok();

        BrowserKind::Chrome {
            chrome_path: None,
            no_sandbox: is_ci,
            headless: true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BrowserKind::Chrome { .. } => "chrome",
            BrowserKind::Static => "static",
        }
    }
}

/// What the page currently shows at the results element.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub(crate) enum ContainerState {
    /// Document still parsing; absence means nothing yet.
    Loading,
    Missing,
    Present {
        text: String,
        done: bool,
        error: String,
    },
}

enum Driver {
    Chrome(ChromeDriver),
    Static(HttpDriver),
}

impl Driver {
    async fn open_page(&self) -> Result<PageHandle> {
        match self {
            Driver::Chrome(chrome) => Ok(PageHandle::Chrome(chrome.open_page().await?)),
            Driver::Static(http) => Ok(PageHandle::Static(http.open_page())),
        }
    }
}

enum PageHandle {
    Chrome(chrome::ChromePage),
    Static(http::StaticPage),
}

impl PageHandle {
    async fn navigate(&mut self, url: &str) -> Result<Option<u16>> {
        match self {
            PageHandle::Chrome(page) => page.navigate(url).await,
            PageHandle::Static(page) => page.navigate(url).await,
        }
    }

    async fn body_text(&self) -> Result<String> {
        match self {
            PageHandle::Chrome(page) => page.body_text().await,
            PageHandle::Static(page) => Ok(page.body_text()),
        }
    }

    async fn container(&self) -> Result<ContainerState> {
        match self {
            PageHandle::Chrome(page) => page.container().await,
            PageHandle::Static(page) => Ok(page.container()),
        }
    }

    /// Close the tab without running past `deadline`. Once the deadline has
    /// gone the close finishes in the background.
    async fn close(self, deadline: Instant) {
        let PageHandle::Chrome(page) = self else {
            return;
        };
        match close_budget(deadline, Instant::now()) {
            Some(budget) => {
                if tokio::time::timeout(budget, page.close()).await.is_err() {
                    log::warn!("Timed out closing tab");
                }
            }
            None => {
                tokio::spawn(async move {
                    if tokio::time::timeout(CLOSE_PAGE_TIMEOUT, page.close())
                        .await
                        .is_err()
                    {
                        log::warn!("Timed out closing tab");
                    }
                });
            }
        }
    }
}

/// Time left for closing a tab, or `None` when the deadline has passed.
fn close_budget(deadline: Instant, now: Instant) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(now);
    (!remaining.is_zero()).then(|| remaining.min(CLOSE_PAGE_TIMEOUT))
}

/// Loads runner pages and harvests their results.
pub struct Browser {
    driver: Option<Driver>,
    timeout: Duration,
    poll_interval: Duration,
}

impl Browser {
    pub async fn launch(kind: BrowserKind) -> Result<Self> {
        let driver = match kind {
            BrowserKind::Chrome {
                chrome_path,
                no_sandbox,
                headless,
            } => Driver::Chrome(ChromeDriver::launch(chrome_path, no_sandbox, headless).await?),
            BrowserKind::Static => Driver::Static(HttpDriver::new()?),
        };

        Ok(Self {
            driver: Some(driver),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Wall-clock budget for each `get_page_results` call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Load `url` and wait for the runner page to publish its results.
    pub async fn get_page_results(&self, url: &str) -> Result<Vec<TestResult>> {
        let driver = self.driver.as_ref().ok_or(BrowserError::Closed)?;
        let deadline = Instant::now() + self.timeout;
        log::info!("Loading {} (timeout {:?})", url, self.timeout);

        let mut page = self
            .within(deadline, url, Phase::Loading, driver.open_page())
            .await?;

        let outcome = self.acquire(&mut page, url, deadline).await;
        page.close(deadline).await;

        match &outcome {
            Ok(results) => log::info!("Collected {} result(s) from {}", results.len(), url),
            Err(e) => log::warn!("No results from {}: {}", url, e),
        }
        outcome
    }

    async fn acquire(
        &self,
        page: &mut PageHandle,
        url: &str,
        deadline: Instant,
    ) -> Result<Vec<TestResult>> {
        let status = self
            .within(deadline, url, Phase::Loading, page.navigate(url))
            .await?;

        if let Some(status) = status {
            if !(200..300).contains(&status) {
                let body = self
                    .within(deadline, url, Phase::Loading, page.body_text())
                    .await
                    .unwrap_or_default();
                return Err(BrowserError::Http {
                    url: url.to_string(),
                    status,
                    body,
                });
            }
        }

        self.within(deadline, url, Phase::Polling, self.poll(page, url))
            .await
    }

    async fn poll(&self, page: &PageHandle, url: &str) -> Result<Vec<TestResult>> {
        let mut polls = 0u32;
        loop {
            polls += 1;
            match page.container().await? {
                ContainerState::Loading => {}
                ContainerState::Missing => {
                    return Err(BrowserError::MissingResults {
                        url: url.to_string(),
                        id: RESULTS_DIV_ID,
                    });
                }
                ContainerState::Present { text, done, error } => {
                    if done || !text.trim().is_empty() {
                        log::debug!("Results ready after {} poll(s)", polls);
                        return parse_results(&text).map_err(|e| BrowserError::MalformedPayload {
                            url: url.to_string(),
                            reason: e.to_string(),
                            page_error: Some(error).filter(|text| !text.trim().is_empty()),
                        });
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Run `step`, turning a missed deadline into a timeout for `phase`.
    async fn within<T>(
        &self,
        deadline: Instant,
        url: &str,
        phase: Phase,
        step: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout_at(deadline, step)
            .await
            .map_err(|_| BrowserError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
                phase,
            })?
    }

    /// Release the underlying browser. Safe to call more than once.
    pub async fn quit(&mut self) -> Result<()> {
        match self.driver.take() {
            Some(Driver::Chrome(chrome)) => chrome.close().await,
            Some(Driver::Static(_)) | None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_budget_respects_deadline() {
        let now = Instant::now();
        assert_eq!(close_budget(now, now), None);
        assert_eq!(close_budget(now, now + Duration::from_millis(5)), None);
        assert_eq!(
            close_budget(now + Duration::from_millis(300), now),
            Some(Duration::from_millis(300))
        );
        assert_eq!(
            close_budget(now + Duration::from_secs(30), now),
            Some(CLOSE_PAGE_TIMEOUT)
        );
    }
}
