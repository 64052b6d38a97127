//! Static page driver
//!
//! Fetches a page over HTTP and reads the results element straight out of
//! the returned HTML. No scripts run, so it only completes for pages whose
//! results are already in the markup.

use super::ContainerState;
use crate::error::{BrowserError, Result};
use crate::suite::{ERROR_DIV_ID, RESULTS_DIV_ID};
use scraper::{Html, Selector};

pub struct HttpDriver {
    client: reqwest::Client,
    selectors: PageSelectors,
}

impl HttpDriver {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("js-test-tool/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BrowserError::LaunchFailed(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            selectors: PageSelectors::new()?,
        })
    }

    pub(crate) fn open_page(&self) -> StaticPage {
        StaticPage {
            client: self.client.clone(),
            selectors: self.selectors.clone(),
            body: None,
        }
    }
}

/// Id selectors for the results and error elements, parsed once per driver.
#[derive(Clone)]
struct PageSelectors {
    results: Selector,
    error: Selector,
}

impl PageSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            results: id_selector(RESULTS_DIV_ID)?,
            error: id_selector(ERROR_DIV_ID)?,
        })
    }
}

fn id_selector(id: &str) -> Result<Selector> {
    Selector::parse(&format!("#{}", id))
        .map_err(|e| BrowserError::Other(format!("selector for '{}': {}", id, e)))
}

pub(crate) struct StaticPage {
    client: reqwest::Client,
    selectors: PageSelectors,
    body: Option<String>,
}

impl StaticPage {
    pub(crate) async fn navigate(&mut self, url: &str) -> Result<Option<u16>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        log::debug!("Fetched {} ({}, {} bytes)", url, status, body.len());

        self.body = Some(body);
        Ok(Some(status))
    }

    pub(crate) fn body_text(&self) -> String {
        self.body.clone().unwrap_or_default()
    }

    pub(crate) fn container(&self) -> ContainerState {
        let Some(body) = self.body.as_deref() else {
            return ContainerState::Loading;
        };

        let document = Html::parse_document(body);
        let Some(results) = document.select(&self.selectors.results).next() else {
            return ContainerState::Missing;
        };

        ContainerState::Present {
            text: results.text().collect(),
            done: results.value().classes().any(|class| class == "done"),
            error: document
                .select(&self.selectors.error)
                .next()
                .map(|element| element.text().collect())
                .unwrap_or_default(),
        }
    }
}
