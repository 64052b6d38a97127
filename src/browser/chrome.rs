// spider_chrome re-exports chromiumoxide API
use super::ContainerState;
use crate::error::{BrowserError, Result};
use crate::suite::{ERROR_DIV_ID, RESULTS_DIV_ID};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::page::Page;
use chromiumoxide_fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reports where the current document is and what HTTP status it came with.
const LOAD_STATE_JS: &str = r#"
    (() => {
        const entry = performance.getEntriesByType("navigation")[0];
        return JSON.stringify({
            url: document.URL,
            status: entry && entry.responseStatus ? entry.responseStatus : null
        });
    })()
"#;

/// Reads the results and error elements; ids are substituted at runtime.
const CONTAINER_JS: &str = r#"
    (() => {
        if (document.readyState === "loading") {
            return JSON.stringify({ state: "loading" });
        }
        const results = document.getElementById("__RESULTS_ID__");
        if (!results) {
            return JSON.stringify({ state: "missing" });
        }
        const error = document.getElementById("__ERROR_ID__");
        return JSON.stringify({
            state: "present",
            text: results.textContent,
            done: results.classList.contains("done"),
            error: error ? error.textContent : ""
        });
    })()
"#;

const BODY_TEXT_JS: &str = r#"document.body ? document.body.innerText : """#;

/// Delay between checks while a navigation is committing.
const COMMIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Deserialize)]
struct LoadState {
    url: String,
    status: Option<u16>,
}

/// A launched Chrome process
pub struct ChromeDriver {
    browser: Option<Browser>,
    temp_dir: Option<PathBuf>,
}

impl ChromeDriver {
    /// Launch Chrome using the system installation, or a downloaded copy when
    /// none is found and no explicit path is given.
    pub async fn launch(chrome_path: Option<String>, no_sandbox: bool, headless: bool) -> Result<Self> {
        // Separate profile per instance so parallel runs don't share state
        let unique_id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let temp_dir = std::env::temp_dir().join(format!("js-test-tool-{}-{}", std::process::id(), unique_id));
        std::fs::create_dir_all(&temp_dir).map_err(|e| {
            BrowserError::LaunchFailed(format!("Failed to create temp directory: {}", e))
        })?;

        let mut config = if headless {
            BrowserConfig::builder()
        } else {
            BrowserConfig::builder().with_head()
        };

        config = config.user_data_dir(&temp_dir);

        // Linux AppArmor / container workaround
        if no_sandbox {
            config = config.arg("--no-sandbox");
        }

        if let Some(path) = chrome_path {
            config = config.chrome_executable(path);
        } else {
            match Self::ensure_chrome_installed().await {
                Ok(path) => {
                    config = config.chrome_executable(path);
                }
                Err(e) => {
                    // Let chromiumoxide look for a system Chrome instead
                    log::warn!("Chrome auto-download failed ({}), trying system Chrome", e);
                }
            }
        }

        let config = config.build().map_err(|e| BrowserError::LaunchFailed(launch_hint(&e)))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(launch_hint(&e.to_string())))?;

        // Spawn handler task
        tokio::spawn(async move {
            while (handler.next().await).is_some() {
                // Handle browser events
            }
        });

        log::info!("Chrome launched (headless: {})", headless);

        Ok(Self {
            browser: Some(browser),
            temp_dir: Some(temp_dir),
        })
    }

    /// Open a blank tab for one result acquisition.
    pub(crate) async fn open_page(&self) -> Result<ChromePage> {
        let browser = self.browser.as_ref().ok_or(BrowserError::Closed)?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Other(format!("Failed to create page: {}", e)))?;
        Ok(ChromePage { page })
    }

    /// Close the browser connection
    pub async fn close(mut self) -> Result<()> {
        if let Some(mut browser) = self.browser.take() {
            browser
                .close()
                .await
                .map_err(|e| BrowserError::Other(e.to_string()))?;
            log::info!("Chrome closed");
        }
        Ok(())
    }

    /// Ensure Chrome is installed, downloading if necessary
    async fn ensure_chrome_installed() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| BrowserError::Other("Cannot determine cache directory".to_string()))?
            .join("js-test-tool")
            .join("chrome");

        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| BrowserError::Other(format!("Failed to create cache dir: {}", e)))?;

        let revision_info_path = cache_dir.join(".downloaded");
        if revision_info_path.exists() {
            if let Some(executable) = Self::find_chrome_in_cache(&cache_dir) {
                return Ok(executable);
            }
        }

        log::info!("Downloading Chrome for Testing into {}", cache_dir.display());
        let fetcher = BrowserFetcher::new(
            BrowserFetcherOptions::builder()
                .with_path(&cache_dir)
                .build()
                .map_err(|e| BrowserError::Other(format!("Fetcher config failed: {}", e)))?,
        );

        let info = fetcher
            .fetch()
            .await
            .map_err(|e| BrowserError::Other(format!("Chrome download failed: {}", e)))?;

        tokio::fs::write(&revision_info_path, "downloaded")
            .await
            .map_err(|e| BrowserError::Other(format!("Failed to write marker: {}", e)))?;

        log::info!("Chrome downloaded to {}", info.executable_path.display());

        Ok(info.executable_path)
    }

    fn find_chrome_in_cache(cache_dir: &Path) -> Option<PathBuf> {
        let possible_paths = [
            cache_dir.join("chrome"),
            cache_dir.join("chrome.exe"),
            cache_dir.join("Google Chrome.app/Contents/MacOS/Google Chrome"),
            cache_dir.join("chrome-linux/chrome"),
            cache_dir.join("chrome-mac/Chromium.app/Contents/MacOS/Chromium"),
            cache_dir.join("chrome-win/chrome.exe"),
        ];

        possible_paths.into_iter().find(|path| path.exists())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}

fn launch_hint(error: &str) -> String {
    format!(
        "{}. \n\n\
         Chrome not found. You can:\n\
         - Install Chrome: https://www.google.com/chrome/\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium\n\
         - macOS: brew install --cask google-chrome\n\
         - Or specify path: --chrome-path /path/to/chrome\n\
         - Linux sandbox issue? Try: --no-sandbox",
        error
    )
}

/// One tab, used for a single page load.
pub(crate) struct ChromePage {
    page: Page,
}

impl ChromePage {
    /// Navigate and wait for the new document to commit. Returns the HTTP
    /// status when the browser exposes one.
    pub(crate) async fn navigate(&self, url: &str) -> Result<Option<u16>> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: format!("invalid URL: {}", e),
            })?;

        let response = self.page.execute(params).await.map_err(|e| {
            let reason = e.to_string();
            // "oneshot canceled" means the browser connection is gone
            if reason.contains("oneshot canceled") {
                BrowserError::NavigationFailed {
                    url: url.to_string(),
                    reason: "browser connection lost".to_string(),
                }
            } else {
                BrowserError::NavigationFailed {
                    url: url.to_string(),
                    reason,
                }
            }
        })?;

        if let Some(error_text) = &response.result.error_text {
            return Err(BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: error_text.clone(),
            });
        }

        loop {
            match self.evaluate_json::<LoadState>(LOAD_STATE_JS).await {
                Ok(state) if state.url != "about:blank" || url == "about:blank" => {
                    log::debug!("Committed {} with status {:?}", state.url, state.status);
                    return Ok(state.status);
                }
                Ok(_) => {}
                // The old execution context can vanish mid-navigation
                Err(e) => log::debug!("Load state not available yet: {}", e),
            }
            tokio::time::sleep(COMMIT_POLL_INTERVAL).await;
        }
    }

    pub(crate) async fn body_text(&self) -> Result<String> {
        let result = self.page.evaluate(BODY_TEXT_JS).await?;
        result
            .into_value::<String>()
            .map_err(|e| BrowserError::Other(format!("Failed to read page body: {}", e)))
    }

    pub(crate) async fn container(&self) -> Result<ContainerState> {
        let script = CONTAINER_JS
            .replace("__RESULTS_ID__", RESULTS_DIV_ID)
            .replace("__ERROR_ID__", ERROR_DIV_ID);
        self.evaluate_json(&script).await
    }

    pub(crate) async fn close(self) {
        if let Err(e) = self.page.close().await {
            log::warn!("Failed to close tab: {}", e);
        }
    }

    /// Evaluate a script that returns `JSON.stringify(...)` and decode it.
    async fn evaluate_json<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        let result = self.page.evaluate(script).await?;
        let json: String = result
            .into_value()
            .map_err(|e| BrowserError::Other(format!("Failed to read script result: {}", e)))?;
        serde_json::from_str(&json)
            .map_err(|e| BrowserError::Other(format!("Unexpected script result {}: {}", json, e)))
    }
}
