//! Test frameworks and the assets served under `/runner/`.
//!
//! Reporter glue written for this tool is embedded in the binary. Framework
//! files themselves (`jasmine.js`, `boot.js`, ...) are read from a runner
//! directory supplied at startup.

use crate::suite::paths::normalize_relative;
use std::fmt;
use std::path::{Path, PathBuf};

/// URL namespace for runner assets.
pub const RUNNER_URL_PREFIX: &str = "/runner";

/// First script on every page.
pub const STUB_DIALOGS_JS: &str = include_str!("assets/stub_dialogs.js");

/// Buffers errors thrown before a reporter is installed.
pub const ERROR_CAPTURE_JS: &str = include_str!("assets/error_capture.js");

const EMBEDDED: [(&str, &str); 2] = [
    (
        "jasmine/jasmine-json.js",
        include_str!("assets/jasmine/jasmine-json.js"),
    ),
    (
        "jasmine2/jasmine-json.js",
        include_str!("assets/jasmine2/jasmine-json.js"),
    ),
];

/// Supported test frameworks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestRunner {
    /// Jasmine 1.3
    Jasmine,
    /// Jasmine 2.x, started by its own `boot.js`
    Jasmine2,
}

impl TestRunner {
    pub const ALL: [TestRunner; 2] = [TestRunner::Jasmine, TestRunner::Jasmine2];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|runner| runner.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            TestRunner::Jasmine => "jasmine",
            TestRunner::Jasmine2 => "jasmine2",
        }
    }

    /// Framework scripts, relative to `/runner/`, in load order.
    pub fn scripts(self, dev_mode: bool) -> &'static [&'static str] {
        match (self, dev_mode) {
            (TestRunner::Jasmine, false) => &["jasmine/jasmine.js", "jasmine/jasmine-json.js"],
            (TestRunner::Jasmine, true) => &["jasmine/jasmine.js", "jasmine/jasmine-html.js"],
            (TestRunner::Jasmine2, false) => &[
                "jasmine2/jasmine.js",
                "jasmine2/jasmine-html.js",
                "jasmine2/boot.js",
                "jasmine2/jasmine-json.js",
            ],
            (TestRunner::Jasmine2, true) => &[
                "jasmine2/jasmine.js",
                "jasmine2/jasmine-html.js",
                "jasmine2/boot.js",
            ],
        }
    }

    /// Stylesheets, only used by the HTML reporter.
    pub fn stylesheets(self, dev_mode: bool) -> &'static [&'static str] {
        match (self, dev_mode) {
            (_, false) => &[],
            (TestRunner::Jasmine, true) => &["jasmine/jasmine.css"],
            (TestRunner::Jasmine2, true) => &["jasmine2/jasmine.css"],
        }
    }

    /// Inline script that wires a reporter and starts the run.
    pub fn reporter_glue(self, dev_mode: bool) -> &'static str {
        match (self, dev_mode) {
            (TestRunner::Jasmine, false) => include_str!("assets/jasmine/json-runner.js"),
            (TestRunner::Jasmine, true) => include_str!("assets/jasmine/html-runner.js"),
            (TestRunner::Jasmine2, false) => include_str!("assets/jasmine2/json-runner.js"),
            (TestRunner::Jasmine2, true) => include_str!("assets/jasmine2/html-runner.js"),
        }
    }
}

impl fmt::Display for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lookup for everything under `/runner/`.
#[derive(Debug, Clone, Default)]
pub struct RunnerAssets {
    dir: Option<PathBuf>,
}

impl RunnerAssets {
    pub fn new(dir: Option<PathBuf>) -> Self {
        if dir.is_none() {
            log::warn!("No runner directory configured; only embedded runner assets are served");
        }
        Self { dir }
    }

    /// Asset compiled into the binary, if `path` names one.
    pub fn embedded(path: &str) -> Option<&'static str> {
        EMBEDDED
            .iter()
            .find(|(name, _)| *name == path)
            .map(|(_, body)| *body)
    }

    /// Contents of the asset at `path` (relative to `/runner/`).
    pub async fn load(&self, path: &str) -> Option<Vec<u8>> {
        if let Some(body) = Self::embedded(path) {
            return Some(body.as_bytes().to_vec());
        }

        let dir = self.dir.as_deref()?;
        let relative = normalize_relative(dir, Path::new(path))?;
        let full = dir.join(relative);

        match tokio::fs::read(&full).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to read runner asset {}: {}", full.display(), e);
                }
                None
            }
        }
    }

    /// Framework scripts `runner` loads that this lookup cannot supply.
    pub async fn missing_scripts(&self, runner: TestRunner, dev_mode: bool) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for path in runner.scripts(dev_mode) {
            if self.load(path).await.is_none() {
                missing.push(*path);
            }
        }
        missing
    }
}
