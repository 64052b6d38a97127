use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures while parsing and resolving a suite description.
#[derive(Error, Debug)]
pub enum SuiteDescriptionError {
    #[error("Root directory does not exist: {0}")]
    RootDirMissing(PathBuf),

    #[error("Root directory is not a directory: {0}")]
    RootDirNotDirectory(PathBuf),

    #[error("Could not read suite description {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in suite description: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Suite description must be a mapping of keys to values")]
    NotAMapping,

    #[error("Missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("No files found for '{0}'")]
    EmptyPathList(&'static str),

    #[error("Unsupported test runner '{0}'")]
    UnknownTestRunner(String),

    #[error("Suite name '{0}' is not URL-safe")]
    InvalidSuiteName(String),

    #[error("Invalid regular expression for '{key}': {source}")]
    InvalidPattern {
        key: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Path '{path}' in '{key}' resolves outside the root directory")]
    PathEscapesRoot { key: &'static str, path: String },

    #[error("Path '{path}' in '{key}' does not exist")]
    PathNotFound { key: &'static str, path: String },

    #[error("Path {0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    #[error("Failed to scan {path}: {reason}")]
    Scan { path: PathBuf, reason: String },
}

/// Failures while rendering a runner page.
#[derive(Error, Debug)]
pub enum SuiteRendererError {
    #[error("No runner page template for test runner '{0}'")]
    UnknownTestRunner(String),

    #[error("Failed to render runner page: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Which part of a result acquisition was in progress when it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Polling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Loading => f.write_str("loading"),
            Phase::Polling => f.write_str("polling"),
        }
    }
}

/// Every way a page result acquisition can end without results.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("HTTP error {status} loading {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Results element '#{id}' not found on {url}")]
    MissingResults { url: String, id: &'static str },

    #[error("Malformed results from {url}: {reason}")]
    MalformedPayload {
        url: String,
        reason: String,
        page_error: Option<String>,
    },

    #[error("Timed out after {timeout:?} while {phase} {url}")]
    Timeout {
        url: String,
        timeout: Duration,
        phase: Phase,
    },

    #[error("Browser has already been closed")]
    Closed,

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl BrowserError {
    /// True when the acquisition ended because the deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

/// Failures while starting the suite server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Two suites are named '{0}'")]
    DuplicateSuite(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BrowserError>;
