//! Local HTTP server for runner pages
//!
//! Serves each suite's rendered page, the suite files that page references,
//! and the runner assets. Each server binds its own port and shuts down
//! when dropped.

use crate::error::ServerError;
use crate::runner::{RunnerAssets, RUNNER_URL_PREFIX};
use crate::suite::{suite_page_path, SuiteDescription, SuiteRenderer};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use warp::http::StatusCode;
use warp::path::Tail;
use warp::reply::{Reply, Response};
use mime_guess::mime;
use warp::Filter;

/// How a [`SuiteServer`] is set up.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Port on 127.0.0.1; 0 picks a free one.
    pub port: u16,
    /// Directory holding the test framework files served under `/runner/`.
    pub runner_dir: Option<PathBuf>,
    /// Render pages with the interactive HTML reporter.
    pub dev_mode: bool,
}

struct ServerState {
    suites: HashMap<String, SuiteDescription>,
    renderer: SuiteRenderer,
    assets: RunnerAssets,
}

/// A running suite server
pub struct SuiteServer {
    addr: SocketAddr,
    suite_names: Vec<String>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl SuiteServer {
    pub async fn start(
        suites: Vec<SuiteDescription>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let mut by_name = HashMap::new();
        let mut suite_names = Vec::new();
        for suite in suites {
            let name = suite.suite_name().to_string();
            if by_name.contains_key(&name) {
                return Err(ServerError::DuplicateSuite(name));
            }
            suite_names.push(name.clone());
            by_name.insert(name, suite);
        }

        let state = Arc::new(ServerState {
            suites: by_name,
            renderer: SuiteRenderer::new(config.dev_mode),
            assets: RunnerAssets::new(config.runner_dir),
        });

        let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server = warp::serve(routes(state)).serve_incoming_with_graceful_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                shutdown_rx.await.ok();
            },
        );
        tokio::spawn(server);

        log::info!(
            "Serving {} suite(s) on http://{} (dev mode: {})",
            suite_names.len(),
            addr,
            config.dev_mode
        );

        Ok(Self {
            addr,
            suite_names,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Base URL, e.g. `http://127.0.0.1:12345`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Runner page URL for `suite_name`.
    pub fn suite_url(&self, suite_name: &str) -> String {
        format!("{}{}", self.url(), suite_page_path(suite_name))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Suite names in the order they were given.
    pub fn suite_names(&self) -> &[String] {
        &self.suite_names
    }
}

impl Drop for SuiteServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn routes(
    state: Arc<ServerState>,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let with_state = warp::any().map(move || state.clone());

    let suite_page = warp::path!("suite" / String)
        .and(warp::get())
        .and(with_state.clone())
        .and_then(serve_suite_page);

    let include = warp::path("suite")
        .and(warp::path::param::<String>())
        .and(warp::path("include"))
        .and(warp::path::tail())
        .and(warp::get())
        .and(with_state.clone())
        .and_then(serve_include);

    let runner = warp::path(RUNNER_URL_PREFIX.trim_start_matches('/'))
        .and(warp::path::tail())
        .and(warp::get())
        .and(with_state)
        .and_then(serve_runner_asset);

    suite_page
        .or(include)
        .unify()
        .or(runner)
        .unify()
        .with(warp::log("js_test_tool::server"))
}

async fn serve_suite_page(
    raw_name: String,
    state: Arc<ServerState>,
) -> Result<Response, Infallible> {
    let Some(name) = decode(&raw_name) else {
        return Ok(not_found());
    };
    let Some(suite) = state.suites.get(&name) else {
        log::debug!("No suite named '{}'", name);
        return Ok(not_found());
    };

    match state.renderer.render(&name, suite) {
        Ok(html) => Ok(warp::reply::html(html).into_response()),
        Err(e) => {
            log::error!("Failed to render suite '{}': {}", name, e);
            Ok(warp::reply::with_status(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response())
        }
    }
}

async fn serve_include(
    raw_name: String,
    tail: Tail,
    state: Arc<ServerState>,
) -> Result<Response, Infallible> {
    let (Some(name), Some(path)) = (decode(&raw_name), decode(tail.as_str())) else {
        return Ok(not_found());
    };
    let Some(suite) = state.suites.get(&name) else {
        return Ok(not_found());
    };

    // Only files the suite resolved are reachable
    if !suite.all_paths().any(|resolved| resolved == path) {
        log::debug!("'{}' is not part of suite '{}'", path, name);
        return Ok(not_found());
    }

    let full = suite.root_dir().join(&path);
    match tokio::fs::read(&full).await {
        Ok(bytes) => Ok(with_content_type(bytes, &path)),
        Err(e) => {
            log::warn!("Failed to read {}: {}", full.display(), e);
            Ok(not_found())
        }
    }
}

async fn serve_runner_asset(tail: Tail, state: Arc<ServerState>) -> Result<Response, Infallible> {
    let Some(path) = decode(tail.as_str()) else {
        return Ok(not_found());
    };

    match state.assets.load(&path).await {
        Some(bytes) => Ok(with_content_type(bytes, &path)),
        None => {
            log::debug!("No runner asset '{}'", path);
            Ok(not_found())
        }
    }
}

fn decode(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(|decoded| decoded.into_owned())
}

fn not_found() -> Response {
    warp::reply::with_status("Not Found", StatusCode::NOT_FOUND).into_response()
}

fn with_content_type(bytes: Vec<u8>, path: &str) -> Response {
    warp::reply::with_header(bytes, "content-type", content_type(path)).into_response()
}

fn content_type(path: &str) -> String {
    let guess = mime_guess::from_path(path).first_or_octet_stream();
    if guess.type_() == mime::TEXT || guess.subtype() == mime::JAVASCRIPT {
        format!("{}; charset=utf-8", guess.essence_str())
    } else {
        guess.essence_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        let js = content_type("src/player.js");
        assert!(js.contains("javascript") && js.ends_with("; charset=utf-8"), "{}", js);
        assert_eq!(content_type("jasmine/jasmine.CSS"), "text/css; charset=utf-8");
        assert_eq!(content_type("spec/fixtures/page.html"), "text/html; charset=utf-8");
        assert_eq!(content_type("spec/fixtures/data.json"), "application/json");
        assert_eq!(content_type("spec/fixtures/logo.png"), "image/png");
        assert_eq!(content_type("README"), "application/octet-stream");
    }

    #[test]
    fn test_decode_percent_escapes() {
        assert_eq!(decode("spec/my%20spec.js").as_deref(), Some("spec/my spec.js"));
        assert_eq!(decode("caf%C3%A9").as_deref(), Some("café"));
        assert_eq!(decode("%FF"), None);
    }
}
