//! Suite Renderer
//!
//! Renders the HTML page that runs a suite's specs in a browser and exposes
//! the results in a fixed DOM location.

use super::description::{PathView, SuiteSource};
use crate::error::SuiteRendererError;
use crate::runner::{TestRunner, ERROR_CAPTURE_JS, RUNNER_URL_PREFIX, STUB_DIALOGS_JS};
use handlebars::Handlebars;
use serde::Serialize;

/// Id of the element holding the JSON results array.
pub const RESULTS_DIV_ID: &str = "js_test_tool_results";

/// Id of the element holding uncaught error text.
pub const ERROR_DIV_ID: &str = "js_test_tool_error";

/// URL namespace for suite pages.
pub const SUITE_URL_PREFIX: &str = "/suite";

const RUNNER_PAGE_TEMPLATE: &str = include_str!("templates/runner_page.html.hbs");

/// Path of the runner page for `suite_name`.
pub fn suite_page_path(suite_name: &str) -> String {
    format!("{}/{}", SUITE_URL_PREFIX, urlencoding::encode(suite_name))
}

/// Path prefix under which a suite's own files are served.
pub fn include_path_prefix(suite_name: &str) -> String {
    format!(
        "{}/{}/include",
        SUITE_URL_PREFIX,
        urlencoding::encode(suite_name)
    )
}

/// Percent-encode each segment of a `/`-joined relative path.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Serialize)]
struct PageContext<'a> {
    suite_name: &'a str,
    runner_name: &'static str,
    stub_dialogs_script: &'static str,
    error_capture_script: &'static str,
    stylesheets: Vec<String>,
    runner_scripts: Vec<String>,
    suite_scripts: Vec<String>,
    fixtures_path: String,
    reporter_script: &'static str,
    results_id: &'static str,
    error_id: &'static str,
}

/// Renders runner pages.
pub struct SuiteRenderer {
    registry: Handlebars<'static>,
    dev_mode: bool,
}

impl SuiteRenderer {
    /// In dev mode pages use the framework's HTML reporter for interactive
    /// debugging and never mark the results element done.
    pub fn new(dev_mode: bool) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        Self { registry, dev_mode }
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    /// Render the runner page for `suite`, whose files are served under
    /// `/suite/<suite_name>/include/`.
    pub fn render<S>(&self, suite_name: &str, suite: &S) -> Result<String, SuiteRendererError>
    where
        S: SuiteSource + ?Sized,
    {
        let runner_name = suite.test_runner();
        let runner = TestRunner::from_name(runner_name)
            .ok_or_else(|| SuiteRendererError::UnknownTestRunner(runner_name.to_string()))?;

        let include_prefix = include_path_prefix(suite_name);
        let suite_scripts = suite
            .lib_paths(PathView::InPage)
            .into_iter()
            .chain(suite.src_paths(PathView::InPage))
            .chain(suite.spec_paths(PathView::InPage))
            .map(|path| format!("{}/{}", include_prefix, encode_path(path)))
            .collect();

        let context = PageContext {
            suite_name,
            runner_name: runner.name(),
            stub_dialogs_script: STUB_DIALOGS_JS,
            error_capture_script: ERROR_CAPTURE_JS,
            stylesheets: runner_urls(runner.stylesheets(self.dev_mode)),
            runner_scripts: runner_urls(runner.scripts(self.dev_mode)),
            suite_scripts,
            fixtures_path: serde_json::Value::String(include_prefix).to_string(),
            reporter_script: runner.reporter_glue(self.dev_mode),
            results_id: RESULTS_DIV_ID,
            error_id: ERROR_DIV_ID,
        };

        log::debug!(
            "Rendering {} page for suite '{}' with {} suite script(s)",
            runner,
            suite_name,
            context.suite_scripts.len()
        );
        self.render_template(RUNNER_PAGE_TEMPLATE, &context)
    }

    fn render_template(
        &self,
        template: &str,
        context: &PageContext<'_>,
    ) -> Result<String, SuiteRendererError> {
        Ok(self.registry.render_template(template, context)?)
    }
}

impl Default for SuiteRenderer {
    fn default() -> Self {
        Self::new(false)
    }
}

fn runner_urls(paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .map(|path| format!("{}/{}", RUNNER_URL_PREFIX, path))
        .collect()
}
