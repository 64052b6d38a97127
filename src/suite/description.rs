//! Suite Description
//!
//! Parses a YAML suite configuration and resolves it into validated,
//! ordered, root-relative file lists.
//!
//! ```yaml
//! test_suite_name: player
//! test_runner: jasmine
//! lib_paths: [lib/jquery.js, lib/jasmine-jquery.js]
//! src_paths: src
//! spec_paths: spec
//! fixture_paths: spec/fixtures
//! exclude_from_page: src/vendor
//! ```

use super::paths::PathResolver;
use crate::error::SuiteDescriptionError;
use crate::runner::TestRunner;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::io::Read;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, SuiteDescriptionError>;

const KEY_SUITE_NAME: &str = "test_suite_name";
const KEY_LIB_PATHS: &str = "lib_paths";
const KEY_SRC_PATHS: &str = "src_paths";
const KEY_SPEC_PATHS: &str = "spec_paths";
const KEY_FIXTURE_PATHS: &str = "fixture_paths";
const KEY_TEST_RUNNER: &str = "test_runner";
const KEY_PREPEND_PATH: &str = "prepend_path";
const KEY_EXCLUDE: &str = "exclude_from_page";
const KEY_INCLUDE: &str = "include_in_page";

const KNOWN_KEYS: [&str; 9] = [
    KEY_SUITE_NAME,
    KEY_LIB_PATHS,
    KEY_SRC_PATHS,
    KEY_SPEC_PATHS,
    KEY_FIXTURE_PATHS,
    KEY_TEST_RUNNER,
    KEY_PREPEND_PATH,
    KEY_EXCLUDE,
    KEY_INCLUDE,
];

/// Characters that may not appear in a suite name, which becomes a URL path
/// segment. Anything else outside ASCII is percent-encoded when rendered.
const UNSAFE_NAME_CHARS: [char; 7] = ['/', '?', '+', '&', '#', '%', '\\'];

/// Which subset of a path list to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathView {
    /// Every resolved path.
    #[default]
    Full,
    /// Paths that belong on the runner page after applying
    /// `exclude_from_page` / `include_in_page`.
    InPage,
}

/// Anything a runner page can be rendered from.
pub trait SuiteSource {
    fn lib_paths(&self, view: PathView) -> Vec<&str>;
    fn src_paths(&self, view: PathView) -> Vec<&str>;
    fn spec_paths(&self, view: PathView) -> Vec<&str>;
    fn fixture_paths(&self, view: PathView) -> Vec<&str>;

    /// Name of the test framework, e.g. `jasmine`.
    fn test_runner(&self) -> &str;
}

/// Include/exclude rules for the in-page view.
#[derive(Debug, Clone, Default)]
struct PageFilter {
    exclude: Option<Regex>,
    include: Option<Regex>,
}

impl PageFilter {
    /// Include always wins over exclude.
    fn keeps(&self, path: &str) -> bool {
        let excluded = self.exclude.as_ref().is_some_and(|re| re.is_match(path));
        !excluded || self.include.as_ref().is_some_and(|re| re.is_match(path))
    }

    fn view<'a>(&self, paths: &'a [String], view: PathView) -> Vec<&'a str> {
        paths
            .iter()
            .map(String::as_str)
            .filter(|path| view == PathView::Full || self.keeps(path))
            .collect()
    }
}

/// A resolved, validated test suite.
#[derive(Debug, Clone)]
pub struct SuiteDescription {
    root_dir: PathBuf,
    suite_name: String,
    lib_paths: Vec<String>,
    src_paths: Vec<String>,
    spec_paths: Vec<String>,
    fixture_paths: Vec<String>,
    test_runner: TestRunner,
    prepend_path: String,
    page_filter: PageFilter,
}

impl SuiteDescription {
    /// Load a suite description file; paths resolve relative to the
    /// directory containing it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|source| SuiteDescriptionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let root_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::from_yaml_str(&yaml, root_dir)
    }

    pub fn from_reader<R: Read>(mut reader: R, root_dir: impl AsRef<Path>) -> Result<Self> {
        let mut yaml = String::new();
        reader
            .read_to_string(&mut yaml)
            .map_err(|source| SuiteDescriptionError::Read {
                path: PathBuf::from("<reader>"),
                source,
            })?;
        Self::from_yaml_str(&yaml, root_dir)
    }

    pub fn from_yaml_str(yaml: &str, root_dir: impl AsRef<Path>) -> Result<Self> {
        let root_dir = check_root_dir(root_dir.as_ref())?;
        let config: Value = serde_yaml::from_str(yaml)?;
        Self::resolve(&config, root_dir)
    }

    /// Resolve an already-parsed configuration.
    pub fn from_value(config: &Value, root_dir: impl AsRef<Path>) -> Result<Self> {
        let root_dir = check_root_dir(root_dir.as_ref())?;
        Self::resolve(config, root_dir)
    }

    fn resolve(config: &Value, root_dir: PathBuf) -> Result<Self> {
        let map = config.as_mapping().ok_or(SuiteDescriptionError::NotAMapping)?;
        warn_unknown_keys(map);

        let suite_name = required_string(map, KEY_SUITE_NAME)?;
        let src_entries = string_list(map, KEY_SRC_PATHS, true)?;
        let spec_entries = string_list(map, KEY_SPEC_PATHS, true)?;
        let runner_name = required_string(map, KEY_TEST_RUNNER)?;
        let lib_entries = string_list(map, KEY_LIB_PATHS, false)?;
        let fixture_entries = string_list(map, KEY_FIXTURE_PATHS, false)?;

        let test_runner = TestRunner::from_name(&runner_name)
            .ok_or(SuiteDescriptionError::UnknownTestRunner(runner_name))?;

        if !is_url_safe(&suite_name) {
            return Err(SuiteDescriptionError::InvalidSuiteName(suite_name));
        }

        let prepend_path = optional_string(map, KEY_PREPEND_PATH)?.unwrap_or_default();
        let page_filter = PageFilter {
            exclude: optional_pattern(map, KEY_EXCLUDE)?,
            include: optional_pattern(map, KEY_INCLUDE)?,
        };

        let lib_paths = PathResolver::new(&root_dir, KEY_LIB_PATHS, "js").resolve(&lib_entries)?;
        let src_paths = PathResolver::new(&root_dir, KEY_SRC_PATHS, "js").resolve(&src_entries)?;
        let spec_paths =
            PathResolver::new(&root_dir, KEY_SPEC_PATHS, "js").resolve(&spec_entries)?;
        let fixture_paths =
            PathResolver::new(&root_dir, KEY_FIXTURE_PATHS, "html").resolve(&fixture_entries)?;

        if src_paths.is_empty() {
            return Err(SuiteDescriptionError::EmptyPathList(KEY_SRC_PATHS));
        }
        if spec_paths.is_empty() {
            return Err(SuiteDescriptionError::EmptyPathList(KEY_SPEC_PATHS));
        }

        log::info!(
            "Suite '{}' ({}): {} lib, {} src, {} spec, {} fixture file(s)",
            suite_name,
            test_runner,
            lib_paths.len(),
            src_paths.len(),
            spec_paths.len(),
            fixture_paths.len()
        );

        Ok(Self {
            root_dir,
            suite_name,
            lib_paths,
            src_paths,
            spec_paths,
            fixture_paths,
            test_runner,
            prepend_path,
            page_filter,
        })
    }

    /// Canonical absolute root all paths are relative to.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    pub fn runner(&self) -> TestRunner {
        self.test_runner
    }

    /// Prefix for source paths in coverage output; empty by default.
    pub fn prepend_path(&self) -> &str {
        &self.prepend_path
    }

    /// Every resolved file across lib, src, spec and fixture lists.
    pub fn all_paths(&self) -> impl Iterator<Item = &str> {
        self.lib_paths
            .iter()
            .chain(&self.src_paths)
            .chain(&self.spec_paths)
            .chain(&self.fixture_paths)
            .map(String::as_str)
    }
}

impl SuiteSource for SuiteDescription {
    fn lib_paths(&self, view: PathView) -> Vec<&str> {
        self.page_filter.view(&self.lib_paths, view)
    }

    fn src_paths(&self, view: PathView) -> Vec<&str> {
        self.page_filter.view(&self.src_paths, view)
    }

    fn spec_paths(&self, view: PathView) -> Vec<&str> {
        self.page_filter.view(&self.spec_paths, view)
    }

    fn fixture_paths(&self, view: PathView) -> Vec<&str> {
        self.page_filter.view(&self.fixture_paths, view)
    }

    fn test_runner(&self) -> &str {
        self.test_runner.name()
    }
}

fn check_root_dir(root_dir: &Path) -> Result<PathBuf> {
    let metadata = std::fs::metadata(root_dir)
        .map_err(|_| SuiteDescriptionError::RootDirMissing(root_dir.to_path_buf()))?;
    if !metadata.is_dir() {
        return Err(SuiteDescriptionError::RootDirNotDirectory(
            root_dir.to_path_buf(),
        ));
    }
    root_dir
        .canonicalize()
        .map_err(|_| SuiteDescriptionError::RootDirMissing(root_dir.to_path_buf()))
}

fn warn_unknown_keys(map: &Mapping) {
    for key in map.keys() {
        match key.as_str() {
            Some(name) if KNOWN_KEYS.contains(&name) => {}
            _ => log::warn!("Ignoring unknown suite description key {:?}", key),
        }
    }
}

fn is_url_safe(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || UNSAFE_NAME_CHARS.contains(&c))
}

fn required_string(map: &Mapping, key: &'static str) -> Result<String> {
    optional_string(map, key)?.ok_or(SuiteDescriptionError::MissingKey(key))
}

fn optional_string(map: &Mapping, key: &'static str) -> Result<Option<String>> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(SuiteDescriptionError::InvalidValue {
            key,
            reason: format!("expected a string, found {}", describe(other)),
        }),
    }
}

fn optional_pattern(map: &Mapping, key: &'static str) -> Result<Option<Regex>> {
    optional_string(map, key)?
        .map(|pattern| {
            Regex::new(&pattern).map_err(|source| SuiteDescriptionError::InvalidPattern { key, source })
        })
        .transpose()
}

/// A path key may hold a single path or a list of paths.
fn string_list(map: &Mapping, key: &'static str, required: bool) -> Result<Vec<String>> {
    let value = match map.get(key) {
        Some(value) => value,
        None if required => return Err(SuiteDescriptionError::MissingKey(key)),
        None => return Ok(Vec::new()),
    };

    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(path) => Ok(vec![path.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::String(path) => Ok(path.clone()),
                other => Err(SuiteDescriptionError::InvalidValue {
                    key,
                    reason: format!("expected path strings, found {}", describe(other)),
                }),
            })
            .collect(),
        other => Err(SuiteDescriptionError::InvalidValue {
            key,
            reason: format!("expected a path or list of paths, found {}", describe(other)),
        }),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
