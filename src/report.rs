//! Run reports
//!
//! Collects per-suite outcomes for the console and for JSON output.

use crate::browser::TestResult;
use serde::{Serialize, Serializer};
use std::fmt;

/// Outcome of one suite: its results, or why none were collected.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub suite_name: String,
    pub outcome: Result<Vec<TestResult>, String>,
}

impl SuiteReport {
    pub fn new(suite_name: impl Into<String>, outcome: Result<Vec<TestResult>, String>) -> Self {
        Self {
            suite_name: suite_name.into(),
            outcome,
        }
    }

    pub fn results(&self) -> &[TestResult] {
        self.outcome.as_deref().unwrap_or_default()
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    pub fn passed(&self) -> usize {
        self.results().iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results().iter().filter(|r| !r.passed()).count()
    }
}

#[derive(Serialize)]
struct SuiteReportJson<'a> {
    suite_name: &'a str,
    results: &'a [TestResult],
    error: Option<&'a str>,
}

impl Serialize for SuiteReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SuiteReportJson {
            suite_name: &self.suite_name,
            results: self.results(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

/// Every suite in one invocation, in run order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RunReport {
    suites: Vec<SuiteReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: SuiteReport) {
        self.suites.push(report);
    }

    pub fn suites(&self) -> &[SuiteReport] {
        &self.suites
    }

    pub fn passed(&self) -> usize {
        self.suites.iter().map(SuiteReport::passed).sum()
    }

    pub fn failed(&self) -> usize {
        self.suites.iter().map(SuiteReport::failed).sum()
    }

    /// Suites that produced no results at all.
    pub fn errored(&self) -> usize {
        self.suites.iter().filter(|s| s.outcome.is_err()).count()
    }

    /// No failing specs and no suite errors.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.errored() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for suite in &self.suites {
            writeln!(f, "{}", suite.suite_name)?;
            match &suite.outcome {
                Err(error) => writeln!(f, "  ERROR {}", error)?,
                Ok(results) if results.is_empty() => writeln!(f, "  (no specs)")?,
                Ok(results) => {
                    for result in results {
                        let label = if result.passed() { "PASS" } else { "FAIL" };
                        writeln!(f, "  {} {}: {}", label, result.test_group, result.test_name)?;
                        if !result.passed() && !result.detail.is_empty() {
                            for line in result.detail.lines() {
                                writeln!(f, "       {}", line)?;
                            }
                        }
                    }
                }
            }
        }

        write!(
            f,
            "{} passed, {} failed, {} suite error(s)",
            self.passed(),
            self.failed(),
            self.errored()
        )
    }
}
