//! Test result records harvested from a runner page.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{self, Write as _};

/// Outcome of a single spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pass => f.write_str("pass"),
            TestStatus::Fail => f.write_str("fail"),
        }
    }
}

/// One spec result, normalized from the page's camelCase payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_group: String,
    pub test_name: String,
    pub status: TestStatus,
    /// Failure message or stack trace; empty on pass.
    pub detail: String,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Pass
    }
}

/// Record as written by the page's JSON reporter.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageRecord {
    test_group: String,
    test_name: String,
    test_status: TestStatus,
    #[serde(default)]
    test_detail: String,
}

impl From<PageRecord> for TestResult {
    fn from(record: PageRecord) -> Self {
        Self {
            test_group: record.test_group,
            test_name: record.test_name,
            status: record.test_status,
            detail: record.test_detail,
        }
    }
}

/// Parse the results element's text into normalized records.
pub fn parse_results(payload: &str) -> Result<Vec<TestResult>, serde_json::Error> {
    let payload = escape_control_chars(payload);
    let records: Vec<PageRecord> = serde_json::from_str(&payload)?;
    Ok(records.into_iter().map(TestResult::from).collect())
}

/// Escape raw control characters that appear inside JSON string literals.
///
/// Reporters copy stack traces verbatim, so literal newlines and tabs end up
/// inside strings where strict JSON forbids them.
pub(crate) fn escape_control_chars(payload: &str) -> Cow<'_, str> {
    if !payload.bytes().any(|b| b < 0x20) {
        return Cow::Borrowed(payload);
    }

    let mut escaped = String::with_capacity(payload.len() + 16);
    let mut in_string = false;
    let mut after_backslash = false;

    for c in payload.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            escaped.push(c);
            continue;
        }

        if after_backslash {
            after_backslash = false;
            escaped.push(c);
            continue;
        }

        match c {
            '\\' => {
                after_backslash = true;
                escaped.push(c);
            }
            '"' => {
                in_string = false;
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(escaped, "\\u{:04x}", c as u32);
            }
            c => escaped.push(c),
        }
    }

    Cow::Owned(escaped)
}
