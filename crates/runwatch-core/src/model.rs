use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Microseconds in one day; run timestamps are microseconds since the epoch.
pub const MICROS_PER_DAY: i64 = 86_400 * 1_000_000;

/// Outcome of a single test case within a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseResult {
    Pass,
    Fail,
    Skip,
    Exception,
    Timeout,
    Unknown,
}

impl TestCaseResult {
    /// Every variant other than pass and skip counts as a breakage.
    pub fn is_failure(self) -> bool {
        !matches!(self, TestCaseResult::Pass | TestCaseResult::Skip)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestCaseResult::Pass => "pass",
            TestCaseResult::Fail => "fail",
            TestCaseResult::Skip => "skip",
            TestCaseResult::Exception => "exception",
            TestCaseResult::Timeout => "timeout",
            TestCaseResult::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pass" => TestCaseResult::Pass,
            "fail" => TestCaseResult::Fail,
            "skip" => TestCaseResult::Skip,
            "exception" => TestCaseResult::Exception,
            "timeout" => TestCaseResult::Timeout,
            _ => TestCaseResult::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub result: TestCaseResult,
}

/// Lightweight pointer into a stored [`TestCaseRun`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestCaseReference {
    pub case_run_id: i64,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCaseRun {
    pub id: i64,
    pub run: RunKey,
    pub cases: Vec<TestCase>,
}

impl TestCaseRun {
    /// Resolves a reference; `None` when the offset is out of range.
    pub fn case_at(&self, offset: usize) -> Option<&TestCase> {
        self.cases.get(offset)
    }
}

/// Identity of a test run: the parent test plus its start time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunKey {
    pub test_name: String,
    pub start_timestamp: i64,
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.test_name, self.start_timestamp)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub branch: String,
    pub build_flavor: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub build_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestRun {
    pub key: RunKey,
    pub end_timestamp: i64,
    pub case_run_ids: Vec<i64>,
    pub covered_line_count: i64,
    pub total_line_count: i64,
    pub has_coverage: bool,
    pub devices: Vec<DeviceInfo>,
}

impl TestRun {
    pub fn start_timestamp(&self) -> i64 {
        self.key.start_timestamp
    }
}

/// Durable record of which test cases are currently failing for a test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub test_name: String,
    pub updated_timestamp: i64,
    pub pass_count: u32,
    pub fail_count: u32,
    pub failing_cases: Vec<TestCaseReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageStatus {
    pub test_name: String,
    pub updated_timestamp: i64,
    pub covered_line_count: i64,
    pub total_line_count: i64,
}

impl CoverageStatus {
    pub fn ratio(&self) -> f64 {
        coverage_ratio(self.covered_line_count, self.total_line_count)
    }
}

/// covered / total, defined as 0 when the denominator is not positive.
pub fn coverage_ratio(covered: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Suppression rule for known failures. Empty restriction sets apply to all.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledgment {
    #[serde(default)]
    pub id: i64,
    pub test_name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub devices: BTreeSet<String>,
    #[serde(default)]
    pub branches: BTreeSet<String>,
    #[serde(default)]
    pub test_case_names: BTreeSet<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Which direction of change counts as a regression for a metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegressionMode {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

impl RegressionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RegressionMode::HigherIsBetter => "higher_is_better",
            RegressionMode::LowerIsBetter => "lower_is_better",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "higher_is_better" => Some(RegressionMode::HigherIsBetter),
            "lower_is_better" => Some(RegressionMode::LowerIsBetter),
            _ => None,
        }
    }

    /// The better of two values under this mode.
    pub fn best_of(self, a: f64, b: f64) -> f64 {
        match self {
            RegressionMode::HigherIsBetter => a.max(b),
            RegressionMode::LowerIsBetter => a.min(b),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfilingPoint {
    pub test_name: String,
    pub name: String,
    pub regression_mode: RegressionMode,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
}

/// One recorded sample set for a profiling point.
///
/// A scalar point has a single value and no labels; a labeled vector point has
/// one label per value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfilingRun {
    pub id: i64,
    pub test_name: String,
    pub profiling_point: String,
    pub start_timestamp: i64,
    pub branch: String,
    pub device: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub options: Vec<String>,
}

impl ProfilingRun {
    /// Pairs each value with its label; values past the label list are unlabeled.
    pub fn samples(&self) -> impl Iterator<Item = (Option<&str>, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (self.labels.get(i).map(String::as_str), *v))
    }
}
