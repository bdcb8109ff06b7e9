//! Rolling status aggregation over a window of test runs.
//!
//! The most recent run in the window is authoritative. Older runs only fill in
//! skipped results and reveal transient failures. Every name in the most
//! recent run ends up in exactly one [`Classification`].

pub mod alert;

use crate::ack::{separate_acknowledged, Partition};
use crate::model::{Acknowledgment, StatusSnapshot, TestCase, TestCaseReference, TestCaseResult, TestRun};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use alert::{AlertKind, StatusAlert};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Failing now with no prior failure on record.
    New,
    /// Failing now and already failing in the prior snapshot.
    Continued,
    /// Passing now after failing in the prior snapshot.
    Fixed,
    /// Passing now but failed earlier in the window.
    Transient,
    /// Skipped now; the prior failure is carried forward unchanged.
    SkippedCarriedForward,
    /// Passing now, or skipped with no failure history.
    Passing,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::New => "new",
            Classification::Continued => "continued",
            Classification::Fixed => "fixed",
            Classification::Transient => "transient",
            Classification::SkippedCarriedForward => "skipped_carried_forward",
            Classification::Passing => "passing",
        }
    }

    pub fn counts_as_failing(self) -> bool {
        matches!(
            self,
            Classification::New | Classification::Continued | Classification::SkippedCarriedForward
        )
    }

    pub fn counts_as_passing(self) -> bool {
        matches!(
            self,
            Classification::Passing | Classification::Fixed | Classification::Transient
        )
    }
}

/// A failing case from the prior snapshot whose reference resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorFailure {
    pub case: TestCase,
    pub reference: TestCaseReference,
}

pub type PriorFailures = BTreeMap<String, PriorFailure>;

/// A run in the window together with its resolved test cases.
#[derive(Debug, Clone)]
pub struct WindowRun {
    pub run: TestRun,
    pub cases: Vec<(TestCase, TestCaseReference)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationOutcome {
    pub snapshot: StatusSnapshot,
    pub classifications: BTreeMap<String, Classification>,
    pub new_failures: Vec<String>,
    pub continued_failures: Vec<String>,
    pub fixed: Vec<String>,
    pub transient: Vec<String>,
    pub skipped_carried_forward: Vec<String>,
    /// Failure names covered by a relevant acknowledgment.
    pub acknowledged: BTreeSet<String>,
    pub alert: Option<StatusAlert>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Updated(Box<AggregationOutcome>),
    /// The window held no runs.
    Unchanged,
}

/// Computes the next status snapshot for `test_name`.
///
/// `runs` must be ordered most recent first.
pub fn aggregate(
    test_name: &str,
    prior: &PriorFailures,
    runs: &[WindowRun],
    acks: &[Acknowledgment],
) -> StatusUpdate {
    let Some(latest) = runs.first() else {
        return StatusUpdate::Unchanged;
    };

    let mut order: Vec<&str> = Vec::new();
    let mut known: HashMap<&str, TestCaseResult> = HashMap::new();
    for (case, _) in &latest.cases {
        if known.insert(case.name.as_str(), case.result).is_none() {
            order.push(case.name.as_str());
        }
    }

    let mut transient: BTreeSet<&str> = BTreeSet::new();
    for older in &runs[1..] {
        for (case, _) in &older.cases {
            let Some(current) = known.get_mut(case.name.as_str()) else {
                continue;
            };
            match *current {
                TestCaseResult::Skip => *current = case.result,
                TestCaseResult::Pass if case.result.is_failure() => {
                    transient.insert(case.name.as_str());
                }
                _ => {}
            }
        }
    }

    let mut breakage: HashMap<&str, TestCaseReference> = HashMap::new();
    for window_run in runs {
        for (case, reference) in &window_run.cases {
            if case.result.is_failure() {
                breakage.entry(case.name.as_str()).or_insert(*reference);
            }
        }
    }

    let mut outcome = AggregationOutcome {
        snapshot: StatusSnapshot {
            test_name: test_name.to_string(),
            updated_timestamp: latest.run.start_timestamp(),
            pass_count: 0,
            fail_count: 0,
            failing_cases: Vec::new(),
        },
        classifications: BTreeMap::new(),
        new_failures: Vec::new(),
        continued_failures: Vec::new(),
        fixed: Vec::new(),
        transient: Vec::new(),
        skipped_carried_forward: Vec::new(),
        acknowledged: BTreeSet::new(),
        alert: None,
    };

    for name in order {
        let result = known[name];
        let previous = prior.get(name);
        let class = if result.is_failure() {
            if previous.is_some() {
                Classification::Continued
            } else {
                Classification::New
            }
        } else if result == TestCaseResult::Pass {
            if transient.contains(name) {
                Classification::Transient
            } else if previous.is_some() {
                Classification::Fixed
            } else {
                Classification::Passing
            }
        } else if previous.is_some() {
            Classification::SkippedCarriedForward
        } else {
            Classification::Passing
        };

        let reference = match class {
            Classification::New => breakage.get(name).copied(),
            Classification::Continued | Classification::SkippedCarriedForward => {
                previous.map(|p| p.reference)
            }
            _ => None,
        };
        if let Some(reference) = reference {
            outcome.snapshot.failing_cases.push(reference);
        }

        if class.counts_as_failing() {
            outcome.snapshot.fail_count += 1;
        } else if class.counts_as_passing() {
            outcome.snapshot.pass_count += 1;
        }

        let bucket = match class {
            Classification::New => Some(&mut outcome.new_failures),
            Classification::Continued => Some(&mut outcome.continued_failures),
            Classification::Fixed => Some(&mut outcome.fixed),
            Classification::Transient => Some(&mut outcome.transient),
            Classification::SkippedCarriedForward => Some(&mut outcome.skipped_carried_forward),
            Classification::Passing => None,
        };
        if let Some(bucket) = bucket {
            bucket.push(name.to_string());
        }
        outcome.classifications.insert(name.to_string(), class);
    }

    let candidates: BTreeSet<String> = outcome
        .new_failures
        .iter()
        .chain(&outcome.continued_failures)
        .chain(&outcome.transient)
        .cloned()
        .collect();
    let Partition { acknowledged, .. } =
        separate_acknowledged(&candidates, &latest.run.devices, acks);
    outcome.acknowledged = acknowledged;
    outcome.alert = StatusAlert::select(&outcome, &latest.run);

    StatusUpdate::Updated(Box::new(outcome))
}
