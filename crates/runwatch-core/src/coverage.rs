//! Coverage threshold crossings.

use crate::config::{CoverageThresholds, NotifySettings};
use crate::model::{CoverageStatus, TestRun};
use crate::notify::html::{self, HtmlBody};

/// Which coverage change to report. Zone crossings win over plain deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageNarrative {
    EnteredGoodZone,
    LeftGoodZone,
    EnteredBadZone,
    LeftBadZone,
    Dropped,
    Improved,
}

impl CoverageNarrative {
    pub fn describe(self) -> &'static str {
        match self {
            CoverageNarrative::EnteredGoodZone => "entered the good coverage zone",
            CoverageNarrative::LeftGoodZone => "left the good coverage zone",
            CoverageNarrative::EnteredBadZone => "entered the bad coverage zone",
            CoverageNarrative::LeftBadZone => "left the bad coverage zone",
            CoverageNarrative::Dropped => "coverage dropped",
            CoverageNarrative::Improved => "coverage improved",
        }
    }
}

/// First matching narrative for a ratio change, if any.
pub fn narrative(previous: f64, current: f64, t: &CoverageThresholds) -> Option<CoverageNarrative> {
    if current >= t.good_zone && previous < t.good_zone {
        Some(CoverageNarrative::EnteredGoodZone)
    } else if previous >= t.good_zone && current < t.good_zone {
        Some(CoverageNarrative::LeftGoodZone)
    } else if current <= t.bad_zone && previous > t.bad_zone {
        Some(CoverageNarrative::EnteredBadZone)
    } else if previous <= t.bad_zone && current > t.bad_zone {
        Some(CoverageNarrative::LeftBadZone)
    } else if current - previous < -t.delta {
        Some(CoverageNarrative::Dropped)
    } else if current - previous > t.delta {
        Some(CoverageNarrative::Improved)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageChange {
    pub status: CoverageStatus,
    pub previous_ratio: Option<f64>,
    pub narrative: Option<CoverageNarrative>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverageUpdate {
    Updated(CoverageChange),
    /// The run carried no coverage data.
    Unchanged,
}

/// Derives the next coverage status from `run`.
///
/// The first observation for a test is stored without a narrative.
pub fn track(
    previous: Option<&CoverageStatus>,
    run: &TestRun,
    thresholds: &CoverageThresholds,
) -> CoverageUpdate {
    if !run.has_coverage {
        return CoverageUpdate::Unchanged;
    }
    let status = CoverageStatus {
        test_name: run.key.test_name.clone(),
        updated_timestamp: run.start_timestamp(),
        covered_line_count: run.covered_line_count,
        total_line_count: run.total_line_count,
    };
    let previous_ratio = previous.map(CoverageStatus::ratio);
    let picked = previous_ratio.and_then(|prev| narrative(prev, status.ratio(), thresholds));
    CoverageUpdate::Updated(CoverageChange {
        status,
        previous_ratio,
        narrative: picked,
    })
}

impl CoverageChange {
    pub fn subject(&self, settings: &NotifySettings) -> Option<String> {
        let n = self.narrative?;
        Some(html::with_prefix(
            settings.subject_prefix.as_deref(),
            format!("{}: {}", self.status.test_name, n.describe()),
        ))
    }

    pub fn html(&self, settings: &NotifySettings) -> String {
        let mut body = HtmlBody::new();
        body.heading(&format!("Coverage update: {}", self.status.test_name));
        let current = self.status.ratio() * 100.0;
        match self.previous_ratio {
            Some(prev) => body.paragraph(&format!(
                "Coverage moved from {:.1}% to {:.1}% ({} of {} lines).",
                prev * 100.0,
                current,
                self.status.covered_line_count,
                self.status.total_line_count
            )),
            None => body.paragraph(&format!(
                "Coverage is {current:.1}% ({} of {} lines).",
                self.status.covered_line_count, self.status.total_line_count
            )),
        };
        if let Some(url) = &settings.dashboard_url {
            body.link(&html::test_link(url, &self.status.test_name), "View on dashboard");
        }
        body.finish()
    }
}
