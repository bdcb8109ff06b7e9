use super::AggregationOutcome;
use crate::config::NotifySettings;
use crate::model::{DeviceInfo, TestRun};
use crate::notify::html::{self, HtmlBody};
use chrono_tz::Tz;

/// Which status email a run produces. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertKind {
    NewFailures,
    ContinuedFailures,
    TransientFailures,
    Fixed,
}

impl AlertKind {
    fn headline(self) -> &'static str {
        match self {
            AlertKind::NewFailures => "New test failures",
            AlertKind::ContinuedFailures => "Continued test failures",
            AlertKind::TransientFailures => "Transient test failures",
            AlertKind::Fixed => "Test cases fixed",
        }
    }
}

/// The single notification selected for an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusAlert {
    pub kind: AlertKind,
    pub test_name: String,
    pub run_start: i64,
    pub devices: Vec<DeviceInfo>,
    /// Unacknowledged names of `kind`, in most-recent-run order.
    pub names: Vec<String>,
    pub fixed: Vec<String>,
    pub acknowledged: Vec<String>,
    pub pass_count: u32,
    pub fail_count: u32,
}

impl StatusAlert {
    /// Picks the highest-priority alert with at least one unacknowledged name.
    pub fn select(outcome: &AggregationOutcome, latest: &TestRun) -> Option<Self> {
        let unacked = |names: &[String]| -> Vec<String> {
            names
                .iter()
                .filter(|n| !outcome.acknowledged.contains(*n))
                .cloned()
                .collect()
        };

        // A fixed alert only goes out once nothing is failing any more.
        let all_fixed = if outcome.snapshot.fail_count == 0 {
            outcome.fixed.clone()
        } else {
            Vec::new()
        };
        let candidates = [
            (AlertKind::NewFailures, unacked(&outcome.new_failures)),
            (AlertKind::ContinuedFailures, unacked(&outcome.continued_failures)),
            (AlertKind::TransientFailures, unacked(&outcome.transient)),
            (AlertKind::Fixed, all_fixed),
        ];
        let (kind, names) = candidates.into_iter().find(|(_, names)| !names.is_empty())?;

        Some(StatusAlert {
            kind,
            test_name: outcome.snapshot.test_name.clone(),
            run_start: latest.start_timestamp(),
            devices: latest.devices.clone(),
            names,
            fixed: if kind == AlertKind::Fixed {
                Vec::new()
            } else {
                outcome.fixed.clone()
            },
            acknowledged: outcome.acknowledged.iter().cloned().collect(),
            pass_count: outcome.snapshot.pass_count,
            fail_count: outcome.snapshot.fail_count,
        })
    }

    pub fn subject(&self, settings: &NotifySettings) -> String {
        let builds: Vec<&str> = self
            .devices
            .iter()
            .map(|d| d.build_id.as_str())
            .filter(|b| !b.is_empty())
            .collect();
        let mut subject = format!("{} in {}", self.kind.headline(), self.test_name);
        if !builds.is_empty() {
            subject.push_str(&format!(" @ {}", builds.join(",")));
        }
        html::with_prefix(settings.subject_prefix.as_deref(), subject)
    }

    pub fn html(&self, settings: &NotifySettings, tz: Tz) -> String {
        let mut body = HtmlBody::new();
        body.heading(&format!("{}: {}", self.kind.headline(), self.test_name));
        body.paragraph(&format!(
            "Run started {} on {}.",
            crate::time::format_us(self.run_start, tz),
            html::describe_devices(&self.devices)
        ));
        body.list(self.kind.headline(), &self.names);
        if !self.fixed.is_empty() {
            body.list(AlertKind::Fixed.headline(), &self.fixed);
        }
        if !self.acknowledged.is_empty() {
            body.list("Acknowledged failures", &self.acknowledged);
        }
        body.paragraph(&format!(
            "{} passing, {} failing.",
            self.pass_count, self.fail_count
        ));
        if let Some(url) = &settings.dashboard_url {
            body.link(&html::test_link(url, &self.test_name), "View on dashboard");
        }
        body.finish()
    }
}
