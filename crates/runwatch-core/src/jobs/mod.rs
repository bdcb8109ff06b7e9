//! Task handlers invoked by the scheduler, one key per call.
//!
//! Every handler parses its key, runs a read-compute-write cycle under the
//! retry policy and dispatches notifications only after a commit.

pub mod coverage;
pub mod digest;
pub mod fanout;
pub mod inactivity;
pub mod profiling;
pub mod retry;
pub mod status;

use crate::config::EngineConfig;
use crate::errors::{ConfigError, JobError, KeyError};
use crate::notify::{self, Draft, NotificationSink};
use crate::storage::Store;
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Everything a task needs; cheap to clone and share across workers.
#[derive(Clone)]
pub struct JobContext {
    pub store: Store,
    pub config: Arc<EngineConfig>,
    pub sink: Arc<dyn NotificationSink>,
    tz: Tz,
}

impl JobContext {
    pub fn new(
        store: Store,
        config: EngineConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tz = config.time_zone()?;
        Ok(Self {
            store,
            config: Arc::new(config),
            sink,
            tz,
        })
    }

    /// Reference zone for canonical days and rendered timestamps.
    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Sends one message to the test's subscribers plus default recipients.
    ///
    /// Runs after a commit, so lookup failures are logged instead of returned.
    pub(crate) fn notify_test(&self, test_name: &str, subject: String, html: String) -> usize {
        let subscribers = match self.store.subscribers(test_name) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(test = test_name, error = %e, "subscriber lookup failed");
                Vec::new()
            }
        };
        let recipients = notify::recipients(subscribers, &self.config.notify.default_recipients);
        notify::dispatch(
            self.sink.as_ref(),
            vec![Draft {
                recipients,
                subject,
                html,
            }],
        )
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("config", &self.config)
            .field("tz", &self.tz)
            .finish_non_exhaustive()
    }
}

/// How a task ended. Everything here counts as success for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// New state was written; `notifications` messages went out afterwards.
    Committed { notifications: usize },
    /// Someone already stored state at least as new.
    Stale,
    /// Nothing to do.
    Unchanged,
    /// A read-only check fired notifications.
    Notified(usize),
    /// The key could not be parsed; logged and dropped.
    InvalidKey,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Committed { .. } => "committed",
            TaskOutcome::Stale => "stale",
            TaskOutcome::Unchanged => "unchanged",
            TaskOutcome::Notified(_) => "notified",
            TaskOutcome::InvalidKey => "invalid_key",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Status,
    Coverage,
    Inactivity,
    Profiling,
    Digest,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::Status,
        JobKind::Coverage,
        JobKind::Inactivity,
        JobKind::Profiling,
        JobKind::Digest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Status => "status",
            JobKind::Coverage => "coverage",
            JobKind::Inactivity => "inactivity",
            JobKind::Profiling => "profiling",
            JobKind::Digest => "digest",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| KeyError::UnknownKind(s.to_string()))
    }
}

/// Routes a raw key to the handler for `kind`.
pub fn run_task(
    ctx: &JobContext,
    kind: JobKind,
    raw_key: &str,
    now_us: i64,
) -> Result<TaskOutcome, JobError> {
    let span = tracing::info_span!("task", job = kind.as_str(), key = raw_key);
    let _entered = span.enter();
    match kind {
        JobKind::Status => status::run_status_task(ctx, raw_key, now_us),
        JobKind::Coverage => coverage::run_coverage_task(ctx, raw_key, now_us),
        JobKind::Inactivity => inactivity::run_inactivity_task(ctx, raw_key, now_us),
        JobKind::Profiling => profiling::run_profiling_task(ctx, raw_key, now_us),
        JobKind::Digest => digest::run_digest_task(ctx, raw_key, now_us),
    }
}

/// Logs an unparseable key and maps it to [`TaskOutcome::InvalidKey`].
pub(crate) fn invalid_key(job: JobKind, raw_key: &str, err: &KeyError) -> TaskOutcome {
    tracing::warn!(job = job.as_str(), key = raw_key, error = %err, "ignoring invalid task key");
    TaskOutcome::InvalidKey
}
