use super::retry::with_retries;
use super::{invalid_key, JobContext, JobKind, TaskOutcome};
use crate::coverage::{track, CoverageChange, CoverageUpdate};
use crate::errors::JobError;
use crate::keys::TaskKey;
use crate::storage::WriteOutcome;
use tracing::{debug, info, warn};

enum Attempt {
    Missing,
    Unchanged,
    Stale,
    Committed(CoverageChange),
}

/// Updates the coverage status of a test from one of its runs.
pub fn run_coverage_task(ctx: &JobContext, raw_key: &str, _now_us: i64) -> Result<TaskOutcome, JobError> {
    let run_key = match TaskKey::parse(raw_key).and_then(TaskKey::into_run_key) {
        Ok(key) => key,
        Err(e) => return Ok(invalid_key(JobKind::Coverage, raw_key, &e)),
    };

    let attempt = with_retries("coverage", ctx.config.max_retries, |_| {
        let Some(run) = ctx.store.get_test_run(&run_key)? else {
            return Ok(Attempt::Missing);
        };
        let previous = ctx.store.get_coverage_status(&run_key.test_name)?;
        match track(previous.as_ref(), &run, &ctx.config.coverage) {
            CoverageUpdate::Unchanged => Ok(Attempt::Unchanged),
            CoverageUpdate::Updated(change) => {
                match ctx.store.commit_coverage_if_newer(&change.status)? {
                    WriteOutcome::Committed => Ok(Attempt::Committed(change)),
                    WriteOutcome::Stale { .. } => Ok(Attempt::Stale),
                }
            }
        }
    })?;

    match attempt {
        Attempt::Missing => {
            warn!(run = %run_key, "test run not found");
            Ok(TaskOutcome::Unchanged)
        }
        Attempt::Unchanged => Ok(TaskOutcome::Unchanged),
        Attempt::Stale => {
            debug!(run = %run_key, "coverage already newer, dropping update");
            Ok(TaskOutcome::Stale)
        }
        Attempt::Committed(change) => {
            let notifications = match change.subject(&ctx.config.notify) {
                Some(subject) => ctx.notify_test(
                    &run_key.test_name,
                    subject,
                    change.html(&ctx.config.notify),
                ),
                None => 0,
            };
            info!(
                run = %run_key,
                ratio = change.status.ratio(),
                narrative = ?change.narrative,
                notifications,
                "coverage committed"
            );
            Ok(TaskOutcome::Committed { notifications })
        }
    }
}
