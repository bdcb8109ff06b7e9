use super::{invalid_key, JobContext, JobKind, TaskOutcome};
use crate::errors::JobError;
use crate::inactivity;
use crate::keys::TaskKey;
use tracing::{debug, info};

/// Sends a reminder when a test stopped producing runs.
///
/// Read-only; the caller's schedule decides how often a test is checked.
pub fn run_inactivity_task(ctx: &JobContext, raw_key: &str, now_us: i64) -> Result<TaskOutcome, JobError> {
    let test_name = match TaskKey::parse(raw_key).and_then(TaskKey::into_test_name) {
        Ok(name) => name,
        Err(e) => return Ok(invalid_key(JobKind::Inactivity, raw_key, &e)),
    };

    let Some(last) = ctx.store.latest_run(&test_name)? else {
        debug!(test = %test_name, "no runs recorded");
        return Ok(TaskOutcome::Unchanged);
    };
    let last_us = last.start_timestamp();
    if !inactivity::is_inactive(last_us, now_us, &ctx.config.inactivity) {
        return Ok(TaskOutcome::Unchanged);
    }

    let settings = &ctx.config.notify;
    let sent = ctx.notify_test(
        &test_name,
        inactivity::subject(&test_name, settings),
        inactivity::html(&test_name, last_us, now_us, settings, ctx.tz()),
    );
    info!(test = %test_name, last_run = last_us, sent, "inactive test reported");
    Ok(TaskOutcome::Notified(sent))
}
