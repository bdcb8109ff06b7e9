use super::{invalid_key, JobContext, JobKind, TaskOutcome};
use crate::errors::JobError;
use crate::keys::TaskKey;
use crate::notify::html::{self, HtmlBody};
use crate::profiling::{PerformanceDigest, WindowStats, ALL};
use crate::time::{day_start, days_before, local_date};
use tracing::{debug, info};

/// `(name, first day back, last day back)` relative to today.
const WINDOWS: [(&str, u64, u64); 3] = [("today", 0, 0), ("yesterday", 1, 1), ("last week", 7, 1)];

/// Builds the daily performance digest of one test and mails it.
pub fn run_digest_task(ctx: &JobContext, raw_key: &str, now_us: i64) -> Result<TaskOutcome, JobError> {
    let test_name = match TaskKey::parse(raw_key).and_then(TaskKey::into_test_name) {
        Ok(name) => name,
        Err(e) => return Ok(invalid_key(JobKind::Digest, raw_key, &e)),
    };

    let digest = build_digest(ctx, &test_name, now_us)?;
    if digest.is_empty() {
        debug!(test = %test_name, "no profiling data for digest");
        return Ok(TaskOutcome::Unchanged);
    }

    let settings = &ctx.config.notify;
    let regressions = digest.regressions();
    let mut subject = format!("Daily performance digest: {test_name}");
    if regressions > 0 {
        subject.push_str(&format!(" ({regressions} regression(s))"));
    }
    let mut body = HtmlBody::new();
    body.heading(&format!("Performance digest: {test_name}"));
    body.raw(&digest.to_html());
    if let Some(url) = &settings.dashboard_url {
        body.link(&html::test_link(url, &test_name), "View on dashboard");
    }

    let sent = ctx.notify_test(
        &test_name,
        html::with_prefix(settings.subject_prefix.as_deref(), subject),
        body.finish(),
    );
    info!(test = %test_name, tables = digest.tables.len(), regressions, sent, "digest sent");
    Ok(TaskOutcome::Notified(sent))
}

/// Reads the `ALL`/`ALL` summaries of every point for each window.
pub fn build_digest(ctx: &JobContext, test_name: &str, now_us: i64) -> Result<PerformanceDigest, JobError> {
    let tz = ctx.tz();
    let today = local_date(now_us, tz);
    let points = ctx.store.profiling_points(test_name)?;

    let mut windows = Vec::with_capacity(WINDOWS.len());
    for (name, from_back, to_back) in WINDOWS {
        let from = day_start(days_before(today, from_back), tz);
        let to = day_start(days_before(today, to_back), tz);
        let mut window = WindowStats::new(name);
        for point in &points {
            let summaries = ctx
                .store
                .summaries_in_range(test_name, &point.name, ALL, ALL, from, to)?;
            window.add_summaries(&summaries);
        }
        windows.push(window);
    }

    Ok(PerformanceDigest::build(
        test_name,
        &windows,
        ctx.config.profiling.digest_threshold_pct,
    ))
}
