use super::retry::with_retries;
use super::{invalid_key, JobContext, JobKind, TaskOutcome};
use crate::errors::{JobError, StoreError};
use crate::keys::TaskKey;
use crate::model::{StatusSnapshot, TestCaseReference, TestRun};
use crate::status::{aggregate, AggregationOutcome, PriorFailure, PriorFailures, StatusUpdate, WindowRun};
use crate::storage::WriteOutcome;
use tracing::{debug, info, warn};

enum Attempt {
    Unchanged,
    Stale { stored_timestamp: i64 },
    Committed(Box<AggregationOutcome>),
}

/// Recomputes and stores the status snapshot of one test.
pub fn run_status_task(ctx: &JobContext, raw_key: &str, now_us: i64) -> Result<TaskOutcome, JobError> {
    let test_name = match TaskKey::parse(raw_key).and_then(TaskKey::into_test_name) {
        Ok(name) => name,
        Err(e) => return Ok(invalid_key(JobKind::Status, raw_key, &e)),
    };

    let attempt = with_retries("status", ctx.config.max_retries, |n| {
        debug!(test = %test_name, attempt = n, "aggregating status");
        aggregate_and_commit(ctx, &test_name, now_us)
    })?;

    match attempt {
        Attempt::Unchanged => {
            debug!(test = %test_name, "no runs in window");
            Ok(TaskOutcome::Unchanged)
        }
        Attempt::Stale { stored_timestamp } => {
            debug!(test = %test_name, stored_timestamp, "status already newer, dropping update");
            Ok(TaskOutcome::Stale)
        }
        Attempt::Committed(outcome) => {
            let notifications = match &outcome.alert {
                Some(alert) => ctx.notify_test(
                    &test_name,
                    alert.subject(&ctx.config.notify),
                    alert.html(&ctx.config.notify, ctx.tz()),
                ),
                None => 0,
            };
            info!(
                test = %test_name,
                updated_timestamp = outcome.snapshot.updated_timestamp,
                pass_count = outcome.snapshot.pass_count,
                fail_count = outcome.snapshot.fail_count,
                new = outcome.new_failures.len(),
                fixed = outcome.fixed.len(),
                notifications,
                "status committed"
            );
            Ok(TaskOutcome::Committed { notifications })
        }
    }
}

fn aggregate_and_commit(ctx: &JobContext, test_name: &str, now_us: i64) -> Result<Attempt, JobError> {
    let store = &ctx.store;
    let settings = &ctx.config.status;

    let prior_snapshot = store.get_status(test_name)?;
    let prior = resolve_prior(ctx, test_name, prior_snapshot.as_ref())?;

    let window_start = now_us.saturating_sub(settings.window_us());
    let after = prior_snapshot
        .as_ref()
        .map_or(window_start, |s| s.updated_timestamp.max(window_start));
    let runs = store.runs_after(test_name, after, settings.max_run_count)?;
    let window = resolve_window(ctx, runs)?;
    let acks = store.acknowledgments(test_name)?;

    let StatusUpdate::Updated(outcome) = aggregate(test_name, &prior, &window, &acks) else {
        return Ok(Attempt::Unchanged);
    };
    match store.commit_status_if_newer(&outcome.snapshot)? {
        WriteOutcome::Committed => Ok(Attempt::Committed(outcome)),
        WriteOutcome::Stale { stored_timestamp } => Ok(Attempt::Stale { stored_timestamp }),
    }
}

/// Resolves the prior snapshot's references; dangling ones are skipped.
fn resolve_prior(
    ctx: &JobContext,
    test_name: &str,
    snapshot: Option<&StatusSnapshot>,
) -> Result<PriorFailures, StoreError> {
    let mut prior = PriorFailures::new();
    let Some(snapshot) = snapshot else {
        return Ok(prior);
    };
    let ids: Vec<i64> = snapshot.failing_cases.iter().map(|r| r.case_run_id).collect();
    let case_runs = ctx.store.get_case_runs(&ids)?;
    for reference in &snapshot.failing_cases {
        let case = case_runs
            .get(&reference.case_run_id)
            .and_then(|cr| cr.case_at(reference.offset));
        match case {
            Some(case) => {
                prior.insert(
                    case.name.clone(),
                    PriorFailure {
                        case: case.clone(),
                        reference: *reference,
                    },
                );
            }
            None => warn!(
                test = test_name,
                case_run_id = reference.case_run_id,
                offset = reference.offset,
                "dangling test case reference in status, skipping"
            ),
        }
    }
    Ok(prior)
}

/// Loads every case run of the window in one batch.
fn resolve_window(ctx: &JobContext, runs: Vec<TestRun>) -> Result<Vec<WindowRun>, StoreError> {
    let ids: Vec<i64> = runs.iter().flat_map(|r| r.case_run_ids.iter().copied()).collect();
    let case_runs = ctx.store.get_case_runs(&ids)?;

    let window = runs
        .into_iter()
        .map(|run| {
            let mut cases = Vec::new();
            for id in &run.case_run_ids {
                let Some(case_run) = case_runs.get(id) else {
                    warn!(run = %run.key, case_run_id = id, "missing test case run, skipping");
                    continue;
                };
                cases.extend(case_run.cases.iter().enumerate().map(|(offset, case)| {
                    (
                        case.clone(),
                        TestCaseReference {
                            case_run_id: *id,
                            offset,
                        },
                    )
                }));
            }
            WindowRun { run, cases }
        })
        .collect();
    Ok(window)
}
