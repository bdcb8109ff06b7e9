use super::retry::with_retries;
use super::{invalid_key, JobContext, JobKind, TaskOutcome};
use crate::errors::JobError;
use crate::keys::TaskKey;
use crate::profiling::{bucket_keys, fold_run, option_alias};
use crate::storage::ApplyOutcome;
use crate::time::canonical_day;
use tracing::{debug, info, warn};

enum Attempt {
    MissingRun,
    MissingPoint { test: String, point: String },
    Done(ApplyOutcome),
}

/// Folds one profiling run into its day summaries.
pub fn run_profiling_task(ctx: &JobContext, raw_key: &str, _now_us: i64) -> Result<TaskOutcome, JobError> {
    let run_id = match TaskKey::parse(raw_key).and_then(TaskKey::into_profiling_run_id) {
        Ok(id) => id,
        Err(e) => return Ok(invalid_key(JobKind::Profiling, raw_key, &e)),
    };

    let attempt = with_retries("profiling", ctx.config.max_retries, |_| {
        let Some(run) = ctx.store.profiling_run(run_id)? else {
            return Ok(Attempt::MissingRun);
        };
        let Some(point) = ctx.store.profiling_point(&run.test_name, &run.profiling_point)? else {
            return Ok(Attempt::MissingPoint {
                test: run.test_name,
                point: run.profiling_point,
            });
        };

        let alias = option_alias(&run.options, &ctx.config.profiling.option_keys);
        let day = canonical_day(run.start_timestamp, ctx.tz());
        let keys = bucket_keys(&run, &alias, day);
        let outcome = ctx
            .store
            .apply_profiling_run(run_id, &keys, |existing| fold_run(existing, &point, &run))?;
        Ok(Attempt::Done(outcome))
    })?;

    match attempt {
        Attempt::MissingRun => {
            warn!(run_id, "profiling run not found");
            Ok(TaskOutcome::Unchanged)
        }
        Attempt::MissingPoint { test, point } => {
            warn!(run_id, test = %test, point = %point, "profiling point not found");
            Ok(TaskOutcome::Unchanged)
        }
        Attempt::Done(ApplyOutcome::AlreadyApplied) => {
            debug!(run_id, "profiling run already applied");
            Ok(TaskOutcome::Stale)
        }
        Attempt::Done(ApplyOutcome::Applied { buckets }) => {
            info!(run_id, buckets, "profiling summaries updated");
            Ok(TaskOutcome::Committed { notifications: 0 })
        }
    }
}
