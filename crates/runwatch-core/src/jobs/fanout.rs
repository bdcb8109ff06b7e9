//! Candidate keys for periodic jobs.

use super::{JobContext, JobKind};
use crate::errors::StoreError;
use crate::keys::TaskKey;

/// Upper bound on profiling runs enumerated per sweep.
const PROFILING_BATCH: u32 = 10_000;

/// Keys that currently have work for `kind`, in a stable order.
pub fn pending_keys(ctx: &JobContext, kind: JobKind) -> Result<Vec<TaskKey>, StoreError> {
    let store = &ctx.store;
    match kind {
        JobKind::Status => {
            let mut keys = Vec::new();
            for test in store.test_names()? {
                let Some(latest) = store.latest_run(&test)? else {
                    continue;
                };
                let stored = store.get_status(&test)?.map(|s| s.updated_timestamp);
                if stored.map_or(true, |ts| ts < latest.start_timestamp()) {
                    keys.push(TaskKey::TestStatus(test));
                }
            }
            Ok(keys)
        }
        JobKind::Coverage => {
            let mut keys = Vec::new();
            for test in store.test_names()? {
                let Some(run) = store.latest_coverage_run(&test)? else {
                    continue;
                };
                let stored = store.get_coverage_status(&test)?.map(|s| s.updated_timestamp);
                if stored.map_or(true, |ts| ts < run.start_timestamp()) {
                    keys.push(TaskKey::TestRun(run.key));
                }
            }
            Ok(keys)
        }
        JobKind::Inactivity | JobKind::Digest => Ok(store
            .test_names()?
            .into_iter()
            .map(TaskKey::Test)
            .collect()),
        JobKind::Profiling => Ok(store
            .unapplied_profiling_runs(PROFILING_BATCH)?
            .into_iter()
            .map(TaskKey::ProfilingRun)
            .collect()),
    }
}
