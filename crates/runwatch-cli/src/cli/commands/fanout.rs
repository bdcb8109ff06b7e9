use super::super::args::{FanoutArgs, GlobalArgs};
use crate::exit_codes::{EXIT_SUCCESS, EXIT_TASK_FAILED};
use runwatch_core::jobs::fanout::pending_keys;
use runwatch_core::{run_task, JobContext, JobKind, TaskOutcome};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Tally of one fan-out sweep.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct FanoutSummary {
    pub job: String,
    pub keys: usize,
    pub committed: usize,
    pub notified: usize,
    pub stale: usize,
    pub unchanged: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl FanoutSummary {
    fn record(&mut self, result: &Result<TaskOutcome, String>) {
        match result {
            Ok(TaskOutcome::Committed { .. }) => self.committed += 1,
            Ok(TaskOutcome::Notified(_)) => self.notified += 1,
            Ok(TaskOutcome::Stale) => self.stale += 1,
            Ok(TaskOutcome::Unchanged) => self.unchanged += 1,
            Ok(TaskOutcome::InvalidKey) => self.invalid += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Runs `kind` for every pending key, at most `fanout_parallelism` at a time.
pub(crate) async fn sweep(ctx: JobContext, kind: JobKind, now_us: i64) -> anyhow::Result<FanoutSummary> {
    let keys = {
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || pending_keys(&ctx, kind)).await??
    };
    let mut summary = FanoutSummary {
        job: kind.to_string(),
        keys: keys.len(),
        ..Default::default()
    };

    let permits = Arc::new(Semaphore::new(ctx.config.fanout_parallelism.max(1)));
    let mut tasks = JoinSet::new();
    for key in keys {
        let permit = Arc::clone(&permits).acquire_owned().await?;
        let ctx = ctx.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let raw = key.to_string();
            let result = run_task(&ctx, kind, &raw, now_us).map_err(|e| e.to_string());
            (raw, result)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        let (raw, result) = joined?;
        if let Err(e) = &result {
            tracing::error!(job = kind.as_str(), key = %raw, error = %e, "fan-out task failed");
        }
        summary.record(&result);
    }

    tracing::info!(
        job = kind.as_str(),
        keys = summary.keys,
        committed = summary.committed,
        notified = summary.notified,
        failed = summary.failed,
        "fan-out finished"
    );
    Ok(summary)
}

pub(crate) async fn run(args: FanoutArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let ctx = super::open_context(global)?;
    if args.dry_run {
        for key in pending_keys(&ctx, args.job)? {
            println!("{key}");
        }
        return Ok(EXIT_SUCCESS);
    }
    let now = args.now_us.unwrap_or_else(runwatch_core::time::now_us);
    let summary = sweep(ctx, args.job, now).await?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(if summary.failed > 0 {
        EXIT_TASK_FAILED
    } else {
        EXIT_SUCCESS
    })
}
