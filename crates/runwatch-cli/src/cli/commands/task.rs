use super::super::args::{GlobalArgs, TaskArgs};
use crate::exit_codes::{EXIT_INVALID_KEY, EXIT_SUCCESS, EXIT_TASK_FAILED};
use runwatch_core::{run_task, TaskOutcome};

pub(crate) fn run(args: TaskArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let ctx = super::open_context(global)?;
    let now = args.now_us.unwrap_or_else(runwatch_core::time::now_us);
    match run_task(&ctx, args.job, &args.key, now) {
        Ok(TaskOutcome::InvalidKey) => {
            eprintln!("invalid key for {}: {}", args.job, args.key);
            Ok(EXIT_INVALID_KEY)
        }
        Ok(outcome) => {
            println!("{}", outcome.as_str());
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("{} task failed ({}): {e}", args.job, e.kind());
            Ok(EXIT_TASK_FAILED)
        }
    }
}
