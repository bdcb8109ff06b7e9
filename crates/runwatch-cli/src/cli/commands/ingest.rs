use super::super::args::{GlobalArgs, IngestArgs};
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_SUCCESS, EXIT_TASK_FAILED};
use anyhow::Context;
use runwatch_core::ingest::{ingest, RunUpload};
use runwatch_core::jobs::JobKind;
use runwatch_core::keys::TaskKey;
use runwatch_core::{run_task, IngestError};
use std::io::Read;

pub(crate) fn run(args: IngestArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let raw = if args.input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?
    };

    let upload = match RunUpload::from_json(&raw) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("rejected upload: {e}");
            return Ok(EXIT_CONFIG_ERROR);
        }
    };

    let ctx = super::open_context(global)?;
    let report = match ingest(&ctx.store, &upload) {
        Ok(r) => r,
        Err(IngestError::Store(e)) => return Err(e.into()),
        Err(e) => {
            eprintln!("rejected upload: {e}");
            return Ok(EXIT_CONFIG_ERROR);
        }
    };
    for key in &report.task_keys {
        println!("{key}");
    }
    if !report.run_inserted {
        eprintln!("run already stored: test={}", upload.test_name);
        return Ok(EXIT_SUCCESS);
    }
    if !args.process {
        return Ok(EXIT_SUCCESS);
    }

    let now = runwatch_core::time::now_us();
    let mut code = EXIT_SUCCESS;
    for key in report.task_keys {
        let job = match key {
            TaskKey::TestStatus(_) | TaskKey::Test(_) => JobKind::Status,
            TaskKey::TestRun(_) => JobKind::Coverage,
            TaskKey::ProfilingRun(_) => JobKind::Profiling,
        };
        match run_task(&ctx, job, &key.to_string(), now) {
            Ok(outcome) => eprintln!("{job} {key}: {}", outcome.as_str()),
            Err(e) => {
                eprintln!("{job} {key}: {e}");
                code = EXIT_TASK_FAILED;
            }
        }
    }
    Ok(code)
}
