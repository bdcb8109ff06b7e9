use super::args::GlobalArgs;
use anyhow::Context;
use runwatch_core::notify::SpoolSink;
use runwatch_core::{EngineConfig, JobContext, Store};
use std::path::Path;
use std::sync::Arc;

pub(crate) mod ack;
mod dispatch;
pub(crate) mod fanout;
pub(crate) mod ingest;
pub(crate) mod serve;
pub(crate) mod subscribe;
pub(crate) mod task;

pub use dispatch::dispatch;

pub(crate) fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

pub(crate) fn open_store(global: &GlobalArgs) -> anyhow::Result<Store> {
    ensure_parent_dir(&global.db)?;
    Store::open(&global.db).with_context(|| format!("failed to open {}", global.db.display()))
}

/// Store, config and spool sink wired together for task execution.
pub(crate) fn open_context(global: &GlobalArgs) -> anyhow::Result<JobContext> {
    let store = open_store(global)?;
    let config = EngineConfig::load(&global.config)?;
    ensure_parent_dir(&global.spool)?;
    let sink = Arc::new(SpoolSink::new(&global.spool));
    Ok(JobContext::new(store, config, sink)?)
}
