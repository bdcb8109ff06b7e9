//! Status aggregation and alerting for recurring test runs.
//!
//! The record store lives in [`storage`]; per-key task handlers in [`jobs`]
//! read from it, compute a new state and commit it under a monotonic
//! timestamp guard before any notification goes out.

pub mod ack;
pub mod config;
pub mod coverage;
pub mod errors;
pub mod inactivity;
pub mod ingest;
pub mod jobs;
pub mod keys;
pub mod model;
pub mod notify;
pub mod profiling;
pub mod status;
pub mod storage;
pub mod time;

pub use config::EngineConfig;
pub use errors::{IngestError, JobError, StoreError};
pub use jobs::{run_task, JobContext, JobKind, TaskOutcome};
pub use keys::TaskKey;
pub use storage::Store;
