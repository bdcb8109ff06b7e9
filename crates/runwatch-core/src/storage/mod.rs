pub mod schema;
pub mod store;
pub(crate) mod store_internal;

pub use store::{ApplyOutcome, NewTestRun, Store, WriteOutcome};

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
