use thiserror::Error;

/// Errors surfaced by the record store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Lock contention or a lost optimistic race; safe to retry.
    #[error("Store conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record {what}: {detail}")]
    Corrupt { what: String, detail: String },
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    pub(crate) fn corrupt(what: impl Into<String>, detail: impl ToString) -> Self {
        StoreError::Corrupt {
            what: what.into(),
            detail: detail.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                StoreError::Conflict(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::corrupt("json column", e)
    }
}

/// A task payload key that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("empty key")]
    Empty,

    #[error("unknown key kind '{0}'")]
    UnknownKind(String),

    #[error("malformed {kind} key '{raw}': {detail}")]
    Malformed {
        kind: &'static str,
        raw: String,
        detail: String,
    },

    #[error("expected a {expected} key, got '{raw}'")]
    WrongKind { expected: &'static str, raw: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("cannot compose message '{subject}': {reason}")]
    Compose { subject: String, reason: String },

    #[error("failed to send {count} message(s): {reason}")]
    Send { count: usize, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config {path}: {detail}")]
    Read { path: String, detail: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config value for {field}: {detail}")]
    Invalid { field: &'static str, detail: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    #[error("failed to parse upload: {0}")]
    Parse(String),

    #[error("invalid upload: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Task-level failure. Everything not listed here is handled inside the task
/// and reported through its outcome instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{label}: gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        last: StoreError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl JobError {
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Store(StoreError::Conflict(_)) => "store_conflict",
            JobError::Store(StoreError::NotFound(_)) => "not_found",
            JobError::Store(_) => "store",
            JobError::RetriesExhausted { .. } => "retries_exhausted",
            JobError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_maps_to_retryable_conflict() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        );
        let mapped = StoreError::from(err);
        assert!(mapped.is_retryable(), "got {mapped:?}");
    }

    #[test]
    fn other_sqlite_errors_are_not_retryable() {
        let mapped = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(!mapped.is_retryable());
        assert!(matches!(mapped, StoreError::Database(_)));
    }

    #[test]
    fn job_error_kinds_are_stable() {
        let e = JobError::RetriesExhausted {
            label: "status".into(),
            attempts: 5,
            last: StoreError::Conflict("busy".into()),
        };
        assert_eq!(e.kind(), "retries_exhausted");
        assert_eq!(
            JobError::from(StoreError::NotFound("run".into())).kind(),
            "not_found"
        );
    }
}
