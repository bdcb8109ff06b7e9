//! Opaque task keys carried by scheduler payloads.
//!
//! Wire forms:
//! - `test:<test>` / `test_status:<test>`: per-test jobs
//! - `test_run:<test>:<start_timestamp>`: per-run jobs
//! - `profiling_run:<id>`: profiling summary updates
//!
//! On the HTTP surface the key travels form-encoded as `key=<value>`.

use crate::errors::KeyError;
use crate::model::RunKey;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKey {
    Test(String),
    TestStatus(String),
    TestRun(RunKey),
    ProfilingRun(i64),
}

impl TaskKey {
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        let (kind, rest) = raw
            .split_once(':')
            .ok_or_else(|| KeyError::UnknownKind(raw.to_string()))?;
        match kind {
            "test" => Ok(TaskKey::Test(non_empty_name("test", raw, rest)?)),
            "test_status" => Ok(TaskKey::TestStatus(non_empty_name(
                "test_status",
                raw,
                rest,
            )?)),
            "test_run" => {
                let (name, ts) = rest.rsplit_once(':').ok_or_else(|| KeyError::Malformed {
                    kind: "test_run",
                    raw: raw.to_string(),
                    detail: "missing start timestamp".into(),
                })?;
                let start_timestamp = ts.parse::<i64>().map_err(|e| KeyError::Malformed {
                    kind: "test_run",
                    raw: raw.to_string(),
                    detail: e.to_string(),
                })?;
                Ok(TaskKey::TestRun(RunKey {
                    test_name: non_empty_name("test_run", raw, name)?,
                    start_timestamp,
                }))
            }
            "profiling_run" => rest
                .parse::<i64>()
                .map(TaskKey::ProfilingRun)
                .map_err(|e| KeyError::Malformed {
                    kind: "profiling_run",
                    raw: raw.to_string(),
                    detail: e.to_string(),
                }),
            other => Err(KeyError::UnknownKind(other.to_string())),
        }
    }

    /// Extracts and parses `key` from an `application/x-www-form-urlencoded` body.
    pub fn from_form_body(body: &str) -> Result<Self, KeyError> {
        let value = url::form_urlencoded::parse(body.as_bytes())
            .find(|(k, _)| k == "key")
            .map(|(_, v)| v.into_owned())
            .ok_or(KeyError::Empty)?;
        Self::parse(&value)
    }

    pub fn to_form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("key", &self.to_string())
            .finish()
    }

    /// Test name for per-test keys (`test:` and `test_status:` are interchangeable).
    pub fn into_test_name(self) -> Result<String, KeyError> {
        match self {
            TaskKey::Test(name) | TaskKey::TestStatus(name) => Ok(name),
            other => Err(KeyError::WrongKind {
                expected: "test",
                raw: other.to_string(),
            }),
        }
    }

    pub fn into_run_key(self) -> Result<RunKey, KeyError> {
        match self {
            TaskKey::TestRun(key) => Ok(key),
            other => Err(KeyError::WrongKind {
                expected: "test_run",
                raw: other.to_string(),
            }),
        }
    }

    pub fn into_profiling_run_id(self) -> Result<i64, KeyError> {
        match self {
            TaskKey::ProfilingRun(id) => Ok(id),
            other => Err(KeyError::WrongKind {
                expected: "profiling_run",
                raw: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Test(name) => write!(f, "test:{name}"),
            TaskKey::TestStatus(name) => write!(f, "test_status:{name}"),
            TaskKey::TestRun(key) => write!(f, "test_run:{}:{}", key.test_name, key.start_timestamp),
            TaskKey::ProfilingRun(id) => write!(f, "profiling_run:{id}"),
        }
    }
}

fn non_empty_name(kind: &'static str, raw: &str, name: &str) -> Result<String, KeyError> {
    if name.trim().is_empty() {
        return Err(KeyError::Malformed {
            kind,
            raw: raw.to_string(),
            detail: "empty test name".into(),
        });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_key_allows_colons_in_test_name() {
        let key = TaskKey::parse("test_run:VtsHal:Binder:1500").unwrap();
        assert_eq!(
            key,
            TaskKey::TestRun(RunKey {
                test_name: "VtsHal:Binder".into(),
                start_timestamp: 1500,
            })
        );
        assert_eq!(key.to_string(), "test_run:VtsHal:Binder:1500");
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(TaskKey::parse("  "), Err(KeyError::Empty));
        assert!(matches!(
            TaskKey::parse("bogus:x"),
            Err(KeyError::UnknownKind(_))
        ));
        assert!(matches!(
            TaskKey::parse("test_run:foo:notanumber"),
            Err(KeyError::Malformed { .. })
        ));
        assert!(matches!(
            TaskKey::parse("test_run:1234"),
            Err(KeyError::Malformed { .. })
        ));
        assert!(matches!(
            TaskKey::parse("test:"),
            Err(KeyError::Malformed { .. })
        ));
    }

    #[test]
    fn form_body_is_url_decoded() {
        let key = TaskKey::TestStatus("Vts Kernel/Ltp".into());
        let body = key.to_form_body();
        assert!(!body.contains(' '));
        assert_eq!(TaskKey::from_form_body(&body).unwrap(), key);
        assert_eq!(
            TaskKey::from_form_body("other=1"),
            Err(KeyError::Empty)
        );
    }

    #[test]
    fn wrong_kind_is_reported() {
        let err = TaskKey::ProfilingRun(3).into_run_key().unwrap_err();
        assert!(matches!(err, KeyError::WrongKind { expected: "test_run", .. }));
        assert_eq!(
            TaskKey::TestStatus("a".into()).into_test_name().unwrap(),
            "a"
        );
    }
}
