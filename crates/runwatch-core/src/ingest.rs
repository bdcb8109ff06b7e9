//! Run uploads: the JSON document a test harness posts after each run.

use crate::errors::IngestError;
use crate::keys::TaskKey;
use crate::model::{DeviceInfo, ProfilingPoint, ProfilingRun, RegressionMode, TestCase};
use crate::storage::{NewTestRun, Store};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RunUpload {
    pub test_name: String,
    pub start_timestamp: i64,
    #[serde(default)]
    pub end_timestamp: Option<i64>,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
    #[serde(default)]
    pub coverage: Option<CoverageCounts>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub profiling: Vec<ProfilingUpload>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct CoverageCounts {
    pub covered: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProfilingUpload {
    pub name: String,
    #[serde(default)]
    pub regression_mode: RegressionMode,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// What an ingest stored, plus the task keys a scheduler should enqueue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub run_inserted: bool,
    pub case_count: usize,
    pub profiling_run_ids: Vec<i64>,
    pub task_keys: Vec<TaskKey>,
}

impl RunUpload {
    pub fn from_json(raw: &str) -> Result<Self, IngestError> {
        let upload: Self = serde_json::from_str(raw).map_err(|e| IngestError::Parse(e.to_string()))?;
        upload.validate()?;
        Ok(upload)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.test_name.trim().is_empty() {
            return Err(IngestError::Invalid("test_name is empty".into()));
        }
        if self.end_timestamp.is_some_and(|end| end < self.start_timestamp) {
            return Err(IngestError::Invalid("end_timestamp precedes start_timestamp".into()));
        }
        if let Some(c) = self.coverage {
            if c.covered < 0 || c.total < 0 {
                return Err(IngestError::Invalid("coverage counts must be non-negative".into()));
            }
        }
        for p in &self.profiling {
            if p.name.trim().is_empty() {
                return Err(IngestError::Invalid("profiling point name is empty".into()));
            }
            if p.values.is_empty() {
                return Err(IngestError::Invalid(format!("profiling point {} has no values", p.name)));
            }
            if !p.labels.is_empty() && p.labels.len() != p.values.len() {
                return Err(IngestError::Invalid(format!(
                    "profiling point {} has {} labels for {} values",
                    p.name,
                    p.labels.len(),
                    p.values.len()
                )));
            }
            if p.values.iter().any(|v| !v.is_finite()) {
                return Err(IngestError::Invalid(format!(
                    "profiling point {} has a non-finite value",
                    p.name
                )));
            }
        }
        Ok(())
    }
}

/// Stores `upload` atomically. A re-upload of an existing run stores nothing new.
pub fn ingest(store: &Store, upload: &RunUpload) -> Result<IngestReport, IngestError> {
    upload.validate()?;

    let new_run = NewTestRun {
        test_name: upload.test_name.clone(),
        start_timestamp: upload.start_timestamp,
        end_timestamp: upload.end_timestamp.unwrap_or(upload.start_timestamp),
        devices: upload.devices.clone(),
        coverage: upload.coverage.map(|c| (c.covered, c.total)),
        cases: upload.test_cases.clone(),
    };
    let (branch, device) = upload
        .devices
        .first()
        .map(|d| (d.branch.clone(), d.build_flavor.clone()))
        .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
    let profiling: Vec<(ProfilingPoint, ProfilingRun)> = upload
        .profiling
        .iter()
        .map(|p| {
            (
                ProfilingPoint {
                    test_name: upload.test_name.clone(),
                    name: p.name.clone(),
                    regression_mode: p.regression_mode,
                    x_label: p.x_label.clone(),
                    y_label: p.y_label.clone(),
                },
                ProfilingRun {
                    id: 0,
                    test_name: upload.test_name.clone(),
                    profiling_point: p.name.clone(),
                    start_timestamp: upload.start_timestamp,
                    branch: branch.clone(),
                    device: device.clone(),
                    labels: p.labels.clone(),
                    values: p.values.clone(),
                    options: p.options.clone(),
                },
            )
        })
        .collect();

    let mut report = IngestReport {
        case_count: new_run.cases.len(),
        ..Default::default()
    };
    let Some(ids) = store.ingest_run(&new_run, &profiling)? else {
        tracing::info!(run = %new_run.key(), "run already ingested");
        return Ok(report);
    };
    report.run_inserted = true;
    report.task_keys.push(TaskKey::TestStatus(upload.test_name.clone()));
    if upload.coverage.is_some() {
        report.task_keys.push(TaskKey::TestRun(new_run.key()));
    }
    report
        .task_keys
        .extend(ids.iter().copied().map(TaskKey::ProfilingRun));
    report.profiling_run_ids = ids;

    tracing::info!(
        run = %new_run.key(),
        cases = report.case_count,
        profiling_runs = report.profiling_run_ids.len(),
        "run ingested"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPLOAD: &str = r#"{
        "test_name": "VtsHalBinder",
        "start_timestamp": 1000,
        "devices": [{"branch": "main", "build_flavor": "walleye-userdebug", "build_id": "42"}],
        "coverage": {"covered": 70, "total": 100},
        "test_cases": [
            {"name": "caseA", "result": "pass"},
            {"name": "caseB", "result": "fail"}
        ],
        "profiling": [
            {"name": "latency", "regression_mode": "lower_is_better",
             "labels": ["4", "8"], "values": [10.5, 20.0],
             "options": ["hidl_hal_mode=binderized"]}
        ]
    }"#;

    #[test]
    fn ingest_stores_run_and_profiling_once() {
        let store = Store::memory().unwrap();
        let upload = RunUpload::from_json(UPLOAD).unwrap();

        let first = ingest(&store, &upload).unwrap();
        assert!(first.run_inserted);
        assert_eq!(first.case_count, 2);
        assert_eq!(first.profiling_run_ids.len(), 1);
        assert_eq!(
            first.task_keys.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec![
                "test_status:VtsHalBinder".to_string(),
                "test_run:VtsHalBinder:1000".to_string(),
                format!("profiling_run:{}", first.profiling_run_ids[0]),
            ]
        );

        let again = ingest(&store, &upload).unwrap();
        assert!(!again.run_inserted);
        assert!(again.profiling_run_ids.is_empty());

        let run = store.profiling_run(first.profiling_run_ids[0]).unwrap().unwrap();
        assert_eq!(run.device, "walleye-userdebug");
        let point = store.profiling_point("VtsHalBinder", "latency").unwrap().unwrap();
        assert_eq!(point.regression_mode, RegressionMode::LowerIsBetter);
    }

    #[test]
    fn rejects_label_value_mismatch() {
        let raw = r#"{"test_name": "t", "start_timestamp": 1,
            "profiling": [{"name": "p", "labels": ["a"], "values": [1.0, 2.0]}]}"#;
        assert!(matches!(RunUpload::from_json(raw), Err(IngestError::Invalid(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(RunUpload::from_json("{"), Err(IngestError::Parse(_))));
    }
}
