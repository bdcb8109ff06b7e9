//! Streaming statistics for profiling points.
//!
//! Summaries are folded one sample at a time (Welford) and can be combined
//! across buckets with the parallel merge. Both are equivalent to a batch
//! computation over all contributing samples, up to float rounding.

use crate::model::{ProfilingPoint, ProfilingRun, RegressionMode};
use serde::{Deserialize, Serialize};

/// Aggregate bucket value for branch and device.
pub const ALL: &str = "ALL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatSummary {
    pub label: String,
    pub count: u64,
    pub mean: f64,
    /// Sum of squared deviations from the mean.
    pub m2: f64,
    pub best: f64,
}

impl StatSummary {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: 0,
            mean: 0.0,
            m2: 0.0,
            best: 0.0,
        }
    }

    pub fn from_samples(label: impl Into<String>, samples: &[f64], mode: RegressionMode) -> Self {
        let mut out = Self::new(label);
        if samples.is_empty() {
            return out;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        out.count = samples.len() as u64;
        out.mean = mean;
        out.m2 = samples.iter().map(|x| (x - mean) * (x - mean)).sum();
        out.best = samples
            .iter()
            .copied()
            .reduce(|a, b| mode.best_of(a, b))
            .unwrap_or(0.0);
        out
    }

    pub fn update(&mut self, x: f64, mode: RegressionMode) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.best = if self.count == 1 {
            x
        } else {
            mode.best_of(self.best, x)
        };
    }

    /// Combines two disjoint sample sets (Chan et al.).
    pub fn merge(&mut self, other: &StatSummary, mode: RegressionMode) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.count = other.count;
            self.mean = other.mean;
            self.m2 = other.m2;
            self.best = other.best;
            return;
        }
        let a = self.count as f64;
        let b = other.count as f64;
        let n = a + b;
        let delta = other.mean - self.mean;
        self.mean += delta * b / n;
        self.m2 += other.m2 + delta * delta * a * b / n;
        self.count += other.count;
        self.best = mode.best_of(self.best, other.best);
    }

    /// Population standard deviation.
    pub fn std(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0).sqrt()
        }
    }
}

/// Bucket identity of a profiling summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SummaryKey {
    pub test_name: String,
    pub profiling_point: String,
    pub branch: String,
    pub device: String,
    pub option_alias: String,
    /// Canonical day start, microseconds since the epoch.
    pub day_start: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfilingSummary {
    pub key: SummaryKey,
    pub regression_mode: RegressionMode,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    pub global: StatSummary,
    /// Per-label statistics in first-seen order.
    pub labels: Vec<StatSummary>,
}

impl ProfilingSummary {
    pub fn new(key: SummaryKey, point: &ProfilingPoint) -> Self {
        let global = StatSummary::new(point.name.clone());
        Self {
            key,
            regression_mode: point.regression_mode,
            x_label: point.x_label.clone(),
            y_label: point.y_label.clone(),
            global,
            labels: Vec::new(),
        }
    }

    /// Folds every sample of `run` into the global and per-label statistics.
    pub fn apply(&mut self, run: &ProfilingRun) {
        let mode = self.regression_mode;
        for (label, value) in run.samples() {
            self.global.update(value, mode);
            if let Some(label) = label {
                self.label_mut(label).update(value, mode);
            }
        }
    }

    pub fn label(&self, label: &str) -> Option<&StatSummary> {
        self.labels.iter().find(|s| s.label == label)
    }

    fn label_mut(&mut self, label: &str) -> &mut StatSummary {
        let idx = match self.labels.iter().position(|s| s.label == label) {
            Some(i) => i,
            None => {
                self.labels.push(StatSummary::new(label));
                self.labels.len() - 1
            }
        };
        &mut self.labels[idx]
    }
}

/// Derives the option alias from `key=value` run options, e.g. the HAL mode.
///
/// Values of the configured keys are joined with `-` in configuration order;
/// options that are not `key=value` pairs are ignored.
pub fn option_alias(options: &[String], option_keys: &[String]) -> String {
    option_keys
        .iter()
        .filter_map(|wanted| {
            options.iter().find_map(|opt| {
                let (k, v) = opt.split_once('=')?;
                (k.trim() == wanted.as_str()).then(|| v.trim().to_string())
            })
        })
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Buckets a run contributes to: its own branch/device plus the `ALL` aggregates.
pub fn bucket_keys(run: &ProfilingRun, option_alias: &str, day_start: i64) -> Vec<SummaryKey> {
    let mut keys = Vec::with_capacity(4);
    for branch in [run.branch.as_str(), ALL] {
        for device in [run.device.as_str(), ALL] {
            let key = SummaryKey {
                test_name: run.test_name.clone(),
                profiling_point: run.profiling_point.clone(),
                branch: branch.to_string(),
                device: device.to_string(),
                option_alias: option_alias.to_string(),
                day_start,
            };
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
    }

    fn point(mode: RegressionMode) -> ProfilingPoint {
        ProfilingPoint {
            test_name: "VtsHalBinder".into(),
            name: "latency".into(),
            regression_mode: mode,
            x_label: "size".into(),
            y_label: "ns".into(),
        }
    }

    fn run(labels: &[&str], values: &[f64], branch: &str, device: &str) -> ProfilingRun {
        ProfilingRun {
            id: 1,
            test_name: "VtsHalBinder".into(),
            profiling_point: "latency".into(),
            start_timestamp: 0,
            branch: branch.into(),
            device: device.into(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            values: values.to_vec(),
            options: vec![],
        }
    }

    #[test]
    fn incremental_matches_batch() {
        let xs = [4.0, 7.0, 13.0, 16.0, 1.5];
        let mut s = StatSummary::new("x");
        for x in xs {
            s.update(x, RegressionMode::LowerIsBetter);
        }
        let batch = StatSummary::from_samples("x", &xs, RegressionMode::LowerIsBetter);
        assert_eq!(s.count, 5);
        assert!(close(s.mean, batch.mean));
        assert!(close(s.std(), batch.std()));
        assert_eq!(s.best, 1.5);
    }

    #[test]
    fn best_follows_regression_mode() {
        let xs = [3.0, 9.0, 5.0];
        let hi = StatSummary::from_samples("x", &xs, RegressionMode::HigherIsBetter);
        let lo = StatSummary::from_samples("x", &xs, RegressionMode::LowerIsBetter);
        assert_eq!(hi.best, 9.0);
        assert_eq!(lo.best, 3.0);
    }

    #[test]
    fn merge_of_partitions_equals_whole() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mode = RegressionMode::HigherIsBetter;
        let mut left = StatSummary::from_samples("x", &xs[..3], mode);
        let right = StatSummary::from_samples("x", &xs[3..], mode);
        left.merge(&right, mode);
        assert_eq!(left.count, 8);
        assert!(close(left.mean, 5.0));
        assert!(close(left.std(), 2.0));
        assert_eq!(left.best, 9.0);
    }

    #[test]
    fn merge_into_empty_copies() {
        let mode = RegressionMode::HigherIsBetter;
        let mut empty = StatSummary::new("x");
        let other = StatSummary::from_samples("x", &[1.0, 3.0], mode);
        empty.merge(&other, mode);
        assert_eq!(empty, other);
    }

    #[test]
    fn apply_updates_global_and_labels() {
        let key = SummaryKey {
            test_name: "VtsHalBinder".into(),
            profiling_point: "latency".into(),
            branch: ALL.into(),
            device: ALL.into(),
            option_alias: String::new(),
            day_start: 0,
        };
        let mut summary = ProfilingSummary::new(key, &point(RegressionMode::LowerIsBetter));
        summary.apply(&run(&["4", "8"], &[10.0, 20.0], "main", "walleye"));
        summary.apply(&run(&["4", "8"], &[12.0, 18.0], "main", "walleye"));

        assert_eq!(summary.global.count, 4);
        assert_eq!(summary.labels.len(), 2);
        let four = summary.label("4").unwrap();
        assert_eq!(four.count, 2);
        assert!(close(four.mean, 11.0));
        assert_eq!(four.best, 10.0);
        assert_eq!(summary.label("8").unwrap().best, 18.0);
    }

    #[test]
    fn scalar_run_only_touches_global() {
        let key = SummaryKey {
            test_name: "t".into(),
            profiling_point: "p".into(),
            branch: ALL.into(),
            device: ALL.into(),
            option_alias: String::new(),
            day_start: 0,
        };
        let mut summary = ProfilingSummary::new(key, &point(RegressionMode::HigherIsBetter));
        summary.apply(&run(&[], &[42.0], "main", "walleye"));
        assert_eq!(summary.global.count, 1);
        assert!(summary.labels.is_empty());
    }

    #[test]
    fn option_alias_uses_configured_keys_in_order() {
        let opts = vec![
            "hidl_hal_mode=binderized".to_string(),
            "abi=arm64".to_string(),
            "junk".to_string(),
        ];
        let keys = vec!["abi".to_string(), "hidl_hal_mode".to_string()];
        assert_eq!(option_alias(&opts, &keys), "arm64-binderized");
        assert_eq!(option_alias(&opts, &["missing".to_string()]), "");
    }

    #[test]
    fn bucket_keys_include_all_aggregates() {
        let keys = bucket_keys(&run(&[], &[1.0], "main", "walleye"), "", 0);
        let pairs: Vec<(&str, &str)> = keys
            .iter()
            .map(|k| (k.branch.as_str(), k.device.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("main", "walleye"), ("main", ALL), (ALL, "walleye"), (ALL, ALL)]
        );
    }

    #[test]
    fn bucket_keys_dedupe_when_run_is_already_all() {
        let keys = bucket_keys(&run(&[], &[1.0], ALL, ALL), "", 0);
        assert_eq!(keys.len(), 1);
    }
}
