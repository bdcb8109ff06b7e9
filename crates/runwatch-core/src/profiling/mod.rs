//! Profiling summaries and the performance digest built from them.

pub mod digest;
pub mod summary;

use crate::model::{ProfilingPoint, ProfilingRun};
use summary::{ProfilingSummary, SummaryKey};

pub use digest::{DeltaCell, DeltaFlag, DigestRow, DigestTable, PerformanceDigest, WindowStats};
pub use summary::{bucket_keys, option_alias, StatSummary, ALL};

/// Applies `run` to each bucket, starting fresh where none was stored yet.
pub fn fold_run(
    existing: Vec<(SummaryKey, Option<ProfilingSummary>)>,
    point: &ProfilingPoint,
    run: &ProfilingRun,
) -> Vec<ProfilingSummary> {
    existing
        .into_iter()
        .map(|(key, stored)| {
            let mut summary = stored.unwrap_or_else(|| ProfilingSummary::new(key, point));
            summary.apply(run);
            summary
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegressionMode;
    use proptest::prelude::*;

    fn point() -> ProfilingPoint {
        ProfilingPoint {
            test_name: "t".into(),
            name: "p".into(),
            regression_mode: RegressionMode::LowerIsBetter,
            x_label: String::new(),
            y_label: String::new(),
        }
    }

    fn scalar_run(value: f64) -> ProfilingRun {
        ProfilingRun {
            id: 0,
            test_name: "t".into(),
            profiling_point: "p".into(),
            start_timestamp: 0,
            branch: "main".into(),
            device: "walleye".into(),
            labels: vec![],
            values: vec![value],
            options: vec![],
        }
    }

    fn key() -> SummaryKey {
        SummaryKey {
            test_name: "t".into(),
            profiling_point: "p".into(),
            branch: ALL.into(),
            device: ALL.into(),
            option_alias: String::new(),
            day_start: 0,
        }
    }

    fn fold_all(values: &[f64]) -> ProfilingSummary {
        let mut stored: Option<ProfilingSummary> = None;
        for v in values {
            stored = fold_run(vec![(key(), stored)], &point(), &scalar_run(*v)).pop();
        }
        stored.unwrap_or_else(|| ProfilingSummary::new(key(), &point()))
    }

    proptest! {
        #[test]
        fn fold_order_does_not_matter(
            (values, shuffled) in proptest::collection::vec(-1.0e6f64..1.0e6, 1..40)
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            let forward = fold_all(&values);
            let permuted = fold_all(&shuffled);
            let batch = StatSummary::from_samples("p", &values, RegressionMode::LowerIsBetter);

            let tol = |a: f64, b: f64| (a - b).abs() <= 1e-6 * (1.0 + a.abs().max(b.abs()));
            prop_assert_eq!(forward.global.count, batch.count);
            prop_assert!(tol(forward.global.mean, batch.mean));
            prop_assert!(tol(permuted.global.mean, batch.mean));
            prop_assert!(tol(forward.global.std(), batch.std()));
            prop_assert!(tol(permuted.global.std(), batch.std()));
            prop_assert_eq!(forward.global.best, batch.best);
            prop_assert_eq!(permuted.global.best, batch.best);
        }
    }
}
