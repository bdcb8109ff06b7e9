use super::schema::RUNWATCH_SCHEMA;
use super::store_internal::{acks, profiling, runs, status, txn};
use crate::errors::StoreError;
use crate::model::{
    Acknowledgment, CoverageStatus, DeviceInfo, ProfilingPoint, ProfilingRun, RunKey,
    StatusSnapshot, TestCase, TestCaseRun, TestRun,
};
use crate::profiling::summary::{ProfilingSummary, SummaryKey};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Result of a monotonic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// A record at least as new was already stored; nothing was written.
    Stale { stored_timestamp: i64 },
}

/// Result of folding one profiling run into its summary buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { buckets: usize },
    AlreadyApplied,
}

/// A test run as uploaded, before case runs are assigned ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTestRun {
    pub test_name: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub devices: Vec<DeviceInfo>,
    /// `(covered, total)` line counts when the run carried coverage.
    pub coverage: Option<(i64, i64)>,
    pub cases: Vec<TestCase>,
}

impl NewTestRun {
    pub fn key(&self) -> RunKey {
        RunKey {
            test_name: self.test_name.clone(),
            start_timestamp: self.start_timestamp,
        }
    }
}

/// SQLite-backed record store shared by every job.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Create store from existing connection (for multi-connection tests).
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.busy_timeout(Duration::from_millis(5000))?;
        conn.execute_batch(RUNWATCH_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store mutex poisoned".into()))
    }

    // ---- runs ----

    /// Returns false when a run with the same key already exists.
    pub fn insert_test_run(&self, run: &NewTestRun) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        txn::immediate_impl(&conn, |conn| {
            let inserted = runs::insert_test_run_impl(conn, run)?;
            Ok(txn::Finish::Commit(inserted))
        })
    }

    /// Stores a run together with its profiling points and samples in one
    /// transaction. Returns `None`, writing nothing, when the run already exists;
    /// otherwise the new profiling run ids in input order.
    pub fn ingest_run(
        &self,
        run: &NewTestRun,
        profiling: &[(ProfilingPoint, ProfilingRun)],
    ) -> Result<Option<Vec<i64>>, StoreError> {
        let conn = self.lock()?;
        txn::immediate_impl(&conn, |conn| {
            if !runs::insert_test_run_impl(conn, run)? {
                return Ok(txn::Finish::Rollback(None));
            }
            let mut ids = Vec::with_capacity(profiling.len());
            for (point, sample) in profiling {
                profiling::upsert_profiling_point_impl(conn, point)?;
                ids.push(profiling::insert_profiling_run_impl(conn, sample)?);
            }
            Ok(txn::Finish::Commit(Some(ids)))
        })
    }

    pub fn get_test_run(&self, key: &RunKey) -> Result<Option<TestRun>, StoreError> {
        let conn = self.lock()?;
        runs::get_test_run_impl(&conn, key)
    }

    pub fn latest_run(&self, test_name: &str) -> Result<Option<TestRun>, StoreError> {
        let conn = self.lock()?;
        runs::latest_run_impl(&conn, test_name, false)
    }

    pub fn latest_coverage_run(&self, test_name: &str) -> Result<Option<TestRun>, StoreError> {
        let conn = self.lock()?;
        runs::latest_run_impl(&conn, test_name, true)
    }

    /// Runs that started strictly after `after`, most recent first.
    pub fn runs_after(
        &self,
        test_name: &str,
        after: i64,
        limit: u32,
    ) -> Result<Vec<TestRun>, StoreError> {
        let conn = self.lock()?;
        runs::runs_after_impl(&conn, test_name, after, limit)
    }

    pub fn get_case_runs(&self, ids: &[i64]) -> Result<HashMap<i64, TestCaseRun>, StoreError> {
        let conn = self.lock()?;
        runs::get_case_runs_impl(&conn, ids)
    }

    pub fn test_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        runs::test_names_impl(&conn)
    }

    // ---- status ----

    pub fn get_status(&self, test_name: &str) -> Result<Option<StatusSnapshot>, StoreError> {
        let conn = self.lock()?;
        status::get_status_impl(&conn, test_name)
    }

    /// Writes `snapshot` only if its timestamp is newer than the stored one.
    pub fn commit_status_if_newer(
        &self,
        snapshot: &StatusSnapshot,
    ) -> Result<WriteOutcome, StoreError> {
        let conn = self.lock()?;
        status::commit_status_if_newer_impl(&conn, snapshot)
    }

    pub fn get_coverage_status(&self, test_name: &str) -> Result<Option<CoverageStatus>, StoreError> {
        let conn = self.lock()?;
        status::get_coverage_status_impl(&conn, test_name)
    }

    pub fn commit_coverage_if_newer(
        &self,
        coverage: &CoverageStatus,
    ) -> Result<WriteOutcome, StoreError> {
        let conn = self.lock()?;
        status::commit_coverage_if_newer_impl(&conn, coverage)
    }

    // ---- acknowledgments and subscriptions ----

    /// Stores a new rule and returns its id; the `id` field of `ack` is ignored.
    pub fn insert_acknowledgment(&self, ack: &Acknowledgment) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        acks::insert_acknowledgment_impl(&conn, ack)
    }

    pub fn acknowledgments(&self, test_name: &str) -> Result<Vec<Acknowledgment>, StoreError> {
        let conn = self.lock()?;
        acks::acknowledgments_impl(&conn, test_name)
    }

    pub fn delete_acknowledgment(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        acks::delete_acknowledgment_impl(&conn, id)
    }

    pub fn add_subscriber(&self, test_name: &str, email: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        acks::add_subscriber_impl(&conn, test_name, email)
    }

    pub fn subscribers(&self, test_name: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        acks::subscribers_impl(&conn, test_name)
    }

    // ---- profiling ----

    pub fn upsert_profiling_point(&self, point: &ProfilingPoint) -> Result<(), StoreError> {
        let conn = self.lock()?;
        profiling::upsert_profiling_point_impl(&conn, point)
    }

    pub fn profiling_point(
        &self,
        test_name: &str,
        name: &str,
    ) -> Result<Option<ProfilingPoint>, StoreError> {
        let conn = self.lock()?;
        profiling::profiling_point_impl(&conn, test_name, name)
    }

    pub fn profiling_points(&self, test_name: &str) -> Result<Vec<ProfilingPoint>, StoreError> {
        let conn = self.lock()?;
        profiling::profiling_points_impl(&conn, test_name)
    }

    /// Stores a run and returns its id; the `id` field of `run` is ignored.
    pub fn insert_profiling_run(&self, run: &ProfilingRun) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        profiling::insert_profiling_run_impl(&conn, run)
    }

    pub fn profiling_run(&self, id: i64) -> Result<Option<ProfilingRun>, StoreError> {
        let conn = self.lock()?;
        profiling::profiling_run_impl(&conn, id)
    }

    pub fn unapplied_profiling_runs(&self, limit: u32) -> Result<Vec<i64>, StoreError> {
        let conn = self.lock()?;
        profiling::unapplied_profiling_runs_impl(&conn, limit)
    }

    /// Atomically folds run `run_id` into the buckets named by `keys`.
    ///
    /// `fold` receives each key with its stored summary (if any) and returns
    /// the summaries to write back. Runs already folded are skipped.
    pub fn apply_profiling_run<F>(
        &self,
        run_id: i64,
        keys: &[SummaryKey],
        fold: F,
    ) -> Result<ApplyOutcome, StoreError>
    where
        F: FnOnce(Vec<(SummaryKey, Option<ProfilingSummary>)>) -> Vec<ProfilingSummary>,
    {
        let conn = self.lock()?;
        profiling::apply_profiling_run_impl(&conn, run_id, keys, fold)
    }

    pub fn summaries_in_range(
        &self,
        test_name: &str,
        profiling_point: &str,
        branch: &str,
        device: &str,
        from_day: i64,
        to_day: i64,
    ) -> Result<Vec<ProfilingSummary>, StoreError> {
        let conn = self.lock()?;
        profiling::summaries_in_range_impl(
            &conn,
            test_name,
            profiling_point,
            branch,
            device,
            from_day,
            to_day,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TestCaseReference, TestCaseResult};

    fn case(name: &str, result: TestCaseResult) -> TestCase {
        TestCase {
            name: name.into(),
            result,
        }
    }

    fn new_run(start: i64, cases: Vec<TestCase>) -> NewTestRun {
        NewTestRun {
            test_name: "VtsKernelLtp".into(),
            start_timestamp: start,
            end_timestamp: start + 10,
            devices: vec![DeviceInfo {
                branch: "main".into(),
                build_flavor: "walleye-userdebug".into(),
                ..Default::default()
            }],
            coverage: None,
            cases,
        }
    }

    #[test]
    fn insert_run_is_idempotent_and_chunks_cases() {
        let store = Store::memory().unwrap();
        let cases: Vec<TestCase> = (0..2500)
            .map(|i| case(&format!("case{i}"), TestCaseResult::Pass))
            .collect();
        let run = new_run(100, cases);

        assert!(store.insert_test_run(&run).unwrap());
        assert!(!store.insert_test_run(&run).unwrap());

        let stored = store.get_test_run(&run.key()).unwrap().unwrap();
        assert_eq!(stored.case_run_ids.len(), 3);
        let case_runs = store.get_case_runs(&stored.case_run_ids).unwrap();
        assert_eq!(case_runs[&stored.case_run_ids[2]].cases.len(), 500);
        assert_eq!(
            case_runs[&stored.case_run_ids[1]].case_at(0).unwrap().name,
            "case1000"
        );
    }

    fn sample_point(name: &str) -> (ProfilingPoint, ProfilingRun) {
        (
            ProfilingPoint {
                test_name: "VtsKernelLtp".into(),
                name: name.into(),
                regression_mode: crate::model::RegressionMode::LowerIsBetter,
                x_label: String::new(),
                y_label: String::new(),
            },
            ProfilingRun {
                id: 0,
                test_name: "VtsKernelLtp".into(),
                profiling_point: name.into(),
                start_timestamp: 100,
                branch: "main".into(),
                device: "walleye-userdebug".into(),
                labels: Vec::new(),
                values: vec![1.5],
                options: Vec::new(),
            },
        )
    }

    #[test]
    fn ingest_run_rolls_back_when_a_sample_fails() {
        let store = Store::memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_samples BEFORE INSERT ON profiling_runs
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let run = new_run(100, vec![case("a", TestCaseResult::Pass)]);
        let samples = [sample_point("latency")];

        assert!(store.ingest_run(&run, &samples).is_err());
        assert!(store.get_test_run(&run.key()).unwrap().is_none());
        assert!(store.profiling_point("VtsKernelLtp", "latency").unwrap().is_none());

        store
            .lock()
            .unwrap()
            .execute_batch("DROP TRIGGER reject_samples")
            .unwrap();
        let ids = store.ingest_run(&run, &samples).unwrap().unwrap();
        assert_eq!(ids.len(), 1);
        assert!(store.profiling_run(ids[0]).unwrap().is_some());
        assert_eq!(store.ingest_run(&run, &samples).unwrap(), None);
        assert_eq!(store.unapplied_profiling_runs(10).unwrap(), ids);
    }

    #[test]
    fn runs_after_is_strict_and_newest_first() {
        let store = Store::memory().unwrap();
        for ts in [10, 20, 30] {
            store.insert_test_run(&new_run(ts, vec![])).unwrap();
        }
        let got: Vec<i64> = store
            .runs_after("VtsKernelLtp", 10, 100)
            .unwrap()
            .iter()
            .map(TestRun::start_timestamp)
            .collect();
        assert_eq!(got, vec![30, 20]);
        assert_eq!(store.runs_after("VtsKernelLtp", 0, 1).unwrap().len(), 1);
    }

    #[test]
    fn missing_case_run_ids_are_absent() {
        let store = Store::memory().unwrap();
        let map = store.get_case_runs(&[42]).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn status_commit_is_monotonic() {
        let store = Store::memory().unwrap();
        let snap = |ts| StatusSnapshot {
            test_name: "t".into(),
            updated_timestamp: ts,
            pass_count: 1,
            fail_count: 1,
            failing_cases: vec![TestCaseReference {
                case_run_id: 1,
                offset: 0,
            }],
        };

        assert_eq!(
            store.commit_status_if_newer(&snap(100)).unwrap(),
            WriteOutcome::Committed
        );
        assert_eq!(
            store.commit_status_if_newer(&snap(90)).unwrap(),
            WriteOutcome::Stale {
                stored_timestamp: 100
            }
        );
        assert_eq!(
            store.commit_status_if_newer(&snap(100)).unwrap(),
            WriteOutcome::Stale {
                stored_timestamp: 100
            }
        );
        let stored = store.get_status("t").unwrap().unwrap();
        assert_eq!(stored.updated_timestamp, 100);
        assert_eq!(stored.failing_cases.len(), 1);
    }

    #[test]
    fn acknowledgments_round_trip_sets() {
        let store = Store::memory().unwrap();
        let ack = Acknowledgment {
            test_name: "t".into(),
            user: "oncall@example.com".into(),
            branches: ["main".to_string()].into_iter().collect(),
            test_case_names: ["caseA".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let id = store.insert_acknowledgment(&ack).unwrap();
        let listed = store.acknowledgments("t").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert!(listed[0].devices.is_empty());
        assert!(listed[0].branches.contains("main"));

        assert!(store.delete_acknowledgment(id).unwrap());
        assert!(store.acknowledgments("t").unwrap().is_empty());
    }

    #[test]
    fn subscribers_are_unique() {
        let store = Store::memory().unwrap();
        assert!(store.add_subscriber("t", "a@example.com").unwrap());
        assert!(!store.add_subscriber("t", "a@example.com").unwrap());
        assert_eq!(store.subscribers("t").unwrap(), vec!["a@example.com"]);
    }

    #[test]
    fn apply_profiling_run_only_once() {
        let store = Store::memory().unwrap();
        let key = SummaryKey {
            test_name: "t".into(),
            profiling_point: "p".into(),
            branch: "ALL".into(),
            device: "ALL".into(),
            option_alias: String::new(),
            day_start: 0,
        };
        let point = ProfilingPoint {
            test_name: "t".into(),
            name: "p".into(),
            regression_mode: Default::default(),
            x_label: String::new(),
            y_label: String::new(),
        };
        let fold = |existing: Vec<(SummaryKey, Option<ProfilingSummary>)>| {
            existing
                .into_iter()
                .map(|(k, s)| s.unwrap_or_else(|| ProfilingSummary::new(k, &point)))
                .collect()
        };

        let first = store
            .apply_profiling_run(7, std::slice::from_ref(&key), fold)
            .unwrap();
        assert_eq!(first, ApplyOutcome::Applied { buckets: 1 });
        let second = store
            .apply_profiling_run(7, std::slice::from_ref(&key), fold)
            .unwrap();
        assert_eq!(second, ApplyOutcome::AlreadyApplied);

        let rows = store
            .summaries_in_range("t", "p", "ALL", "ALL", 0, 0)
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
