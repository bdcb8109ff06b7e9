//! Test run and test case run read/write paths.

use crate::errors::StoreError;
use crate::model::{DeviceInfo, RunKey, TestCase, TestCaseRun, TestRun};
use crate::storage::store::NewTestRun;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

/// Maximum test cases stored per case run row.
pub(crate) const CASES_PER_CASE_RUN: usize = 1000;

const RUN_COLUMNS: &str = "test_name, start_timestamp, end_timestamp, covered_line_count, \
                           total_line_count, has_coverage, devices_json";

struct RunRow {
    test_name: String,
    start_timestamp: i64,
    end_timestamp: i64,
    covered_line_count: i64,
    total_line_count: i64,
    has_coverage: bool,
    devices_json: String,
}

fn run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        test_name: row.get(0)?,
        start_timestamp: row.get(1)?,
        end_timestamp: row.get(2)?,
        covered_line_count: row.get(3)?,
        total_line_count: row.get(4)?,
        has_coverage: row.get::<_, i64>(5)? != 0,
        devices_json: row.get(6)?,
    })
}

fn hydrate_run(conn: &Connection, r: RunRow) -> Result<TestRun, StoreError> {
    let key = RunKey {
        test_name: r.test_name,
        start_timestamp: r.start_timestamp,
    };
    let devices: Vec<DeviceInfo> = serde_json::from_str(&r.devices_json)
        .map_err(|e| StoreError::corrupt(format!("devices of run {key}"), e))?;
    let case_run_ids = case_run_ids_impl(conn, &key)?;
    Ok(TestRun {
        key,
        end_timestamp: r.end_timestamp,
        case_run_ids,
        covered_line_count: r.covered_line_count,
        total_line_count: r.total_line_count,
        has_coverage: r.has_coverage,
        devices,
    })
}

/// Inserts a run and its case runs. Returns false when the run already exists.
pub(crate) fn insert_test_run_impl(conn: &Connection, run: &NewTestRun) -> Result<bool, StoreError> {
    let (covered, total) = run.coverage.unwrap_or((0, 0));
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO test_runs(
            test_name, start_timestamp, end_timestamp,
            covered_line_count, total_line_count, has_coverage, devices_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            run.test_name,
            run.start_timestamp,
            run.end_timestamp,
            covered,
            total,
            run.coverage.is_some() as i64,
            serde_json::to_string(&run.devices)?,
        ],
    )?;
    if inserted == 0 {
        return Ok(false);
    }

    let mut stmt = conn.prepare_cached(
        "INSERT INTO test_case_runs(test_name, start_timestamp, seq, cases_json)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (seq, chunk) in run.cases.chunks(CASES_PER_CASE_RUN).enumerate() {
        stmt.execute(params![
            run.test_name,
            run.start_timestamp,
            seq as i64,
            serde_json::to_string(chunk)?,
        ])?;
    }
    Ok(true)
}

pub(crate) fn case_run_ids_impl(conn: &Connection, key: &RunKey) -> Result<Vec<i64>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM test_case_runs
         WHERE test_name = ?1 AND start_timestamp = ?2
         ORDER BY seq ASC",
    )?;
    let ids = stmt
        .query_map(params![key.test_name, key.start_timestamp], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

pub(crate) fn get_test_run_impl(conn: &Connection, key: &RunKey) -> Result<Option<TestRun>, StoreError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {RUN_COLUMNS} FROM test_runs WHERE test_name = ?1 AND start_timestamp = ?2"
            ),
            params![key.test_name, key.start_timestamp],
            run_row,
        )
        .optional()?;
    row.map(|r| hydrate_run(conn, r)).transpose()
}

pub(crate) fn latest_run_impl(
    conn: &Connection,
    test_name: &str,
    require_coverage: bool,
) -> Result<Option<TestRun>, StoreError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {RUN_COLUMNS} FROM test_runs
                 WHERE test_name = ?1 AND (?2 = 0 OR has_coverage = 1)
                 ORDER BY start_timestamp DESC LIMIT 1"
            ),
            params![test_name, require_coverage as i64],
            run_row,
        )
        .optional()?;
    row.map(|r| hydrate_run(conn, r)).transpose()
}

/// Runs strictly newer than `after`, most recent first.
pub(crate) fn runs_after_impl(
    conn: &Connection,
    test_name: &str,
    after: i64,
    limit: u32,
) -> Result<Vec<TestRun>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {RUN_COLUMNS} FROM test_runs
         WHERE test_name = ?1 AND start_timestamp > ?2
         ORDER BY start_timestamp DESC
         LIMIT ?3"
    ))?;
    let rows = stmt
        .query_map(params![test_name, after, i64::from(limit)], run_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|r| hydrate_run(conn, r)).collect()
}

/// Batch lookup; ids without a row are simply absent from the map.
pub(crate) fn get_case_runs_impl(
    conn: &Connection,
    ids: &[i64],
) -> Result<HashMap<i64, TestCaseRun>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, test_name, start_timestamp, cases_json FROM test_case_runs WHERE id = ?1",
    )?;
    let mut out = HashMap::with_capacity(ids.len());
    for id in ids {
        if out.contains_key(id) {
            continue;
        }
        let row: Option<(i64, String, i64, String)> = stmt
            .query_row(params![id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .optional()?;
        if let Some((id, test_name, start_timestamp, cases_json)) = row {
            let cases: Vec<TestCase> = serde_json::from_str(&cases_json)
                .map_err(|e| StoreError::corrupt(format!("case run {id}"), e))?;
            out.insert(
                id,
                TestCaseRun {
                    id,
                    run: RunKey {
                        test_name,
                        start_timestamp,
                    },
                    cases,
                },
            );
        }
    }
    Ok(out)
}

/// Every test name with at least one run or a stored status.
pub(crate) fn test_names_impl(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT test_name FROM test_runs
         UNION
         SELECT test_name FROM test_status
         ORDER BY 1",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}
