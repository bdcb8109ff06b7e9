//! Status and coverage snapshots with monotonic-timestamp writes.

use super::txn::{immediate_impl, Finish};
use crate::errors::StoreError;
use crate::model::{CoverageStatus, StatusSnapshot, TestCaseReference};
use crate::storage::store::WriteOutcome;
use rusqlite::{params, Connection, OptionalExtension};

pub(crate) fn get_status_impl(
    conn: &Connection,
    test_name: &str,
) -> Result<Option<StatusSnapshot>, StoreError> {
    let row: Option<(i64, i64, i64, String)> = conn
        .query_row(
            "SELECT updated_timestamp, pass_count, fail_count, failing_json
             FROM test_status WHERE test_name = ?1",
            params![test_name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    row.map(|(updated_timestamp, pass, fail, failing_json)| {
        let failing_cases: Vec<TestCaseReference> = serde_json::from_str(&failing_json)
            .map_err(|e| StoreError::corrupt(format!("status of {test_name}"), e))?;
        Ok(StatusSnapshot {
            test_name: test_name.to_string(),
            updated_timestamp,
            pass_count: pass as u32,
            fail_count: fail as u32,
            failing_cases,
        })
    })
    .transpose()
}

pub(crate) fn commit_status_if_newer_impl(
    conn: &Connection,
    snapshot: &StatusSnapshot,
) -> Result<WriteOutcome, StoreError> {
    let failing_json = serde_json::to_string(&snapshot.failing_cases)?;
    immediate_impl(conn, |conn| {
        let stored: Option<i64> = conn
            .query_row(
                "SELECT updated_timestamp FROM test_status WHERE test_name = ?1",
                params![snapshot.test_name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(stored) = stored {
            if stored >= snapshot.updated_timestamp {
                return Ok(Finish::Rollback(WriteOutcome::Stale {
                    stored_timestamp: stored,
                }));
            }
        }

        conn.execute(
            "INSERT INTO test_status(test_name, updated_timestamp, pass_count, fail_count, failing_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(test_name) DO UPDATE SET
                updated_timestamp = excluded.updated_timestamp,
                pass_count = excluded.pass_count,
                fail_count = excluded.fail_count,
                failing_json = excluded.failing_json",
            params![
                snapshot.test_name,
                snapshot.updated_timestamp,
                i64::from(snapshot.pass_count),
                i64::from(snapshot.fail_count),
                failing_json,
            ],
        )?;
        Ok(Finish::Commit(WriteOutcome::Committed))
    })
}

pub(crate) fn get_coverage_status_impl(
    conn: &Connection,
    test_name: &str,
) -> Result<Option<CoverageStatus>, StoreError> {
    let status = conn
        .query_row(
            "SELECT updated_timestamp, covered_line_count, total_line_count
             FROM coverage_status WHERE test_name = ?1",
            params![test_name],
            |row| {
                Ok(CoverageStatus {
                    test_name: test_name.to_string(),
                    updated_timestamp: row.get(0)?,
                    covered_line_count: row.get(1)?,
                    total_line_count: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(status)
}

pub(crate) fn commit_coverage_if_newer_impl(
    conn: &Connection,
    status: &CoverageStatus,
) -> Result<WriteOutcome, StoreError> {
    immediate_impl(conn, |conn| {
        let stored: Option<i64> = conn
            .query_row(
                "SELECT updated_timestamp FROM coverage_status WHERE test_name = ?1",
                params![status.test_name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(stored) = stored {
            if stored >= status.updated_timestamp {
                return Ok(Finish::Rollback(WriteOutcome::Stale {
                    stored_timestamp: stored,
                }));
            }
        }

        conn.execute(
            "INSERT INTO coverage_status(test_name, updated_timestamp, covered_line_count, total_line_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(test_name) DO UPDATE SET
                updated_timestamp = excluded.updated_timestamp,
                covered_line_count = excluded.covered_line_count,
                total_line_count = excluded.total_line_count",
            params![
                status.test_name,
                status.updated_timestamp,
                status.covered_line_count,
                status.total_line_count,
            ],
        )?;
        Ok(Finish::Commit(WriteOutcome::Committed))
    })
}
