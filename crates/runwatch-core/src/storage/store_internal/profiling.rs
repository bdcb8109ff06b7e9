//! Profiling points, runs and day-bucketed summaries.

use super::txn::{immediate_impl, Finish};
use crate::errors::StoreError;
use crate::model::{ProfilingPoint, ProfilingRun, RegressionMode};
use crate::profiling::summary::{ProfilingSummary, SummaryKey};
use crate::storage::store::ApplyOutcome;
use rusqlite::{params, Connection, OptionalExtension};

pub(crate) fn upsert_profiling_point_impl(
    conn: &Connection,
    point: &ProfilingPoint,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO profiling_points(test_name, name, regression_mode, x_label, y_label)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(test_name, name) DO UPDATE SET
            regression_mode = excluded.regression_mode,
            x_label = excluded.x_label,
            y_label = excluded.y_label",
        params![
            point.test_name,
            point.name,
            point.regression_mode.as_str(),
            point.x_label,
            point.y_label,
        ],
    )?;
    Ok(())
}

type PointRow = (String, String, String, String);

fn point_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PointRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn hydrate_point(
    test_name: &str,
    (name, mode, x_label, y_label): PointRow,
) -> Result<ProfilingPoint, StoreError> {
    let regression_mode = RegressionMode::parse(&mode).ok_or_else(|| {
        StoreError::corrupt(
            format!("profiling point {test_name}/{name}"),
            format!("unknown regression mode '{mode}'"),
        )
    })?;
    Ok(ProfilingPoint {
        test_name: test_name.to_string(),
        name,
        regression_mode,
        x_label,
        y_label,
    })
}

pub(crate) fn profiling_point_impl(
    conn: &Connection,
    test_name: &str,
    name: &str,
) -> Result<Option<ProfilingPoint>, StoreError> {
    let row = conn
        .query_row(
            "SELECT name, regression_mode, x_label, y_label
             FROM profiling_points WHERE test_name = ?1 AND name = ?2",
            params![test_name, name],
            point_row,
        )
        .optional()?;
    row.map(|r| hydrate_point(test_name, r)).transpose()
}

pub(crate) fn profiling_points_impl(
    conn: &Connection,
    test_name: &str,
) -> Result<Vec<ProfilingPoint>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT name, regression_mode, x_label, y_label
         FROM profiling_points WHERE test_name = ?1 ORDER BY name ASC",
    )?;
    let rows = stmt
        .query_map(params![test_name], point_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|r| hydrate_point(test_name, r)).collect()
}

pub(crate) fn insert_profiling_run_impl(
    conn: &Connection,
    run: &ProfilingRun,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO profiling_runs(
            test_name, profiling_point, start_timestamp, branch, device,
            labels_json, values_json, options_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run.test_name,
            run.profiling_point,
            run.start_timestamp,
            run.branch,
            run.device,
            serde_json::to_string(&run.labels)?,
            serde_json::to_string(&run.values)?,
            serde_json::to_string(&run.options)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn profiling_run_impl(conn: &Connection, id: i64) -> Result<Option<ProfilingRun>, StoreError> {
    type Row = (String, String, i64, String, String, String, String, String);
    let row: Option<Row> = conn
        .query_row(
            "SELECT test_name, profiling_point, start_timestamp, branch, device,
                    labels_json, values_json, options_json
             FROM profiling_runs WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            },
        )
        .optional()?;

    let Some((test_name, profiling_point, start_timestamp, branch, device, labels, values, options)) =
        row
    else {
        return Ok(None);
    };
    let what = || format!("profiling run {id}");
    Ok(Some(ProfilingRun {
        id,
        test_name,
        profiling_point,
        start_timestamp,
        branch,
        device,
        labels: serde_json::from_str(&labels).map_err(|e| StoreError::corrupt(what(), e))?,
        values: serde_json::from_str(&values).map_err(|e| StoreError::corrupt(what(), e))?,
        options: serde_json::from_str(&options).map_err(|e| StoreError::corrupt(what(), e))?,
    }))
}

pub(crate) fn unapplied_profiling_runs_impl(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<i64>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT r.id FROM profiling_runs r
         LEFT JOIN profiling_runs_applied a ON a.run_id = r.id
         WHERE a.run_id IS NULL
         ORDER BY r.id ASC
         LIMIT ?1",
    )?;
    let ids = stmt
        .query_map(params![i64::from(limit)], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn get_summary_impl(conn: &Connection, key: &SummaryKey) -> Result<Option<ProfilingSummary>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT summary_json FROM profiling_summaries
             WHERE test_name = ?1 AND profiling_point = ?2 AND branch = ?3
               AND device = ?4 AND option_alias = ?5 AND day_start = ?6",
            params![
                key.test_name,
                key.profiling_point,
                key.branch,
                key.device,
                key.option_alias,
                key.day_start,
            ],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|s| {
        serde_json::from_str(&s).map_err(|e| StoreError::corrupt(format!("summary {key:?}"), e))
    })
    .transpose()
}

fn put_summary_impl(conn: &Connection, summary: &ProfilingSummary) -> Result<(), StoreError> {
    let key = &summary.key;
    conn.execute(
        "INSERT INTO profiling_summaries(
            test_name, profiling_point, branch, device, option_alias, day_start, summary_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(test_name, profiling_point, branch, device, option_alias, day_start)
         DO UPDATE SET summary_json = excluded.summary_json",
        params![
            key.test_name,
            key.profiling_point,
            key.branch,
            key.device,
            key.option_alias,
            key.day_start,
            serde_json::to_string(summary)?,
        ],
    )?;
    Ok(())
}

/// Reads every bucket in `keys`, lets `fold` update them and writes them back,
/// all in one transaction. A run is folded at most once.
pub(crate) fn apply_profiling_run_impl<F>(
    conn: &Connection,
    run_id: i64,
    keys: &[SummaryKey],
    fold: F,
) -> Result<ApplyOutcome, StoreError>
where
    F: FnOnce(Vec<(SummaryKey, Option<ProfilingSummary>)>) -> Vec<ProfilingSummary>,
{
    immediate_impl(conn, |conn| {
        let applied = conn
            .query_row(
                "SELECT 1 FROM profiling_runs_applied WHERE run_id = ?1",
                params![run_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if applied {
            return Ok(Finish::Rollback(ApplyOutcome::AlreadyApplied));
        }

        let mut existing = Vec::with_capacity(keys.len());
        for key in keys {
            existing.push((key.clone(), get_summary_impl(conn, key)?));
        }
        let updated = fold(existing);
        for summary in &updated {
            put_summary_impl(conn, summary)?;
        }
        conn.execute(
            "INSERT INTO profiling_runs_applied(run_id, applied_at) VALUES (?1, ?2)",
            params![run_id, crate::storage::now_rfc3339()],
        )?;
        Ok(Finish::Commit(ApplyOutcome::Applied {
            buckets: updated.len(),
        }))
    })
}

/// Summaries of one bucket series with `day_start` in `[from_day, to_day]`.
pub(crate) fn summaries_in_range_impl(
    conn: &Connection,
    test_name: &str,
    profiling_point: &str,
    branch: &str,
    device: &str,
    from_day: i64,
    to_day: i64,
) -> Result<Vec<ProfilingSummary>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT summary_json FROM profiling_summaries
         WHERE test_name = ?1 AND profiling_point = ?2 AND branch = ?3 AND device = ?4
           AND day_start >= ?5 AND day_start <= ?6
         ORDER BY option_alias ASC, day_start ASC",
    )?;
    let raws = stmt
        .query_map(
            params![test_name, profiling_point, branch, device, from_day, to_day],
            |row| row.get::<_, String>(0),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    raws.iter()
        .map(|s| {
            serde_json::from_str(s).map_err(|e| {
                StoreError::corrupt(format!("summary of {test_name}/{profiling_point}"), e)
            })
        })
        .collect()
}
