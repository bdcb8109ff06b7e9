//! Acknowledgment rules and notification subscriptions.

use crate::errors::StoreError;
use crate::model::Acknowledgment;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

pub(crate) fn insert_acknowledgment_impl(
    conn: &Connection,
    ack: &Acknowledgment,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO acknowledgments(
            test_name, user, devices_json, branches_json, test_cases_json, note, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            ack.test_name,
            ack.user,
            serde_json::to_string(&ack.devices)?,
            serde_json::to_string(&ack.branches)?,
            serde_json::to_string(&ack.test_case_names)?,
            ack.note,
            crate::storage::now_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn acknowledgments_impl(
    conn: &Connection,
    test_name: &str,
) -> Result<Vec<Acknowledgment>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user, devices_json, branches_json, test_cases_json, note
         FROM acknowledgments WHERE test_name = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![test_name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, user, devices, branches, cases, note)| {
            let parse = |raw: &str| -> Result<BTreeSet<String>, StoreError> {
                serde_json::from_str(raw)
                    .map_err(|e| StoreError::corrupt(format!("acknowledgment {id}"), e))
            };
            Ok(Acknowledgment {
                id,
                test_name: test_name.to_string(),
                user,
                devices: parse(&devices)?,
                branches: parse(&branches)?,
                test_case_names: parse(&cases)?,
                note,
            })
        })
        .collect()
}

pub(crate) fn delete_acknowledgment_impl(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let n = conn.execute("DELETE FROM acknowledgments WHERE id = ?1", params![id])?;
    Ok(n > 0)
}

/// Returns false when the subscription already existed.
pub(crate) fn add_subscriber_impl(
    conn: &Connection,
    test_name: &str,
    email: &str,
) -> Result<bool, StoreError> {
    let n = conn.execute(
        "INSERT OR IGNORE INTO subscriptions(test_name, email) VALUES (?1, ?2)",
        params![test_name, email],
    )?;
    Ok(n > 0)
}

pub(crate) fn subscribers_impl(conn: &Connection, test_name: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT email FROM subscriptions WHERE test_name = ?1 ORDER BY email ASC",
    )?;
    let emails = stmt
        .query_map(params![test_name], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(emails)
}
