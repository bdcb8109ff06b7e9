use crate::errors::StoreError;
use rusqlite::Connection;

/// How a transaction body wants to end.
pub(crate) enum Finish<T> {
    Commit(T),
    Rollback(T),
}

/// Runs `body` inside `BEGIN IMMEDIATE`, taking the write lock up front so a
/// racing writer fails fast with `SQLITE_BUSY` instead of deadlocking on upgrade.
pub(crate) fn immediate_impl<T, F>(conn: &Connection, body: F) -> Result<T, StoreError>
where
    F: FnOnce(&Connection) -> Result<Finish<T>, StoreError>,
{
    conn.execute("BEGIN IMMEDIATE", [])?;
    let result = body(conn);

    match result {
        Ok(Finish::Commit(value)) => {
            if let Err(e) = conn.execute("COMMIT", []) {
                let _ = conn.execute("ROLLBACK", []);
                return Err(e.into());
            }
            Ok(value)
        }
        Ok(Finish::Rollback(value)) => {
            conn.execute("ROLLBACK", [])?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute("ROLLBACK", []);
            Err(e)
        }
    }
}
