use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 1;

/// Prepare a writable connection: pragmas, tables, schema version.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    apply_connection_pragmas(conn)?;

    // `value` has no declared type so booleans stay integers and text stays text.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS groups (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            name      TEXT NOT NULL UNIQUE,
            docstring TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS slots (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            name     TEXT NOT NULL,
            payload  BLOB NOT NULL,
            UNIQUE (group_id, name)
        );

        CREATE TABLE IF NOT EXISTS attributes (
            slot_id INTEGER NOT NULL REFERENCES slots(id) ON DELETE CASCADE,
            key     TEXT NOT NULL,
            value,
            PRIMARY KEY (slot_id, key)
        );

        CREATE INDEX IF NOT EXISTS idx_slots_group ON slots(group_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Per-connection settings, applied to read-only connections too.
pub fn apply_connection_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(())
}

/// Check that a connection opened read-only points at a container.
pub fn verify(conn: &Connection) -> Result<()> {
    match get_schema_version(conn)? {
        Some(v) if v <= SCHEMA_VERSION => Ok(()),
        Some(v) => Err(StoreError::InvalidData(format!(
            "container schema version {v} is newer than supported version {SCHEMA_VERSION}"
        ))),
        None => Err(StoreError::InvalidData(
            "file is not a capsula container".to_string(),
        )),
    }
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let has_metadata: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'metadata')",
        [],
        |row| row.get(0),
    )?;
    if !has_metadata {
        return Ok(None);
    }
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|v| {
        v.parse::<i64>()
            .map_err(|e| StoreError::InvalidData(format!("unreadable schema version `{v}`: {e}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &["metadata", "groups", "slots", "attributes"] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        verify(&conn).unwrap();
    }

    #[test]
    fn test_idempotent_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_foreign_keys_and_busy_timeout() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000, "busy_timeout should be 5000ms");
    }

    #[test]
    fn test_verify_rejects_foreign_database() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (body TEXT);").unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), None);
        assert!(matches!(verify(&conn), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_corrupt_schema_version_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = 'garbage' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();
        assert!(matches!(
            get_schema_version(&conn),
            Err(StoreError::InvalidData(_))
        ));
        assert!(verify(&conn).is_err());
    }

    #[test]
    fn test_missing_version_row() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute("DELETE FROM metadata WHERE key = 'schema_version'", [])
            .unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), None);
    }

    #[test]
    fn test_verify_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = ?1 WHERE key = 'schema_version'",
            [(SCHEMA_VERSION + 1).to_string()],
        )
        .unwrap();
        assert!(verify(&conn).is_err());
    }
}
