//! Hierarchical container: file → group → slot → attributes.
//!
//! A container is a single SQLite file. Groups are named namespaces, slots
//! hold one binary payload each and carry string or boolean attributes.
//! Handles borrow the container, so nothing outlives the open connection.

use std::path::Path;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, OptionalExtension, ToSql, params};

use crate::error::{Result, StoreError};
use crate::schema;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing containers only; every write fails.
    ReadOnly,
    /// Creates the file when it does not exist.
    ReadWrite,
}

/// Attribute values are text or boolean.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    Text(String),
    Bool(bool),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Text(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl ToSql for AttrValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            AttrValue::Text(s) => ToSqlOutput::from(s.as_str()),
            AttrValue::Bool(b) => ToSqlOutput::from(*b),
        })
    }
}

impl FromSql for AttrValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => Ok(AttrValue::Bool(i != 0)),
            ValueRef::Text(_) => value.as_str().map(|s| AttrValue::Text(s.to_string())),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// An open container file. The connection closes when this is dropped.
pub struct Container {
    conn: Connection,
    mode: OpenMode,
}

impl Container {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let conn = match mode {
            OpenMode::ReadOnly => {
                if !path.exists() {
                    return Err(StoreError::ContainerNotFound(path.to_path_buf()));
                }
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?;
                schema::apply_connection_pragmas(&conn)?;
                schema::verify(&conn)?;
                conn
            }
            OpenMode::ReadWrite => {
                let conn = Connection::open(path)?;
                schema::initialize(&conn)?;
                conn
            }
        };
        tracing::debug!(path = %path.display(), ?mode, "opened container");
        Ok(Self { conn, mode })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            mode: OpenMode::ReadWrite,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    // --- Groups ---

    pub fn group(&self, name: &str) -> Result<Option<Group<'_>>> {
        let id = self
            .conn
            .query_row("SELECT id FROM groups WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id.map(|id| Group {
            container: self,
            id,
            name: name.to_string(),
        }))
    }

    /// Open `name`, creating it when absent.
    pub fn require_group(&self, name: &str) -> Result<Group<'_>> {
        self.conn.execute(
            "INSERT OR IGNORE INTO groups (name) VALUES (?1)",
            [name],
        )?;
        self.group(name)?
            .ok_or_else(|| StoreError::InvalidData(format!("group `{name}` vanished after create")))
    }

    /// Remove a group and everything in it. Returns false if it did not exist.
    pub fn delete_group(&self, name: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM groups WHERE name = ?1", [name])?;
        Ok(rows > 0)
    }

    /// Group names in creation order.
    pub fn group_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM groups ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(names)
    }
}

/// A named namespace of slots.
pub struct Group<'c> {
    container: &'c Container,
    id: i64,
    name: String,
}

impl<'c> Group<'c> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn docstring(&self) -> Result<String> {
        let doc = self.container.conn.query_row(
            "SELECT docstring FROM groups WHERE id = ?1",
            [self.id],
            |row| row.get(0),
        )?;
        Ok(doc)
    }

    pub fn set_docstring(&self, docstring: &str) -> Result<()> {
        self.container.conn.execute(
            "UPDATE groups SET docstring = ?1 WHERE id = ?2",
            params![docstring, self.id],
        )?;
        Ok(())
    }

    /// Write `payload` under `name`, replacing any slot of that name along
    /// with its attributes.
    pub fn set_slot(&self, name: &str, payload: &[u8]) -> Result<Slot<'c>> {
        let replaced = self.delete_slot(name)?;
        if replaced {
            tracing::debug!(group = %self.name, slot = name, "replacing slot");
        }
        self.container.conn.execute(
            "INSERT INTO slots (group_id, name, payload) VALUES (?1, ?2, ?3)",
            params![self.id, name, payload],
        )?;
        Ok(Slot {
            container: self.container,
            id: self.container.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn slot(&self, name: &str) -> Result<Option<Slot<'c>>> {
        let id = self
            .container
            .conn
            .query_row(
                "SELECT id FROM slots WHERE group_id = ?1 AND name = ?2",
                params![self.id, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|id| Slot {
            container: self.container,
            id,
            name: name.to_string(),
        }))
    }

    pub fn delete_slot(&self, name: &str) -> Result<bool> {
        let rows = self.container.conn.execute(
            "DELETE FROM slots WHERE group_id = ?1 AND name = ?2",
            params![self.id, name],
        )?;
        Ok(rows > 0)
    }

    /// Slot names in insertion order.
    pub fn slot_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .container
            .conn
            .prepare("SELECT name FROM slots WHERE group_id = ?1 ORDER BY id")?;
        let names = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(names)
    }
}

/// One payload plus its attributes.
pub struct Slot<'c> {
    container: &'c Container,
    id: i64,
    name: String,
}

impl Slot<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Result<Vec<u8>> {
        let payload = self.container.conn.query_row(
            "SELECT payload FROM slots WHERE id = ?1",
            [self.id],
            |row| row.get(0),
        )?;
        Ok(payload)
    }

    pub fn set_attribute(&self, key: &str, value: impl Into<AttrValue>) -> Result<()> {
        let value: AttrValue = value.into();
        self.container.conn.execute(
            "INSERT OR REPLACE INTO attributes (slot_id, key, value) VALUES (?1, ?2, ?3)",
            params![self.id, key, value],
        )?;
        Ok(())
    }

    pub fn attribute(&self, key: &str) -> Result<Option<AttrValue>> {
        let value = self
            .container
            .conn
            .query_row(
                "SELECT value FROM attributes WHERE slot_id = ?1 AND key = ?2",
                params![self.id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Text attribute that must be present.
    pub fn text_attribute(&self, key: &str) -> Result<String> {
        match self.attribute(key)? {
            Some(AttrValue::Text(s)) => Ok(s),
            Some(AttrValue::Bool(_)) => Err(StoreError::InvalidData(format!(
                "attribute `{key}` of slot `{}` is not text",
                self.name
            ))),
            None => Err(StoreError::InvalidData(format!(
                "slot `{}` has no attribute `{key}`",
                self.name
            ))),
        }
    }

    /// True when the boolean attribute `key` is present and set.
    pub fn flag(&self, key: &str) -> Result<bool> {
        Ok(self.attribute(key)?.and_then(|v| v.as_bool()) == Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_create_and_lookup() {
        let container = Container::open_in_memory().unwrap();
        assert!(container.group("data").unwrap().is_none());

        let group = container.require_group("data").unwrap();
        assert_eq!(group.name(), "data");
        assert!(container.group("data").unwrap().is_some());

        // require_group on an existing group reuses it
        container.require_group("data").unwrap();
        assert_eq!(container.group_names().unwrap(), vec!["data"]);
    }

    #[test]
    fn test_slot_payload_and_attributes() {
        let container = Container::open_in_memory().unwrap();
        let group = container.require_group("saved_functions").unwrap();
        let slot = group.set_slot("plot", b"fn plot(c) {}").unwrap();
        slot.set_attribute("function_name", "plot").unwrap();
        slot.set_attribute("capsule", true).unwrap();

        let slot = group.slot("plot").unwrap().unwrap();
        assert_eq!(slot.payload().unwrap(), b"fn plot(c) {}");
        assert_eq!(
            slot.attribute("function_name").unwrap(),
            Some(AttrValue::Text("plot".to_string()))
        );
        assert_eq!(slot.attribute("capsule").unwrap(), Some(AttrValue::Bool(true)));
        assert!(slot.flag("capsule").unwrap());
        assert!(!slot.flag("data").unwrap());
        assert!(slot.attribute("missing").unwrap().is_none());
        assert!(slot.text_attribute("capsule").is_err());
    }

    #[test]
    fn test_set_slot_replaces_with_fresh_attributes() {
        let container = Container::open_in_memory().unwrap();
        let group = container.require_group("g").unwrap();

        let first = group.set_slot("s", b"one").unwrap();
        first.set_attribute("stale", "yes").unwrap();

        let second = group.set_slot("s", b"two").unwrap();
        assert_eq!(second.payload().unwrap(), b"two");
        assert!(second.attribute("stale").unwrap().is_none());
        assert_eq!(group.slot_names().unwrap(), vec!["s"]);
    }

    #[test]
    fn test_slot_names_in_insertion_order() {
        let container = Container::open_in_memory().unwrap();
        let group = container.require_group("g").unwrap();
        for name in ["zeta", "alpha", "mid"] {
            group.set_slot(name, b"").unwrap();
        }
        assert_eq!(group.slot_names().unwrap(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_delete_group_cascades() {
        let container = Container::open_in_memory().unwrap();
        let group = container.require_group("g").unwrap();
        group.set_slot("s", b"x").unwrap().set_attribute("k", "v").unwrap();

        assert!(container.delete_group("g").unwrap());
        assert!(!container.delete_group("g").unwrap());

        let slots: i64 = container
            .conn()
            .query_row("SELECT count(*) FROM slots", [], |row| row.get(0))
            .unwrap();
        let attrs: i64 = container
            .conn()
            .query_row("SELECT count(*) FROM attributes", [], |row| row.get(0))
            .unwrap();
        assert_eq!((slots, attrs), (0, 0));
    }

    #[test]
    fn test_group_docstring() {
        let container = Container::open_in_memory().unwrap();
        let group = container.require_group("simulations/ExampleData").unwrap();
        assert_eq!(group.docstring().unwrap(), "");
        group.set_docstring("example data").unwrap();
        assert_eq!(group.docstring().unwrap(), "example data");
    }

    #[test]
    fn test_read_only_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        assert!(matches!(
            Container::open(&path, OpenMode::ReadOnly),
            Err(StoreError::ContainerNotFound(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.db");
        Container::open(&path, OpenMode::ReadWrite)
            .unwrap()
            .require_group("g")
            .unwrap();

        let container = Container::open(&path, OpenMode::ReadOnly).unwrap();
        assert_eq!(container.mode(), OpenMode::ReadOnly);
        assert!(container.group("g").unwrap().is_some());
        assert!(container.require_group("h").is_err());
    }
}
