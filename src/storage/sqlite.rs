//! SQLite store.
//!
//! Values are stored as their text form together with the declared type and
//! re-coerced when read back. The owner column holds `''` for application
//! preferences so it can take part in the primary key.

use crate::models::{PersistedKey, Preference, PreferenceType, Scope, build_key, coerce, format};
use crate::storage::{PreferenceStore, StoreError, owner_filter};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const COLUMNS: &str = "scope, owner, pref_key, value, pref_type, description, minimum, maximum, \
                       group_name, from_file, last_modified";

/// Store backed by a single SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened preference database");
        Ok(Self {
            conn: Mutex::new(conn),
            location: path.display().to_string(),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: ":memory:".to_string(),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                scope TEXT NOT NULL,
                owner TEXT NOT NULL DEFAULT '',
                pref_key TEXT NOT NULL,
                value TEXT NOT NULL,
                pref_type TEXT NOT NULL,
                description TEXT,
                minimum REAL,
                maximum REAL,
                group_name TEXT NOT NULL DEFAULT 'GLOBAL',
                from_file INTEGER NOT NULL DEFAULT 0,
                last_modified TEXT NOT NULL,
                PRIMARY KEY (scope, owner, pref_key)
            );

            CREATE INDEX IF NOT EXISTS idx_preferences_type ON preferences(pref_type);
            CREATE INDEX IF NOT EXISTS idx_preferences_group ON preferences(scope, owner, group_name);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store(StoreError::Poisoned))
    }

    fn query(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<Preference>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM preferences {} ORDER BY scope, owner, pref_key",
            COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, StoredRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(StoredRow::into_preference).collect()
    }
}

/// Raw column values of one `preferences` row.
struct StoredRow {
    scope: String,
    owner: String,
    key: String,
    value: String,
    pref_type: String,
    description: Option<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    group: String,
    from_file: bool,
    last_modified: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            scope: row.get(0)?,
            owner: row.get(1)?,
            key: row.get(2)?,
            value: row.get(3)?,
            pref_type: row.get(4)?,
            description: row.get(5)?,
            minimum: row.get(6)?,
            maximum: row.get(7)?,
            group: row.get(8)?,
            from_file: row.get(9)?,
            last_modified: row.get(10)?,
        })
    }

    fn into_preference(self) -> Result<Preference> {
        let label = format!("{}/{}/{}", self.scope, self.owner, self.key);
        let corrupt = |reason: String| {
            Error::Store(StoreError::Corrupt {
                key: label.clone(),
                reason,
            })
        };

        let scope = Scope::parse(&self.scope)
            .ok_or_else(|| corrupt(format!("unknown scope '{}'", self.scope)))?;
        let key = build_key(scope, Some(self.owner.as_str()), &self.key)
            .map_err(|e| corrupt(e.to_string()))?;
        let pref_type = PreferenceType::parse(&self.pref_type)
            .ok_or_else(|| corrupt(format!("unknown type '{}'", self.pref_type)))?;
        let value = coerce(&self.value, pref_type, None, None).map_err(|e| corrupt(e.to_string()))?;
        let last_modified = DateTime::parse_from_rfc3339(&self.last_modified)
            .map_err(|e| corrupt(format!("bad timestamp: {}", e)))?
            .with_timezone(&Utc);

        let mut pref = Preference::new(key, value);
        pref.description = self.description;
        pref.minimum = self.minimum;
        pref.maximum = self.maximum;
        pref.group = self.group;
        pref.from_file = self.from_file;
        pref.last_modified = last_modified;
        Ok(pref)
    }
}

fn owner_column(owner: Option<&str>) -> &str {
    owner_filter(owner).unwrap_or("")
}

fn scope_column(scope: Scope) -> String {
    scope.to_string()
}

impl PreferenceStore for SqliteStore {
    fn find_all(&self) -> Result<Vec<Preference>> {
        self.query("", params![])
    }

    fn find_all_by_owner_and_scope(
        &self,
        owner: Option<&str>,
        scope: Scope,
    ) -> Result<Vec<Preference>> {
        let scope = scope_column(scope);
        let owner = owner_column(owner);
        self.query("WHERE scope = ?1 AND owner = ?2", params![scope, owner])
    }

    fn find_all_by_owner_and_scope_and_key(
        &self,
        owner: Option<&str>,
        scope: Scope,
        key: &str,
    ) -> Result<Vec<Preference>> {
        let scope = scope_column(scope);
        let owner = owner_column(owner);
        self.query(
            "WHERE scope = ?1 AND owner = ?2 AND pref_key = ?3",
            params![scope, owner, key],
        )
    }

    fn find_all_by_owner_and_scope_and_group(
        &self,
        owner: Option<&str>,
        scope: Scope,
        group: &str,
    ) -> Result<Vec<Preference>> {
        let scope = scope_column(scope);
        let owner = owner_column(owner);
        self.query(
            "WHERE scope = ?1 AND owner = ?2 AND group_name = ?3",
            params![scope, owner, group],
        )
    }

    fn find_by_full_key(&self, key: &PersistedKey) -> Result<Option<Preference>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM preferences WHERE scope = ?1 AND owner = ?2 AND pref_key = ?3",
            COLUMNS
        );
        let row = conn
            .query_row(
                &sql,
                params![
                    scope_column(key.scope()),
                    owner_column(key.owner()),
                    key.key()
                ],
                StoredRow::from_row,
            )
            .optional()?;
        row.map(StoredRow::into_preference).transpose()
    }

    fn find_by_type(&self, pref_type: PreferenceType) -> Result<Vec<Preference>> {
        let pref_type = pref_type.as_str();
        self.query("WHERE pref_type = ?1", params![pref_type])
    }

    fn save(&self, preference: Preference) -> Result<Preference> {
        let conn = self.conn()?;
        let key = preference.key();
        conn.execute(
            r#"
            INSERT INTO preferences
                (scope, owner, pref_key, value, pref_type, description, minimum, maximum,
                 group_name, from_file, last_modified)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(scope, owner, pref_key) DO UPDATE SET
                value = excluded.value,
                pref_type = excluded.pref_type,
                description = excluded.description,
                minimum = excluded.minimum,
                maximum = excluded.maximum,
                group_name = excluded.group_name,
                from_file = excluded.from_file,
                last_modified = excluded.last_modified
            "#,
            params![
                scope_column(key.scope()),
                owner_column(key.owner()),
                key.key(),
                format(&preference.value),
                preference.pref_type.as_str(),
                preference.description,
                preference.minimum,
                preference.maximum,
                preference.group,
                preference.from_file,
                preference
                    .last_modified
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(preference)
    }

    fn delete(&self, key: &PersistedKey) -> Result<()> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM preferences WHERE scope = ?1 AND owner = ?2 AND pref_key = ?3",
            params![
                scope_column(key.scope()),
                owner_column(key.owner()),
                key.key()
            ],
        )?;
        if removed == 0 {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
