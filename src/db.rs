use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::record::{ChangeSet, FieldValue, Record};
use crate::resolver::RunSummary;
use crate::store::{RecordStore, StoreError};

/// SQLite-backed record store. Field maps are JSON-encoded in a single
/// column; enumeration order is insertion (rowid) order.
pub struct SqliteStore {
    conn: Connection,
}

pub fn default_path() -> PathBuf {
    if let Ok(p) = env::var("DEDUPE_DB_PATH") {
        return PathBuf::from(p);
    }
    PathBuf::from("data/companies.sqlite")
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        Ok(SqliteStore { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(SqliteStore {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                fields TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS merge_runs (
                run_id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                total_records INTEGER NOT NULL,
                flagged INTEGER NOT NULL,
                groups_formed INTEGER NOT NULL,
                merged INTEGER NOT NULL,
                skipped_no_links INTEGER NOT NULL,
                update_failures INTEGER NOT NULL,
                deleted INTEGER NOT NULL,
                delete_failures INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn insert_record(&self, record: &Record) -> Result<()> {
        let fields = serde_json::to_string(&record.fields)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO records (id, fields) VALUES (?1, ?2)",
            params![record.id, fields],
        )?;
        Ok(())
    }

    pub fn import_records(&mut self, records: &[Record]) -> Result<usize> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        for record in records {
            self.insert_record(record)?;
        }
        self.conn.execute("COMMIT", [])?;
        Ok(records.len())
    }

    /// Load records from a JSON file holding an array of
    /// `{id, fields}` objects.
    pub fn import_file(&mut self, path: &Path) -> Result<usize> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let records: Vec<Record> =
            serde_json::from_str(&raw).with_context(|| format!("Invalid records in {:?}", path))?;
        self.import_records(&records)
    }

    pub fn persist_run(
        &self,
        run_id: &str,
        started_at: DateTime<Utc>,
        summary: &RunSummary,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO merge_runs (run_id, started_at, total_records, flagged,
                 groups_formed, merged, skipped_no_links, update_failures, deleted, delete_failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                started_at.to_rfc3339(),
                summary.total_records as i64,
                summary.flagged as i64,
                summary.groups as i64,
                summary.merged as i64,
                summary.skipped_no_links as i64,
                summary.update_failures as i64,
                summary.deleted as i64,
                summary.delete_failures as i64,
            ],
        )?;
        Ok(())
    }

    #[cfg(test)]
    fn run_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM merge_runs", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn parse_fields(id: &str, raw: &str) -> Result<BTreeMap<String, FieldValue>, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::FieldData {
        id: id.to_string(),
        source,
    })
}

impl RecordStore for SqliteStore {
    fn fetch_all(&self) -> Result<Vec<Record>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fields FROM records ORDER BY rowid")?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let raw: String = row.get(1)?;
            let fields = parse_fields(&id, &raw)?;
            records.push(Record { id, fields });
        }
        Ok(records)
    }

    fn update(&mut self, id: &str, changes: &ChangeSet) -> Result<(), StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT fields FROM records WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut fields = parse_fields(id, &raw)?;
        for (name, value) in changes {
            fields.insert(name.clone(), value.clone());
        }
        let encoded = serde_json::to_string(&fields).map_err(|source| StoreError::FieldData {
            id: id.to_string(),
            source,
        })?;
        self.conn.execute(
            "UPDATE records SET fields = ?1 WHERE id = ?2",
            params![encoded, id],
        )?;
        Ok(())
    }

    fn delete_many(&mut self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        if ids.len() > self.batch_limit() {
            return Err(StoreError::BatchTooLarge {
                got: ids.len(),
                limit: self.batch_limit(),
            });
        }
        let placeholders = (1..=ids.len()).map(|i| format!("?{i}")).join(", ");
        let sql = format!("DELETE FROM records WHERE id IN ({placeholders})");
        let bound: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
        self.conn.execute(&sql, bound.as_slice())?;
        Ok(())
    }
}
