use anyhow::Result;
use rusqlite::{params, Connection};
use serde_json::json;

use crate::dataset::Provenance;

/// Record of every dataset the rig has loaded, so an operator can ask
/// what was on screen during a past session.
pub struct HistoryStore {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct LoadRecord {
    pub ts: u64,
    pub path: String,
    pub name: String,
    pub archive: Option<String>,
    pub sha256: String,
    pub rows: usize,
    pub cols: usize,
}

impl HistoryStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS datasets (
                ts INTEGER NOT NULL,
                path TEXT NOT NULL,
                name TEXT NOT NULL,
                archive TEXT,
                sha256 TEXT NOT NULL,
                rows INTEGER NOT NULL,
                cols INTEGER NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn record(&mut self, provenance: &Provenance, cols: usize) -> Result<()> {
        self.conn.execute(
            "INSERT INTO datasets (ts, path, name, archive, sha256, rows, cols)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                provenance.loaded_at as i64,
                provenance.path,
                provenance.name,
                provenance.archive,
                provenance.sha256,
                provenance.rows as i64,
                cols as i64
            ],
        )?;
        Ok(())
    }

    pub fn recent(&self, n: usize) -> Result<Vec<LoadRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT ts, path, name, archive, sha256, rows, cols
             FROM datasets ORDER BY ts DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![n as i64], |row| {
            Ok(LoadRecord {
                ts: row.get::<_, i64>(0)? as u64,
                path: row.get(1)?,
                name: row.get(2)?,
                archive: row.get(3)?,
                sha256: row.get(4)?,
                rows: row.get::<_, i64>(5)? as usize,
                cols: row.get::<_, i64>(6)? as usize,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl LoadRecord {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "ts": self.ts,
            "path": self.path,
            "name": self.name,
            "archive": self.archive,
            "sha256": self.sha256,
            "rows": self.rows,
            "cols": self.cols,
        })
    }
}
