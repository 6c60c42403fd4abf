//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The engine never persists anything itself; callers hand finished
//! cohort results to store methods after the run.

use crate::{config::SimConfig, error::SimResult};
use rusqlite::{params, Connection, OptionalExtension};

mod outcome;
mod trace;

pub use trace::StoredDraw;

pub struct SimStore {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id:       String,
    pub run_name:     String,
    pub seed:         u64,
    pub num_patients: u64,
    pub version:      String,
    pub config_json:  String,
    pub started_at:   String,
    pub finished_at:  Option<String>,
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_outcomes.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_draw_trace.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, config: &SimConfig, version: &str) -> SimResult<()> {
        let config_json = serde_json::to_string(config)?;
        self.conn.execute(
            "INSERT INTO run (run_id, run_name, seed, num_patients, version, config_json, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                config.run.run_name,
                config.run.seed as i64,
                config.run.num_patients as i64,
                version,
                config_json,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str) -> SimResult<()> {
        self.conn.execute(
            "UPDATE run SET finished_at = ?2 WHERE run_id = ?1",
            params![run_id, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn run(&self, run_id: &str) -> SimResult<Option<RunRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT run_id, run_name, seed, num_patients, version, config_json, started_at, finished_at
                 FROM run WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        run_id:       row.get(0)?,
                        run_name:     row.get(1)?,
                        seed:         row.get::<_, i64>(2)? as u64,
                        num_patients: row.get::<_, i64>(3)? as u64,
                        version:      row.get(4)?,
                        config_json:  row.get(5)?,
                        started_at:   row.get(6)?,
                        finished_at:  row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// The configuration a run was started with.
    pub fn run_config(&self, run_id: &str) -> SimResult<Option<SimConfig>> {
        match self.run(run_id)? {
            Some(record) => Ok(Some(serde_json::from_str(&record.config_json)?)),
            None => Ok(None),
        }
    }
}
