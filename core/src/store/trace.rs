use super::SimStore;
use crate::{
    error::SimResult,
    trace::TraceRecord,
    types::{Month, PatientIndex},
};
use rusqlite::params;

/// A draw read back from the trace table. The site is owned here since it
/// no longer points into the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDraw {
    pub patient:  PatientIndex,
    pub month:    Month,
    pub position: u64,
    pub site:     String,
    pub value:    f64,
}

impl SimStore {
    // ── Draw trace ─────────────────────────────────────────────

    pub fn append_trace(&self, run_id: &str, records: &[TraceRecord]) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO draw_trace (run_id, patient, month, position, site, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for r in records {
                stmt.execute(params![
                    run_id,
                    r.patient as i64,
                    r.month as i64,
                    r.position as i64,
                    r.site,
                    r.value,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn trace_for_patient(&self, run_id: &str, patient: PatientIndex) -> SimResult<Vec<StoredDraw>> {
        let mut stmt = self.conn.prepare(
            "SELECT patient, month, position, site, value FROM draw_trace
             WHERE run_id = ?1 AND patient = ?2
             ORDER BY position ASC",
        )?;
        let draws = stmt
            .query_map(params![run_id, patient as i64], |row| {
                Ok(StoredDraw {
                    patient:  row.get::<_, i64>(0)? as PatientIndex,
                    month:    row.get::<_, i64>(1)? as Month,
                    position: row.get::<_, i64>(2)? as u64,
                    site:     row.get(3)?,
                    value:    row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(draws)
    }

    pub fn trace_count(&self, run_id: &str) -> SimResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM draw_trace WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
