use super::SimStore;
use crate::{
    error::SimResult,
    snapshot::PatientOutcome,
    stats::{CohortStats, CohortSummary},
    types::{DeathCause, PatientIndex},
};
use rusqlite::{params, OptionalExtension};

impl SimStore {
    // ── Patient outcomes ───────────────────────────────────────

    /// Insert all outcomes of a run in one transaction.
    pub fn insert_patient_outcomes(&self, run_id: &str, outcomes: &[PatientOutcome]) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO patient_outcome (
                    run_id, patient, final_month, cause_of_death,
                    infected_at_entry, infected_during_run, infection_month,
                    cost, discounted_cost, life_months, discounted_qalms,
                    first_art_month, num_ois
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            )?;
            for o in outcomes {
                stmt.execute(params![
                    run_id,
                    o.patient as i64,
                    o.final_month as i64,
                    o.cause_of_death.map(DeathCause::name),
                    o.infected_at_entry,
                    o.infected_during_run,
                    o.infection_month.map(i64::from),
                    o.cost,
                    o.discounted_cost,
                    o.life_months,
                    o.discounted_qalms,
                    o.first_art_month.map(i64::from),
                    o.num_ois as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn patient_outcomes(&self, run_id: &str) -> SimResult<Vec<PatientOutcome>> {
        let mut stmt = self.conn.prepare(
            "SELECT patient, final_month, cause_of_death,
                    infected_at_entry, infected_during_run, infection_month,
                    cost, discounted_cost, life_months, discounted_qalms,
                    first_art_month, num_ois
             FROM patient_outcome WHERE run_id = ?1
             ORDER BY patient ASC",
        )?;
        let outcomes = stmt
            .query_map(params![run_id], |row| {
                let cause: Option<String> = row.get(2)?;
                Ok(PatientOutcome {
                    patient:             row.get::<_, i64>(0)? as PatientIndex,
                    final_month:         row.get::<_, i64>(1)? as u32,
                    cause_of_death:      cause.as_deref().and_then(DeathCause::from_name),
                    infected_at_entry:   row.get(3)?,
                    infected_during_run: row.get(4)?,
                    infection_month:     row.get::<_, Option<i64>>(5)?.map(|m| m as u32),
                    cost:                row.get(6)?,
                    discounted_cost:     row.get(7)?,
                    life_months:         row.get(8)?,
                    discounted_qalms:    row.get(9)?,
                    first_art_month:     row.get::<_, Option<i64>>(10)?.map(|m| m as u32),
                    num_ois:             row.get::<_, i64>(11)? as u32,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(outcomes)
    }

    pub fn deaths_by_cause(&self, run_id: &str) -> SimResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT cause_of_death, COUNT(*) FROM patient_outcome
             WHERE run_id = ?1 AND cause_of_death IS NOT NULL
             GROUP BY cause_of_death ORDER BY cause_of_death",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Cohort aggregates ──────────────────────────────────────

    pub fn save_run_summary(&self, run_id: &str, summary: &CohortSummary) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO run_summary (
                run_id, num_patients, total_discounted_cost,
                total_life_months, total_discounted_qalms, summary_json
            ) VALUES (?1,?2,?3,?4,?5,?6)
            ON CONFLICT(run_id) DO UPDATE SET
                num_patients = excluded.num_patients,
                total_discounted_cost = excluded.total_discounted_cost,
                total_life_months = excluded.total_life_months,
                total_discounted_qalms = excluded.total_discounted_qalms,
                summary_json = excluded.summary_json",
            params![
                run_id,
                summary.num_patients as i64,
                summary.total_discounted_cost,
                summary.total_life_months,
                summary.total_discounted_qalms,
                serde_json::to_string(summary)?,
            ],
        )?;
        Ok(())
    }

    pub fn run_summary(&self, run_id: &str) -> SimResult<Option<CohortSummary>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT summary_json FROM run_summary WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    pub fn save_monthly_census(&self, run_id: &str, stats: &CohortStats) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO monthly_census (run_id, month, alive, hiv_positive, on_art)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (month, &alive) in stats.alive_by_month.iter().enumerate() {
                let positive = stats.hiv_positive_by_month.get(month).copied().unwrap_or(0);
                let on_art = stats.on_art_by_month.get(month).copied().unwrap_or(0);
                stmt.execute(params![run_id, month as i64, alive as i64, positive as i64, on_art as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// (month, alive, hiv_positive, on_art) rows in month order.
    pub fn monthly_census(&self, run_id: &str) -> SimResult<Vec<(u32, u64, u64, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT month, alive, hiv_positive, on_art FROM monthly_census
             WHERE run_id = ?1 ORDER BY month ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u32,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, i64>(2)? as u64,
                    row.get::<_, i64>(3)? as u64,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
