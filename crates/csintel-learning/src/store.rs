use std::sync::Mutex;

use chrono::{DateTime, Utc};
use csintel_core::types::{LearningStatus, TriggerType};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{LearningError, Result};
use crate::types::{LearningExecution, Understanding};

/// Owns both `understanding` and `learning_executions`. Allocating the next
/// version happens on this same `Mutex<Connection>`, so holding the lock for
/// the duration of `close_success` serializes version allocation with commit.
pub struct LearningStore {
    db: Mutex<Connection>,
}

impl LearningStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// The window end of the most recent successful run, or `None` if no run
    /// has ever succeeded.
    pub fn last_successful_logs_date_to(&self) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().unwrap();
        let raw: Option<String> = db
            .query_row(
                "SELECT logs_date_to FROM understanding ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|s| parse_dt(&s)))
    }

    pub fn latest_understanding(&self) -> Result<Option<Understanding>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT version, created_at, logs_analyzed_count, logs_date_from, logs_date_to,
                    understanding_text, key_insights, model_used, prompt_tokens, completion_tokens
             FROM understanding ORDER BY version DESC LIMIT 1",
            [],
            row_to_understanding,
        )
        .optional()
        .map_err(LearningError::Database)
    }

    pub fn get_understanding(&self, version: u32) -> Result<Understanding> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT version, created_at, logs_analyzed_count, logs_date_from, logs_date_to,
                    understanding_text, key_insights, model_used, prompt_tokens, completion_tokens
             FROM understanding WHERE version = ?1",
            rusqlite::params![version],
            row_to_understanding,
        )
        .optional()?
        .ok_or(LearningError::UnderstandingNotFound { version })
    }

    /// All versions, newest first — the "previous versions" list is a pure
    /// query.
    pub fn history(&self, limit: usize) -> Result<Vec<Understanding>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT version, created_at, logs_analyzed_count, logs_date_from, logs_date_to,
                    understanding_text, key_insights, model_used, prompt_tokens, completion_tokens
             FROM understanding ORDER BY version DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_understanding)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    #[instrument(skip(self))]
    pub fn open_execution(&self, trigger_type: TriggerType) -> Result<LearningExecution> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO learning_executions
             (id, executed_at, trigger_type, status, duration_seconds, understanding_version, error_message)
             VALUES (?1,?2,?3,'running',NULL,NULL,NULL)",
            rusqlite::params![id, now.to_rfc3339(), trigger_type.to_string()],
        )?;
        Ok(LearningExecution {
            id,
            executed_at: now,
            trigger_type,
            status: LearningStatus::Running,
            duration_seconds: None,
            understanding_version: None,
            error_message: None,
        })
    }

    /// Allocates `version = max(version)+1`, inserts the new `Understanding`,
    /// and closes the execution as `success` — all under the same lock
    /// acquisition, so a concurrent caller can never observe a torn state.
    #[allow(clippy::too_many_arguments)]
    pub fn close_success(
        &self,
        execution_id: &str,
        logs_analyzed_count: u32,
        logs_date_from: Option<DateTime<Utc>>,
        logs_date_to: DateTime<Utc>,
        understanding_text: &str,
        key_insights: &[String],
        model_used: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
        duration_seconds: f64,
    ) -> Result<Understanding> {
        let db = self.db.lock().unwrap();
        let next_version: u32 = db
            .query_row("SELECT COALESCE(MAX(version), 0) + 1 FROM understanding", [], |row| row.get(0))?;
        let created_at = Utc::now();
        let insights_json = serde_json::to_string(key_insights).unwrap_or_else(|_| "[]".to_string());

        db.execute(
            "INSERT INTO understanding
             (version, created_at, logs_analyzed_count, logs_date_from, logs_date_to,
              understanding_text, key_insights, model_used, prompt_tokens, completion_tokens)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            rusqlite::params![
                next_version,
                created_at.to_rfc3339(),
                logs_analyzed_count,
                logs_date_from.map(|d| d.to_rfc3339()),
                logs_date_to.to_rfc3339(),
                understanding_text,
                insights_json,
                model_used,
                prompt_tokens,
                completion_tokens,
            ],
        )?;
        db.execute(
            "UPDATE learning_executions
             SET status = 'success', duration_seconds = ?1, understanding_version = ?2
             WHERE id = ?3",
            rusqlite::params![duration_seconds, next_version, execution_id],
        )?;

        Ok(Understanding {
            version: next_version,
            created_at,
            logs_analyzed_count,
            logs_date_from,
            logs_date_to,
            understanding_text: understanding_text.to_string(),
            key_insights: key_insights.to_vec(),
            model_used: model_used.to_string(),
            prompt_tokens,
            completion_tokens,
        })
    }

    /// Records a failure without allocating a version.
    pub fn close_failed(&self, execution_id: &str, status: LearningStatus, error_message: &str, duration_seconds: f64) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE learning_executions
             SET status = ?1, duration_seconds = ?2, error_message = ?3
             WHERE id = ?4",
            rusqlite::params![status.to_string(), duration_seconds, error_message, execution_id],
        )?;
        Ok(())
    }

    pub fn list_executions(&self, limit: usize) -> Result<Vec<LearningExecution>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, executed_at, trigger_type, status, duration_seconds,
                    understanding_version, error_message
             FROM learning_executions ORDER BY executed_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_execution)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_understanding(row: &Row<'_>) -> rusqlite::Result<Understanding> {
    let created_at: String = row.get(1)?;
    let logs_date_from: Option<String> = row.get(3)?;
    let logs_date_to: String = row.get(4)?;
    let insights_raw: String = row.get(6)?;
    Ok(Understanding {
        version: row.get(0)?,
        created_at: parse_dt(&created_at),
        logs_analyzed_count: row.get(2)?,
        logs_date_from: logs_date_from.map(|s| parse_dt(&s)),
        logs_date_to: parse_dt(&logs_date_to),
        understanding_text: row.get(5)?,
        key_insights: serde_json::from_str(&insights_raw).unwrap_or_default(),
        model_used: row.get(7)?,
        prompt_tokens: row.get(8)?,
        completion_tokens: row.get(9)?,
    })
}

fn row_to_execution(row: &Row<'_>) -> rusqlite::Result<LearningExecution> {
    let executed_at: String = row.get(1)?;
    let trigger: String = row.get(2)?;
    let status: String = row.get(3)?;
    Ok(LearningExecution {
        id: row.get(0)?,
        executed_at: parse_dt(&executed_at),
        trigger_type: trigger.parse().unwrap_or(TriggerType::Scheduled),
        status: status.parse().unwrap_or(LearningStatus::Failed),
        duration_seconds: row.get(4)?,
        understanding_version: row.get(5)?,
        error_message: row.get(6)?,
    })
}

fn parse_dt(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LearningStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        LearningStore::new(conn)
    }

    #[test]
    fn first_success_allocates_version_one() {
        let s = store();
        let exec = s.open_execution(TriggerType::Manual).unwrap();
        let now = Utc::now();
        let u = s
            .close_success(&exec.id, 10, None, now, "text", &["insight".to_string()], "model-x", 100, 50, 1.5)
            .unwrap();
        assert_eq!(u.version, 1);
        assert_eq!(s.latest_understanding().unwrap().unwrap().version, 1);
    }

    #[test]
    fn versions_increase_monotonically_with_no_gaps() {
        let s = store();
        for i in 0..3 {
            let exec = s.open_execution(TriggerType::Scheduled).unwrap();
            let u = s
                .close_success(&exec.id, 5, None, Utc::now(), &format!("text-{i}"), &[], "model-x", 1, 1, 0.1)
                .unwrap();
            assert_eq!(u.version, i + 1);
        }
        let history = s.history(10).unwrap();
        assert_eq!(history.iter().map(|u| u.version).collect::<Vec<_>>(), vec![3, 2, 1]);
    }

    #[test]
    fn failed_run_does_not_allocate_a_version() {
        let s = store();
        let exec = s.open_execution(TriggerType::Manual).unwrap();
        s.close_failed(&exec.id, LearningStatus::Failed, "provider unavailable", 0.2).unwrap();
        assert!(s.latest_understanding().unwrap().is_none());

        let execs = s.list_executions(10).unwrap();
        assert_eq!(execs[0].status, LearningStatus::Failed);
        assert_eq!(execs[0].understanding_version, None);
    }
}
