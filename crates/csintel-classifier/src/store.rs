use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::instrument;

use crate::error::Result;
use crate::provider::ClassifyResponse;
use crate::types::{AnnotationStatus, LlmAnnotation};

/// Owns the `llm_annotations` table. Connects to the same SQLite file as
/// `csintel-events`'s `EventStore`, each through its own
/// `Mutex<Connection>`.
pub struct AnnotationStore {
    db: Mutex<Connection>,
}

impl AnnotationStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Event ids with no `llm_annotations` row yet, oldest `server_received_at`
    /// first, capped at `limit`.
    #[instrument(skip(self))]
    pub fn list_unclassified_event_ids(&self, limit: usize) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT e.id FROM events e
             LEFT JOIN llm_annotations a ON a.event_id = e.id
             WHERE a.event_id IS NULL
             ORDER BY e.server_received_at ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], |row: &Row<'_>| row.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn insert_success(
        &self,
        event_id: &str,
        prompt_version: &str,
        resp: &ClassifyResponse,
        escalated: bool,
        attempt_count: u32,
    ) -> Result<LlmAnnotation> {
        let now = Utc::now();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO llm_annotations
             (event_id, status, model, prompt_version, topic, urgency, sentiment, intent,
              summary, next_action, escalated, prompt_tokens, completion_tokens, latency_ms,
              attempt_count, last_error, created_at)
             VALUES (?1,'success',?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,NULL,?15)",
            rusqlite::params![
                event_id,
                resp.model,
                prompt_version,
                resp.result.topic,
                resp.result.urgency.map(|u| u.to_string()),
                resp.result.sentiment,
                resp.result.intent,
                resp.result.summary,
                resp.result.next_action,
                escalated,
                resp.prompt_tokens,
                resp.completion_tokens,
                resp.latency_ms as i64,
                attempt_count,
                now.to_rfc3339(),
            ],
        )?;
        get_locked(&db, event_id)?.ok_or_else(|| {
            crate::error::ClassifierError::Database(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    pub fn insert_permanently_failed(
        &self,
        event_id: &str,
        prompt_version: &str,
        attempt_count: u32,
        last_error: &str,
    ) -> Result<LlmAnnotation> {
        let now = Utc::now();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO llm_annotations
             (event_id, status, prompt_version, escalated, attempt_count, last_error, created_at)
             VALUES (?1,'permanently_failed',?2,0,?3,?4,?5)",
            rusqlite::params![event_id, prompt_version, attempt_count, last_error, now.to_rfc3339()],
        )?;
        get_locked(&db, event_id)?.ok_or_else(|| {
            crate::error::ClassifierError::Database(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    pub fn get(&self, event_id: &str) -> Result<Option<LlmAnnotation>> {
        let db = self.db.lock().unwrap();
        get_locked(&db, event_id)
    }
}

fn get_locked(db: &Connection, event_id: &str) -> Result<Option<LlmAnnotation>> {
    db.query_row(
        "SELECT event_id, status, model, prompt_version, topic, urgency, sentiment, intent,
                summary, next_action, escalated, prompt_tokens, completion_tokens, latency_ms,
                attempt_count, last_error, created_at
         FROM llm_annotations WHERE event_id = ?1",
        rusqlite::params![event_id],
        row_to_annotation,
    )
    .optional()
    .map_err(crate::error::ClassifierError::Database)
}

fn row_to_annotation(row: &Row<'_>) -> rusqlite::Result<LlmAnnotation> {
    let status: String = row.get(1)?;
    let urgency: Option<String> = row.get(5)?;
    let created_at: String = row.get(16)?;
    Ok(LlmAnnotation {
        event_id: row.get(0)?,
        status: AnnotationStatus::from_str(&status).unwrap_or(AnnotationStatus::PermanentlyFailed),
        model: row.get(2)?,
        prompt_version: row.get(3)?,
        topic: row.get(4)?,
        urgency: urgency.and_then(|u| u.parse().ok()),
        sentiment: row.get(6)?,
        intent: row.get(7)?,
        summary: row.get(8)?,
        next_action: row.get(9)?,
        escalated: row.get(10)?,
        prompt_tokens: row.get(11)?,
        completion_tokens: row.get(12)?,
        latency_ms: row.get::<_, i64>(13)? as u64,
        attempt_count: row.get(14)?,
        last_error: row.get(15)?,
        created_at: parse_dt(created_at),
    })
}

fn parse_dt(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
