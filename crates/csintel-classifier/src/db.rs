use rusqlite::Connection;

use crate::error::Result;

/// `llm_annotations` is keyed one-row-per-event: inserting a row (success
/// or permanently failed) is what takes an event out of the unclassified
/// pool, so the classifier worker never reprocesses it.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS llm_annotations (
            event_id           TEXT PRIMARY KEY,
            status             TEXT NOT NULL,
            model              TEXT,
            prompt_version     TEXT NOT NULL,
            topic              TEXT,
            urgency            TEXT,
            sentiment          TEXT,
            intent             TEXT,
            summary            TEXT,
            next_action        TEXT,
            escalated          INTEGER NOT NULL DEFAULT 0,
            prompt_tokens      INTEGER NOT NULL DEFAULT 0,
            completion_tokens  INTEGER NOT NULL DEFAULT 0,
            latency_ms         INTEGER NOT NULL DEFAULT 0,
            attempt_count      INTEGER NOT NULL DEFAULT 0,
            last_error         TEXT,
            created_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_annotations_created ON llm_annotations(created_at);",
    )?;
    Ok(())
}
