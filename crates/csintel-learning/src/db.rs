use rusqlite::Connection;

use crate::error::Result;

/// `understanding` is append-only: `version` is unique and there is no
/// UPDATE path.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS understanding (
            version             INTEGER PRIMARY KEY,
            created_at          TEXT NOT NULL,
            logs_analyzed_count INTEGER NOT NULL,
            logs_date_from      TEXT,
            logs_date_to        TEXT NOT NULL,
            understanding_text  TEXT NOT NULL,
            key_insights        TEXT NOT NULL,
            model_used          TEXT NOT NULL,
            prompt_tokens       INTEGER NOT NULL DEFAULT 0,
            completion_tokens   INTEGER NOT NULL DEFAULT 0
         );
         CREATE TABLE IF NOT EXISTS learning_executions (
            id                    TEXT PRIMARY KEY,
            executed_at           TEXT NOT NULL,
            trigger_type          TEXT NOT NULL,
            status                TEXT NOT NULL,
            duration_seconds      REAL,
            understanding_version INTEGER,
            error_message         TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_learning_executions_executed_at
            ON learning_executions(executed_at);",
    )?;
    Ok(())
}
