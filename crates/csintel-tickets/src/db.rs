use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `tickets` and `notifications` tables.
///
/// The partial unique index on `tickets(clinic_key) WHERE status != 'done'`
/// is the schema-level enforcement of "at most one non-done ticket per
/// clinic_key"; the partial unique
/// index on `notifications(ticket_id) WHERE type = 'sla_breach'` enforces
/// breach idempotence (testable property #3).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tickets (
            id                 TEXT PRIMARY KEY,
            clinic_key         TEXT NOT NULL,
            status             TEXT NOT NULL,
            priority           TEXT NOT NULL,
            topic_primary      TEXT,
            summary_latest     TEXT,
            next_action        TEXT,
            needs_reply        INTEGER NOT NULL DEFAULT 0,
            first_inbound_at   TEXT,
            last_inbound_at    TEXT,
            last_outbound_at   TEXT,
            first_response_sec INTEGER,
            sla_breached       INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_one_open_per_clinic
            ON tickets(clinic_key) WHERE status != 'done';
        CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
        CREATE INDEX IF NOT EXISTS idx_tickets_clinic_key ON tickets(clinic_key);

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            type        TEXT NOT NULL,
            title       TEXT NOT NULL,
            message     TEXT NOT NULL,
            link        TEXT,
            ticket_id   TEXT,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_one_breach_per_ticket
            ON notifications(ticket_id) WHERE type = 'sla_breach';
        CREATE INDEX IF NOT EXISTS idx_notifications_created ON notifications(created_at);",
    )?;
    Ok(())
}
