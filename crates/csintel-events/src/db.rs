use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `events` table and its dedup index.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id                 TEXT PRIMARY KEY,
            device_id          TEXT NOT NULL,
            chat_room          TEXT NOT NULL,
            sender_name        TEXT NOT NULL,
            sender_class       TEXT NOT NULL,
            staff_member       TEXT,
            text_raw           TEXT NOT NULL,
            text_hash          TEXT NOT NULL,
            bucket_ts          TEXT NOT NULL,
            received_at        TEXT NOT NULL,
            server_received_at TEXT NOT NULL,
            notification_id    TEXT,
            ticket_id          TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_events_dedup
            ON events(text_hash, bucket_ts);
        CREATE INDEX IF NOT EXISTS idx_events_room_received
            ON events(chat_room, received_at);
        CREATE INDEX IF NOT EXISTS idx_events_server_received
            ON events(server_received_at);",
    )?;
    Ok(())
}
