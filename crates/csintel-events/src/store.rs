use std::sync::Mutex;

use chrono::{DateTime, Utc};
use csintel_core::types::SenderClass;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::dedup::{bucket_ts, text_hash};
use crate::error::{EventError, Result};
use crate::sender::classify_sender;
use crate::types::{InsertOutcome, MessageEvent, NewMessageEvent, MAX_CHAT_ROOM_BYTES, MAX_TEXT_RAW_BYTES};

/// Thread-safe store for persisted chat events, backed by a single SQLite
/// connection guarded by a `Mutex`.
pub struct EventStore {
    db: Mutex<Connection>,
}

impl EventStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Validate, dedup, and persist one event.
    ///
    /// Insertion uses `INSERT OR IGNORE` against the unique `(text_hash,
    /// bucket_ts)` index, then reads back the row — this makes a duplicate
    /// delivery a no-op that still returns the original `event_id`, the same
    /// race-safe idiom as `SessionManager::get_or_create`.
    #[instrument(skip(self, new), fields(chat_room = %new.chat_room))]
    pub fn insert(&self, new: NewMessageEvent, dedup_window_secs: u32) -> Result<InsertOutcome> {
        validate(&new)?;

        let sender_class = classify_sender(&new.sender_name);
        let hash = text_hash(&new.chat_room, &new.sender_name, &new.text_raw);
        let bucket = bucket_ts(new.received_at, dedup_window_secs);
        let server_received_at = Utc::now();
        let id = Uuid::new_v4().to_string();

        let (staff_member_col, class_col) = match &sender_class {
            SenderClass::Staff { staff_member } => (Some(staff_member.clone()), "staff"),
            SenderClass::Customer => (None, "customer"),
        };

        let db = self.db.lock().unwrap();
        let inserted = db.execute(
            "INSERT OR IGNORE INTO events
             (id, device_id, chat_room, sender_name, sender_class, staff_member,
              text_raw, text_hash, bucket_ts, received_at, server_received_at,
              notification_id, ticket_id)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,NULL)",
            rusqlite::params![
                id,
                new.device_id,
                new.chat_room,
                new.sender_name,
                class_col,
                staff_member_col,
                new.text_raw,
                hash,
                bucket.to_rfc3339(),
                new.received_at.to_rfc3339(),
                server_received_at.to_rfc3339(),
                new.notification_id,
            ],
        )?;
        let deduped = inserted == 0;
        if deduped {
            debug!(text_hash = %hash, "duplicate delivery, returning existing event");
        }

        let event = db
            .query_row(
                "SELECT id, device_id, chat_room, sender_name, sender_class, staff_member,
                        text_raw, text_hash, bucket_ts, received_at, server_received_at,
                        notification_id, ticket_id
                 FROM events WHERE text_hash = ?1 AND bucket_ts = ?2",
                rusqlite::params![hash, bucket.to_rfc3339()],
                row_to_event,
            )?;

        Ok(InsertOutcome { event, deduped })
    }

    /// Bind a persisted event to its ticket. Called by `csintel-tickets` after the state
    /// transition commits.
    pub fn bind_ticket(&self, event_id: &str, ticket_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE events SET ticket_id = ?1 WHERE id = ?2",
            rusqlite::params![ticket_id, event_id],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<MessageEvent>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, device_id, chat_room, sender_name, sender_class, staff_member,
                    text_raw, text_hash, bucket_ts, received_at, server_received_at,
                    notification_id, ticket_id
             FROM events WHERE id = ?1",
            rusqlite::params![id],
            row_to_event,
        )
        .optional()
        .map_err(EventError::Database)
    }

    /// All events bound to `ticket_id`, oldest first — used to build the
    /// classifier's "last N messages of the same ticket" context window
    /// and the dashboard's `GET /v1/tickets/{id}/events`.
    pub fn list_for_ticket(&self, ticket_id: &str, limit: usize) -> Result<Vec<MessageEvent>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, device_id, chat_room, sender_name, sender_class, staff_member,
                    text_raw, text_hash, bucket_ts, received_at, server_received_at,
                    notification_id, ticket_id
             FROM events WHERE ticket_id = ?1
             ORDER BY received_at DESC, server_received_at DESC
             LIMIT ?2",
        )?;
        let mut rows: Vec<MessageEvent> = stmt
            .query_map(rusqlite::params![ticket_id, limit as i64], row_to_event)?
            .filter_map(|r| r.ok())
            .collect();
        rows.reverse();
        Ok(rows)
    }

    /// Events with `server_received_at` strictly after `since`, oldest
    /// first, capped at `max_count` — feeds the self-learning job's corpus
    /// window.
    pub fn list_since(&self, since: DateTime<Utc>, max_count: usize) -> Result<Vec<MessageEvent>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, device_id, chat_room, sender_name, sender_class, staff_member,
                    text_raw, text_hash, bucket_ts, received_at, server_received_at,
                    notification_id, ticket_id
             FROM events WHERE server_received_at > ?1
             ORDER BY server_received_at ASC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![since.to_rfc3339(), max_count as i64], row_to_event)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Customer-sent events with `received_at` at or after `since` — backs
    /// the `today_inbound` counter in `GET /v1/metrics/overview`.
    pub fn count_customer_events_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM events WHERE sender_class = 'customer' AND received_at >= ?1",
            rusqlite::params![since.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn validate(new: &NewMessageEvent) -> Result<()> {
    if new.device_id.trim().is_empty() {
        return Err(EventError::Validation("device_id must not be empty".into()));
    }
    if new.chat_room.trim().is_empty() {
        return Err(EventError::Validation("chat_room must not be empty".into()));
    }
    if new.chat_room.len() > MAX_CHAT_ROOM_BYTES {
        return Err(EventError::Validation(format!(
            "chat_room exceeds {MAX_CHAT_ROOM_BYTES} bytes"
        )));
    }
    if new.sender_name.trim().is_empty() {
        return Err(EventError::Validation("sender_name must not be empty".into()));
    }
    if new.text_raw.is_empty() {
        return Err(EventError::Validation("text_raw must not be empty".into()));
    }
    if new.text_raw.len() > MAX_TEXT_RAW_BYTES {
        return Err(EventError::Validation(format!(
            "text_raw exceeds {MAX_TEXT_RAW_BYTES} bytes"
        )));
    }
    Ok(())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageEvent> {
    let class_col: String = row.get(4)?;
    let staff_member: Option<String> = row.get(5)?;
    let sender_class = match (class_col.as_str(), staff_member) {
        ("staff", Some(name)) => SenderClass::Staff { staff_member: name },
        _ => SenderClass::Customer,
    };

    let bucket_ts: String = row.get(8)?;
    let received_at: String = row.get(9)?;
    let server_received_at: String = row.get(10)?;

    Ok(MessageEvent {
        id: row.get(0)?,
        device_id: row.get(1)?,
        chat_room: row.get(2)?,
        sender_name: row.get(3)?,
        sender_class,
        text_raw: row.get(6)?,
        text_hash: row.get(7)?,
        bucket_ts: parse_rfc3339(&bucket_ts),
        received_at: parse_rfc3339(&received_at),
        server_received_at: parse_rfc3339(&server_received_at),
        notification_id: row.get(11)?,
        ticket_id: row.get(12)?,
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_event(room: &str, sender: &str, text: &str, at: DateTime<Utc>) -> NewMessageEvent {
        NewMessageEvent {
            device_id: "device-1".to_string(),
            chat_room: room.to_string(),
            sender_name: sender.to_string(),
            text_raw: text.to_string(),
            received_at: at,
            notification_id: None,
        }
    }

    fn open_store() -> EventStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        EventStore::new(conn)
    }

    #[test]
    fn s1_first_customer_message_creates_event() {
        let store = open_store();
        let at = Utc.with_ymd_and_hms(2026, 1, 13, 1, 0, 0).unwrap();
        let outcome = store
            .insert(new_event("강남A내과 단톡", "원장님", "문자 안 나갔어요", at), 10)
            .unwrap();
        assert!(!outcome.deduped);
        assert!(!outcome.event.is_staff());
    }

    #[test]
    fn s3_resend_within_bucket_is_deduped_to_same_id() {
        let store = open_store();
        let at = Utc.with_ymd_and_hms(2026, 1, 13, 1, 0, 0).unwrap();
        let resend_at = at + chrono::Duration::seconds(3);

        let first = store
            .insert(new_event("강남A내과 단톡", "원장님", "문자 안 나갔어요", at), 10)
            .unwrap();
        let second = store
            .insert(
                new_event("강남A내과 단톡", "원장님", "문자 안 나갔어요", resend_at),
                10,
            )
            .unwrap();

        assert!(!first.deduped);
        assert!(second.deduped);
        assert_eq!(first.event.id, second.event.id);
    }

    #[test]
    fn staff_sender_is_classified_and_captured() {
        let store = open_store();
        let at = Utc.with_ymd_and_hms(2026, 1, 13, 1, 5, 0).unwrap();
        let outcome = store
            .insert(new_event("강남A내과 단톡", "[모션랩스_이우진]", "확인합니다", at), 10)
            .unwrap();
        assert!(outcome.event.is_staff());
        assert_eq!(outcome.event.staff_member(), Some("이우진"));
    }

    #[test]
    fn counts_only_customer_events_since_the_cutoff() {
        let store = open_store();
        let early = Utc.with_ymd_and_hms(2026, 1, 13, 0, 0, 0).unwrap();
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 13, 6, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 13, 12, 0, 0).unwrap();

        store.insert(new_event("room", "customer", "before cutoff", early), 10).unwrap();
        store.insert(new_event("room", "customer", "after cutoff", late), 10).unwrap();
        store.insert(new_event("room", "[모션랩스_이우진]", "staff after cutoff", late), 10).unwrap();

        assert_eq!(store.count_customer_events_since(cutoff).unwrap(), 1);
    }

    #[test]
    fn oversized_text_is_rejected() {
        let store = open_store();
        let at = Utc::now();
        let huge = "a".repeat(MAX_TEXT_RAW_BYTES + 1);
        let err = store
            .insert(new_event("room", "sender", &huge, at), 10)
            .unwrap_err();
        assert!(matches!(err, EventError::Validation(_)));
    }
}
