use std::sync::Mutex;

use chrono::{DateTime, Utc};
use csintel_core::types::NotificationType;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::types::Notification;

/// Breach and system notifications, written by
/// the SLA monitor and read/marked-read by the dashboard API.
pub struct NotificationStore {
    db: Mutex<Connection>,
}

impl NotificationStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Insert an `sla_breach` notification for a ticket. Relies on the
    /// partial unique index on `(ticket_id) WHERE type='sla_breach'` to make
    /// a second attempt for the same ticket a no-op rather than an error —
    /// callers only reach this after `mark_breached_if_still_due` confirms
    /// the breach is new, so the conflict path should never fire in
    /// practice.
    #[instrument(skip(self, message), fields(ticket_id))]
    pub fn insert_sla_breach(&self, ticket_id: &str, title: &str, message: &str) -> Result<Notification> {
        self.insert(NotificationType::SlaBreach, title, message, None, Some(ticket_id))
    }

    pub fn insert(
        &self,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        link: Option<&str>,
        ticket_id: Option<&str>,
    ) -> Result<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO notifications
             (id, type, title, message, link, ticket_id, is_read, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,0,?7)",
            rusqlite::params![
                id,
                notification_type.to_string(),
                title,
                message,
                link,
                ticket_id,
                now.to_rfc3339(),
            ],
        )?;

        let row = if let Some(ticket_id) = ticket_id {
            db.query_row(
                "SELECT id, type, title, message, link, ticket_id, is_read, created_at
                 FROM notifications WHERE ticket_id = ?1 AND type = ?2",
                rusqlite::params![ticket_id, notification_type.to_string()],
                row_to_notification,
            )?
        } else {
            db.query_row(
                "SELECT id, type, title, message, link, ticket_id, is_read, created_at
                 FROM notifications WHERE id = ?1",
                rusqlite::params![id],
                row_to_notification,
            )?
        };
        Ok(row)
    }

    pub fn list(&self, limit: u32) -> Result<Vec<Notification>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, type, title, message, link, ticket_id, is_read, created_at
             FROM notifications ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit], row_to_notification)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn mark_read(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", rusqlite::params![id])?;
        Ok(())
    }

    pub fn mark_all_read(&self) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("UPDATE notifications SET is_read = 1 WHERE is_read = 0", [])?;
        Ok(())
    }

    pub fn count_for_ticket(&self, ticket_id: &str, notification_type: NotificationType) -> Result<u32> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM notifications WHERE ticket_id = ?1 AND type = ?2",
            rusqlite::params![ticket_id, notification_type.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let notification_type: String = row.get(1)?;
    let created_at: String = row.get(7)?;
    Ok(Notification {
        id: row.get(0)?,
        notification_type: notification_type.parse().unwrap_or(NotificationType::Info),
        title: row.get(2)?,
        message: row.get(3)?,
        link: row.get(4)?,
        ticket_id: row.get(5)?,
        is_read: row.get(6)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NotificationStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        NotificationStore::new(conn)
    }

    #[test]
    fn s4_second_breach_insert_for_same_ticket_is_noop() {
        let store = store();
        let first = store.insert_sla_breach("ticket-1", "SLA breach", "20 minutes elapsed").unwrap();
        let second = store.insert_sla_breach("ticket-1", "SLA breach", "20 minutes elapsed").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_for_ticket("ticket-1", NotificationType::SlaBreach).unwrap(), 1);
    }

    #[test]
    fn mark_all_read_clears_unread_flag() {
        let store = store();
        store.insert_sla_breach("ticket-1", "t", "m").unwrap();
        store.mark_all_read().unwrap();
        let all = store.list(10).unwrap();
        assert!(all.iter().all(|n| n.is_read));
    }
}
