use std::sync::Mutex;

use chrono::{DateTime, Utc};
use csintel_core::types::{Priority, TicketStatus, Urgency};
use rusqlite::{OptionalExtension, Row};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, TicketError};
use crate::locks::LockRegistry;
use crate::types::{EventKind, Ticket, TicketMetrics, TicketPatch};

/// Filters for `GET /v1/tickets`.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub clinic_key: Option<String>,
    pub sla_breached: Option<bool>,
    pub page: u32,
    pub limit: u32,
}

/// Owns the ticket state machine and serializes transitions per
/// `clinic_key` via `LockRegistry`, combining a shared `Mutex<Connection>`
/// with a per-key async lock so concurrent events on different clinics
/// never block each other.
pub struct TicketStore {
    db: Mutex<rusqlite::Connection>,
    locks: LockRegistry,
}

impl TicketStore {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            locks: LockRegistry::new(),
        }
    }

    /// Apply one inbound event to the `clinic_key`'s ticket, per the state
    /// transition table in `transition`. Acquires the per-key advisory lock
    /// for the full read-then-write so the "find open ticket" read stays
    /// inside the lock scope.
    #[instrument(skip(self), fields(clinic_key, kind = ?kind))]
    pub async fn apply_event(
        &self,
        clinic_key: &str,
        kind: EventKind,
        at: DateTime<Utc>,
    ) -> Result<Ticket> {
        let lock = self.locks.lock_for(clinic_key);
        let _guard = lock.lock().await;

        let db = self.db.lock().unwrap();
        let open = find_open_locked(&db, clinic_key)?;

        let ticket = match open {
            None => create_ticket(&db, clinic_key, kind, at)?,
            Some(existing) => transition(&db, &existing, kind, at)?,
        };

        Ok(ticket)
    }

    /// Operator-driven edit.
    /// Unlike inference writes, operator fields are unconstrained.
    #[instrument(skip(self, patch), fields(ticket_id = %id))]
    pub async fn patch(&self, id: &str, patch: TicketPatch) -> Result<Ticket> {
        let existing = self.get(id)?.ok_or_else(|| TicketError::NotFound { id: id.to_string() })?;
        let lock = self.locks.lock_for(&existing.clinic_key);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let status = patch.status.unwrap_or(existing.status);
        let priority = patch.priority.unwrap_or(existing.priority);
        let next_action = patch.next_action.or(existing.next_action);
        let needs_reply = patch.needs_reply.unwrap_or(existing.needs_reply);

        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE tickets SET status=?1, priority=?2, next_action=?3, needs_reply=?4, updated_at=?5
             WHERE id=?6",
            rusqlite::params![
                status.to_string(),
                priority.to_string(),
                next_action,
                needs_reply,
                now.to_rfc3339(),
                id,
            ],
        )?;
        get_locked(&db, id)?.ok_or_else(|| TicketError::NotFound { id: id.to_string() })
    }

    /// Apply a classification result to the bound ticket:
    /// `topic_primary`/`summary_latest`/`next_action` are overwritten with
    /// the latest reading; `priority` may only be raised, per §4.2's
    /// "Priority inference" policy.
    #[instrument(skip(self, topic, summary, next_action), fields(ticket_id = %id, urgency = ?urgency))]
    pub fn apply_annotation(
        &self,
        id: &str,
        topic: Option<&str>,
        summary: Option<&str>,
        next_action: Option<&str>,
        urgency: Option<Urgency>,
    ) -> Result<Ticket> {
        let db = self.db.lock().unwrap();
        let existing = get_locked(&db, id)?.ok_or_else(|| TicketError::NotFound { id: id.to_string() })?;

        // A missing urgency reading leaves priority untouched rather than
        // inferring from an absent value.
        let priority = match urgency {
            Some(u) => std::cmp::max(existing.priority, u.inferred_priority()),
            None => existing.priority,
        };
        if priority != existing.priority {
            debug!(from = %existing.priority, to = %priority, "priority raised by inference");
        }

        let now = Utc::now();
        db.execute(
            "UPDATE tickets SET topic_primary=?1, summary_latest=?2, next_action=?3,
                                priority=?4, updated_at=?5
             WHERE id=?6",
            rusqlite::params![topic, summary, next_action, priority.to_string(), now.to_rfc3339(), id],
        )?;
        get_locked(&db, id)?.ok_or_else(|| TicketError::NotFound { id: id.to_string() })
    }

    pub fn get(&self, id: &str) -> Result<Option<Ticket>> {
        let db = self.db.lock().unwrap();
        get_locked(&db, id)
    }

    pub fn find_open(&self, clinic_key: &str) -> Result<Option<Ticket>> {
        let db = self.db.lock().unwrap();
        find_open_locked(&db, clinic_key)
    }

    /// `GET /v1/tickets` with filters and pagination.
    pub fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        let db = self.db.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, clinic_key, status, priority, topic_primary, summary_latest, next_action,
                    needs_reply, first_inbound_at, last_inbound_at, last_outbound_at,
                    first_response_sec, sla_breached, created_at, updated_at
             FROM tickets WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params.push(Box::new(status.to_string()));
        }
        if let Some(priority) = filter.priority {
            sql.push_str(" AND priority = ?");
            params.push(Box::new(priority.to_string()));
        }
        if let Some(ref clinic_key) = filter.clinic_key {
            sql.push_str(" AND clinic_key = ?");
            params.push(Box::new(clinic_key.clone()));
        }
        if let Some(sla_breached) = filter.sla_breached {
            sql.push_str(" AND sla_breached = ?");
            params.push(Box::new(sla_breached));
        }
        sql.push_str(" ORDER BY updated_at DESC LIMIT ? OFFSET ?");
        let limit = if filter.limit == 0 { 50 } else { filter.limit };
        params.push(Box::new(limit));
        params.push(Box::new(filter.page.saturating_mul(limit)));

        let mut stmt = db.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), row_to_ticket)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Candidate tickets for an SLA sweep: still `new`, not yet breached,
    /// with a first inbound timestamp set.
    pub fn list_sla_candidates(&self) -> Result<Vec<Ticket>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, clinic_key, status, priority, topic_primary, summary_latest, next_action,
                    needs_reply, first_inbound_at, last_inbound_at, last_outbound_at,
                    first_response_sec, sla_breached, created_at, updated_at
             FROM tickets
             WHERE status = 'new' AND sla_breached = 0 AND first_inbound_at IS NOT NULL
             ORDER BY first_inbound_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_ticket)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Re-check the breach predicate under the per-ticket lock and, if it
    /// still holds, set `sla_breached=true` and bump `updated_at`.
    #[instrument(skip(self), fields(ticket_id = %id))]
    pub async fn mark_breached_if_still_due(
        &self,
        id: &str,
        threshold_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Ticket>> {
        let existing = match self.get(id)? {
            Some(t) => t,
            None => return Ok(None),
        };
        let lock = self.locks.lock_for(&existing.clinic_key);
        let _guard = lock.lock().await;

        let db = self.db.lock().unwrap();
        let current = get_locked(&db, id)?;
        let current = match current {
            Some(t) => t,
            None => return Ok(None),
        };
        let still_due = current.status == TicketStatus::New
            && !current.sla_breached
            && current
                .first_inbound_at
                .map(|fi| (now - fi).num_seconds() >= threshold_secs)
                .unwrap_or(false);
        if !still_due {
            return Ok(None);
        }

        db.execute(
            "UPDATE tickets SET sla_breached = 1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now.to_rfc3339(), id],
        )?;
        let updated = get_locked(&db, id)?;
        Ok(updated)
    }

    /// Backing query for `GET /v1/metrics/overview`. The
    /// caller fills in `today_inbound` from `csintel-events`.
    pub fn metrics_overview(&self) -> Result<TicketMetrics> {
        let db = self.db.lock().unwrap();
        let sla_breached_count: u32 =
            db.query_row("SELECT COUNT(*) FROM tickets WHERE sla_breached = 1", [], |row| row.get(0))?;
        let urgent_count: u32 = db.query_row(
            "SELECT COUNT(*) FROM tickets WHERE priority = 'urgent' AND status != 'done'",
            [],
            |row| row.get(0),
        )?;
        let open_tickets: u32 =
            db.query_row("SELECT COUNT(*) FROM tickets WHERE status != 'done'", [], |row| row.get(0))?;
        let avg_response_sec: Option<f64> = db.query_row(
            "SELECT AVG(first_response_sec) FROM tickets WHERE first_response_sec IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(TicketMetrics { sla_breached_count, urgent_count, open_tickets, avg_response_sec })
    }
}

fn create_ticket(
    db: &rusqlite::Connection,
    clinic_key: &str,
    kind: EventKind,
    at: DateTime<Utc>,
) -> Result<Ticket> {
    let id = Uuid::new_v4().to_string();
    let now = at;
    let (status, first_inbound_at, last_inbound_at, last_outbound_at) = match kind {
        EventKind::Customer => (TicketStatus::New, Some(now), Some(now), None),
        EventKind::Staff => (TicketStatus::InProgress, None, None, Some(now)),
    };

    db.execute(
        "INSERT INTO tickets
         (id, clinic_key, status, priority, needs_reply, first_inbound_at, last_inbound_at,
          last_outbound_at, sla_breached, created_at, updated_at)
         VALUES (?1,?2,?3,'normal',0,?4,?5,?6,0,?7,?7)",
        rusqlite::params![
            id,
            clinic_key,
            status.to_string(),
            first_inbound_at.map(|t: DateTime<Utc>| t.to_rfc3339()),
            last_inbound_at.map(|t: DateTime<Utc>| t.to_rfc3339()),
            last_outbound_at.map(|t: DateTime<Utc>| t.to_rfc3339()),
            now.to_rfc3339(),
        ],
    )?;

    get_locked(db, &id)?.ok_or_else(|| TicketError::NotFound { id })
}

fn transition(
    db: &rusqlite::Connection,
    existing: &Ticket,
    kind: EventKind,
    at: DateTime<Utc>,
) -> Result<Ticket> {
    match (existing.status, kind) {
        // `done` is never the "existing open ticket" because the partial
        // unique index only covers status != 'done'; find_open_locked never
        // returns a done ticket, so this arm is unreachable in practice and
        // guarded defensively below.
        (TicketStatus::Done, _) => {
            warn!(ticket_id = %existing.id, "transition called on a done ticket, opening a new one");
            create_ticket(db, &existing.clinic_key, kind, at)
        }
        (TicketStatus::New, EventKind::Customer) => {
            db.execute(
                "UPDATE tickets SET last_inbound_at=?1, updated_at=?1 WHERE id=?2",
                rusqlite::params![at.to_rfc3339(), existing.id],
            )?;
            get_locked(db, &existing.id)?.ok_or_else(|| TicketError::NotFound { id: existing.id.clone() })
        }
        (TicketStatus::New, EventKind::Staff) => {
            let first_response_sec = existing
                .first_inbound_at
                .map(|fi| (at - fi).num_seconds());
            db.execute(
                "UPDATE tickets SET status='in_progress', last_outbound_at=?1,
                                    first_response_sec = COALESCE(first_response_sec, ?2),
                                    updated_at=?1
                 WHERE id=?3",
                rusqlite::params![at.to_rfc3339(), first_response_sec, existing.id],
            )?;
            get_locked(db, &existing.id)?.ok_or_else(|| TicketError::NotFound { id: existing.id.clone() })
        }
        (TicketStatus::InProgress, EventKind::Customer) => {
            db.execute(
                "UPDATE tickets SET last_inbound_at=?1, updated_at=?1 WHERE id=?2",
                rusqlite::params![at.to_rfc3339(), existing.id],
            )?;
            get_locked(db, &existing.id)?.ok_or_else(|| TicketError::NotFound { id: existing.id.clone() })
        }
        (TicketStatus::InProgress, EventKind::Staff) => {
            db.execute(
                "UPDATE tickets SET last_outbound_at=?1, updated_at=?1 WHERE id=?2",
                rusqlite::params![at.to_rfc3339(), existing.id],
            )?;
            get_locked(db, &existing.id)?.ok_or_else(|| TicketError::NotFound { id: existing.id.clone() })
        }
        (TicketStatus::Waiting, EventKind::Customer) => {
            // Re-inquiry re-arms the SLA clock.
            db.execute(
                "UPDATE tickets SET status='new', last_inbound_at=?1, first_inbound_at=?1,
                                    sla_breached=0, updated_at=?1
                 WHERE id=?2",
                rusqlite::params![at.to_rfc3339(), existing.id],
            )?;
            get_locked(db, &existing.id)?.ok_or_else(|| TicketError::NotFound { id: existing.id.clone() })
        }
        (TicketStatus::Waiting, EventKind::Staff) => {
            db.execute(
                "UPDATE tickets SET last_outbound_at=?1, updated_at=?1 WHERE id=?2",
                rusqlite::params![at.to_rfc3339(), existing.id],
            )?;
            get_locked(db, &existing.id)?.ok_or_else(|| TicketError::NotFound { id: existing.id.clone() })
        }
    }
}

fn get_locked(db: &rusqlite::Connection, id: &str) -> Result<Option<Ticket>> {
    db.query_row(
        "SELECT id, clinic_key, status, priority, topic_primary, summary_latest, next_action,
                needs_reply, first_inbound_at, last_inbound_at, last_outbound_at,
                first_response_sec, sla_breached, created_at, updated_at
         FROM tickets WHERE id = ?1",
        rusqlite::params![id],
        row_to_ticket,
    )
    .optional()
    .map_err(TicketError::Database)
}

fn find_open_locked(db: &rusqlite::Connection, clinic_key: &str) -> Result<Option<Ticket>> {
    db.query_row(
        "SELECT id, clinic_key, status, priority, topic_primary, summary_latest, next_action,
                needs_reply, first_inbound_at, last_inbound_at, last_outbound_at,
                first_response_sec, sla_breached, created_at, updated_at
         FROM tickets WHERE clinic_key = ?1 AND status != 'done'",
        rusqlite::params![clinic_key],
        row_to_ticket,
    )
    .optional()
    .map_err(TicketError::Database)
}

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let status: String = row.get(2)?;
    let priority: String = row.get(3)?;
    Ok(Ticket {
        id: row.get(0)?,
        clinic_key: row.get(1)?,
        status: status.parse().unwrap_or(TicketStatus::New),
        priority: priority.parse().unwrap_or(Priority::Normal),
        topic_primary: row.get(4)?,
        summary_latest: row.get(5)?,
        next_action: row.get(6)?,
        needs_reply: row.get(7)?,
        first_inbound_at: opt_dt(row, 8)?,
        last_inbound_at: opt_dt(row, 9)?,
        last_outbound_at: opt_dt(row, 10)?,
        first_response_sec: row.get(11)?,
        sla_breached: row.get(12)?,
        created_at: parse_dt(row.get::<_, String>(13)?),
        updated_at: parse_dt(row.get::<_, String>(14)?),
    })
}

fn opt_dt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.map(parse_dt))
}

fn parse_dt(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> TicketStore {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        TicketStore::new(conn)
    }

    fn t(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 13, h, m, s).unwrap()
    }

    #[tokio::test]
    async fn s1_first_customer_message_creates_new_ticket() {
        let store = store();
        let ticket = store
            .apply_event("강남A내과 단톡", EventKind::Customer, t(10, 0, 0))
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::New);
        assert_eq!(ticket.priority, Priority::Normal);
        assert_eq!(ticket.first_inbound_at, Some(t(10, 0, 0)));
        assert!(!ticket.sla_breached);
    }

    #[tokio::test]
    async fn s2_staff_reply_sets_in_progress_and_first_response() {
        let store = store();
        store
            .apply_event("강남A내과 단톡", EventKind::Customer, t(10, 0, 0))
            .await
            .unwrap();
        let ticket = store
            .apply_event("강남A내과 단톡", EventKind::Staff, t(10, 5, 0))
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.first_response_sec, Some(300));
    }

    #[tokio::test]
    async fn first_response_sec_is_set_only_once() {
        let store = store();
        store
            .apply_event("room", EventKind::Customer, t(10, 0, 0))
            .await
            .unwrap();
        store
            .apply_event("room", EventKind::Staff, t(10, 5, 0))
            .await
            .unwrap();
        let ticket = store
            .apply_event("room", EventKind::Staff, t(10, 10, 0))
            .await
            .unwrap();
        assert_eq!(ticket.first_response_sec, Some(300));
    }

    #[tokio::test]
    async fn s5_waiting_to_new_rearms_sla() {
        let store = store();
        store
            .apply_event("room", EventKind::Customer, t(9, 0, 0))
            .await
            .unwrap();
        let ticket = store
            .apply_event("room", EventKind::Staff, t(9, 5, 0))
            .await
            .unwrap();
        store
            .patch(
                &ticket.id,
                TicketPatch {
                    status: Some(TicketStatus::Waiting),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let rearmed = store
            .apply_event("room", EventKind::Customer, t(11, 0, 0))
            .await
            .unwrap();
        assert_eq!(rearmed.status, TicketStatus::New);
        assert_eq!(rearmed.first_inbound_at, Some(t(11, 0, 0)));
        assert!(!rearmed.sla_breached);
    }

    #[tokio::test]
    async fn done_ticket_reopens_as_new_ticket() {
        let store = store();
        let first = store
            .apply_event("room", EventKind::Customer, t(9, 0, 0))
            .await
            .unwrap();
        store
            .patch(
                &first.id,
                TicketPatch {
                    status: Some(TicketStatus::Done),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = store
            .apply_event("room", EventKind::Customer, t(12, 0, 0))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.status, TicketStatus::New);
    }

    #[tokio::test]
    async fn inference_never_lowers_priority() {
        let store = store();
        let ticket = store
            .apply_event("room", EventKind::Customer, t(9, 0, 0))
            .await
            .unwrap();
        store
            .patch(
                &ticket.id,
                TicketPatch {
                    priority: Some(Priority::Urgent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let annotated = store
            .apply_annotation(&ticket.id, Some("topic"), Some("summary"), None, Some(Urgency::Low))
            .unwrap();
        assert_eq!(annotated.priority, Priority::Urgent);
    }

    #[tokio::test]
    async fn metrics_overview_counts_open_urgent_and_breached() {
        let store = store();
        let a = store.apply_event("room-a", EventKind::Customer, t(9, 0, 0)).await.unwrap();
        store.patch(&a.id, TicketPatch { priority: Some(Priority::Urgent), ..Default::default() }).await.unwrap();
        store.apply_event("room-b", EventKind::Customer, t(9, 0, 0)).await.unwrap();

        let metrics = store.metrics_overview().unwrap();
        assert_eq!(metrics.open_tickets, 2);
        assert_eq!(metrics.urgent_count, 1);
        assert_eq!(metrics.sla_breached_count, 0);
        assert!(metrics.avg_response_sec.is_none());
    }

    #[tokio::test]
    async fn concurrent_events_on_same_clinic_key_serialize() {
        use std::sync::Arc;
        let store = Arc::new(store());
        let a = store.clone();
        let b = store.clone();
        let (ra, rb) = tokio::join!(
            a.apply_event("room", EventKind::Customer, t(10, 0, 0)),
            b.apply_event("room", EventKind::Staff, t(10, 0, 1)),
        );
        ra.unwrap();
        rb.unwrap();
        // Exactly one open ticket must remain regardless of interleaving.
        let open = store.find_open("room").unwrap();
        assert!(open.is_some());
    }
}
