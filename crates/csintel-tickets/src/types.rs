use chrono::{DateTime, Utc};
use csintel_core::types::{NotificationType, Priority, TicketStatus};
use serde::{Deserialize, Serialize};

/// The open (or most recently closed) conversation for a `clinic_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub clinic_key: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub topic_primary: Option<String>,
    pub summary_latest: Option<String>,
    pub next_action: Option<String>,
    pub needs_reply: bool,
    pub first_inbound_at: Option<DateTime<Utc>>,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub last_outbound_at: Option<DateTime<Utc>>,
    pub first_response_sec: Option<i64>,
    pub sla_breached: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// `sla_remaining_sec`: negative once breached, `None`
    /// when `first_inbound_at` is unset (e.g. the ticket opened on a staff
    /// message with no prior customer inbound).
    pub fn sla_remaining_sec(&self, now: DateTime<Utc>, threshold_secs: i64) -> Option<i64> {
        sla_remaining_sec(self.first_inbound_at, now, threshold_secs)
    }
}

/// Pure computation, independently testable.
pub fn sla_remaining_sec(
    first_inbound_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_secs: i64,
) -> Option<i64> {
    let first_inbound_at = first_inbound_at?;
    let elapsed = (now - first_inbound_at).num_seconds();
    Some(threshold_secs - elapsed)
}

/// The two kinds of message that drive the state machine; an operator's
/// explicit `PATCH /v1/tickets/{id}` status write is a separate code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Customer,
    Staff,
}

/// Fields an operator may change via `PATCH /v1/tickets/{id}`.
/// Inference-driven writes go through `TicketStore::apply_annotation`
/// instead and are subject to the priority-never-lowered rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketPatch {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub next_action: Option<String>,
    pub needs_reply: Option<bool>,
}

/// Aggregate counters backing `GET /v1/metrics/overview`.
/// `today_inbound` is filled in by the caller from `csintel-events`, since
/// inbound message counts live on the events table, not tickets.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TicketMetrics {
    pub sla_breached_count: u32,
    pub urgent_count: u32,
    pub open_tickets: u32,
    pub avg_response_sec: Option<f64>,
}

/// One breach or operator-visible system event.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub ticket_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn remaining_is_none_without_first_inbound() {
        assert_eq!(sla_remaining_sec(None, Utc::now(), 1200), None);
    }

    #[test]
    fn remaining_goes_negative_after_threshold() {
        let first = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 13, 10, 20, 1).unwrap();
        let remaining = sla_remaining_sec(Some(first), now, 1200).unwrap();
        assert!(remaining < 0);
    }

    #[test]
    fn s2_exact_first_response_example() {
        let first = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 13, 10, 5, 0).unwrap();
        assert_eq!((now - first).num_seconds(), 300);
    }
}
