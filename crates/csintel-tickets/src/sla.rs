use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::engine::TicketStore;
use crate::error::Result;
use crate::notifications::NotificationStore;
use crate::types::{Notification, Ticket};

/// One newly confirmed breach from a single `run_tick` pass — the caller
/// (the gateway's scheduler wiring) uses `ticket` to format and send the
/// outbound Slack POST after this function's commit has already landed.
pub struct BreachEvent {
    pub ticket: Ticket,
    pub notification: Notification,
}

/// One SLA monitor sweep. Selects candidates,
/// then for each candidate takes the per-ticket lock, re-checks the breach
/// predicate, and commits the breach plus its notification atomically with
/// respect to that ticket. The caller is responsible for the Slack POST,
/// which happens after this function returns and is retried independently
/// of this commit.
#[instrument(skip(tickets, notifications))]
pub async fn run_tick(
    tickets: &TicketStore,
    notifications: &NotificationStore,
    threshold_minutes: u32,
    now: DateTime<Utc>,
) -> Result<Vec<BreachEvent>> {
    let threshold_secs = i64::from(threshold_minutes) * 60;
    let candidates = tickets.list_sla_candidates()?;
    let mut breaches = Vec::new();

    for candidate in candidates {
        let Some(breached) = tickets
            .mark_breached_if_still_due(&candidate.id, threshold_secs, now)
            .await?
        else {
            continue;
        };

        let elapsed_min = breached
            .first_inbound_at
            .map(|fi| (now - fi).num_minutes())
            .unwrap_or(0);
        let notification = notifications.insert_sla_breach(
            &breached.id,
            "SLA breach",
            &format!(
                "{} has had no staff reply for {} minutes",
                breached.clinic_key, elapsed_min
            ),
        )?;
        info!(ticket_id = %breached.id, elapsed_min, "SLA breach recorded");

        breaches.push(BreachEvent {
            ticket: breached,
            notification,
        });
    }

    Ok(breaches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use chrono::Duration;

    fn stores() -> (TicketStore, NotificationStore) {
        let conn1 = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn1).unwrap();
        let tickets = TicketStore::new(conn1);
        let conn2 = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn2).unwrap();
        let notifications = NotificationStore::new(conn2);
        (tickets, notifications)
    }

    #[tokio::test]
    async fn s4_breach_after_threshold_fires_once() {
        let (tickets, notifications) = stores();
        let start = Utc::now() - Duration::minutes(30);
        tickets.apply_event("room", EventKind::Customer, start).await.unwrap();

        let breaches = run_tick(&tickets, &notifications, 20, Utc::now()).await.unwrap();
        assert_eq!(breaches.len(), 1);

        // Running it again must not produce a second breach or notification.
        let again = run_tick(&tickets, &notifications, 20, Utc::now()).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(
            notifications
                .count_for_ticket(&breaches[0].ticket.id, csintel_core::types::NotificationType::SlaBreach)
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn no_breach_before_threshold() {
        let (tickets, notifications) = stores();
        let start = Utc::now() - Duration::minutes(5);
        tickets.apply_event("room", EventKind::Customer, start).await.unwrap();

        let breaches = run_tick(&tickets, &notifications, 20, Utc::now()).await.unwrap();
        assert!(breaches.is_empty());
    }

    #[tokio::test]
    async fn staff_reply_before_breach_cancels_exposure() {
        let (tickets, notifications) = stores();
        let start = Utc::now() - Duration::minutes(30);
        tickets.apply_event("room", EventKind::Customer, start).await.unwrap();
        tickets
            .apply_event("room", EventKind::Staff, start + Duration::minutes(5))
            .await
            .unwrap();

        let breaches = run_tick(&tickets, &notifications, 20, Utc::now()).await.unwrap();
        assert!(breaches.is_empty());
    }
}
