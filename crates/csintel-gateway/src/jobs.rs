use std::sync::Arc;

use csintel_core::config::{Config, KST_OFFSET_HOURS};
use csintel_core::types::TriggerType;
use csintel_scheduler::{Job, Schedule, SchedulerHandle};
use tracing::{error, info, warn};

use crate::app::AppState;

/// How often the SLA monitor sweeps.
const SLA_MONITOR_INTERVAL_SECS: u64 = 30;

/// Registers the recurring jobs this deployment needs, if they aren't
/// already present. Idempotent across restarts — `SchedulerHandle::add_job`
/// always inserts a fresh row, so this only runs the inserts once per job
/// name ever observed, rather than on every startup.
pub fn bootstrap_default_jobs(scheduler: &SchedulerHandle, config: &Config) -> anyhow::Result<()> {
    let existing = scheduler.list_jobs()?;

    if !existing.iter().any(|j| j.name == "sla_monitor") {
        scheduler.add_job("sla_monitor", Schedule::Interval { every_secs: SLA_MONITOR_INTERVAL_SECS })?;
        info!("registered sla_monitor job");
    }

    if !existing.iter().any(|j| j.name == "self_learning") {
        let slots = parse_kst_weekly_cron(&config.learning_schedule_cron)?;
        for (day, hour, minute) in &slots {
            scheduler.add_job("self_learning", Schedule::Weekly { day: *day, hour: *hour, minute: *minute })?;
        }
        info!(cron = %config.learning_schedule_cron, count = slots.len(), "registered self_learning jobs");
    }

    Ok(())
}

/// Parses a restricted 5-field cron (`minute hour * * days`) whose time is
/// expressed in KST, into `Schedule::Weekly` triples expressed in UTC.
///
/// `days` is a comma list in the standard cron convention (0 or 7 = Sunday,
/// 1 = Monday, ..., 6 = Saturday); the day-of-month and month fields must be
/// `*`. KST is a fixed UTC+9 offset with no DST, so shifting the hour back
/// by `KST_OFFSET_HOURS` either leaves the weekday unchanged or rolls it
/// back by exactly one day — there is never a multi-day shift to account
/// for.
fn parse_kst_weekly_cron(cron: &str) -> anyhow::Result<Vec<(u8, u8, u8)>> {
    let fields: Vec<&str> = cron.split_whitespace().collect();
    let [minute, hour, dom, month, dow] = fields.as_slice() else {
        anyhow::bail!("expected a 5-field cron expression, got `{cron}`");
    };
    if *dom != "*" || *month != "*" {
        anyhow::bail!("day-of-month and month fields must be `*` in `{cron}`");
    }

    let kst_minute: u8 = minute.parse()?;
    let kst_hour: i64 = hour.parse()?;

    let mut utc_hour = kst_hour - KST_OFFSET_HOURS;
    let day_shift = if utc_hour < 0 {
        utc_hour += 24;
        -1
    } else {
        0
    };

    let mut slots = Vec::new();
    for part in dow.split(',') {
        let cron_dow: i64 = part.trim().parse()?;
        let cron_dow = cron_dow % 7; // fold 7 ("Sunday") onto 0
        let iso_kst = (cron_dow + 6) % 7; // cron's 0=Sunday -> ISO's 6=Sunday, 0=Monday
        let iso_utc = (iso_kst + day_shift + 7) % 7;
        slots.push((iso_utc as u8, utc_hour as u8, kst_minute));
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_maps_to_sunday_and_wednesday_1700_utc() {
        let slots = parse_kst_weekly_cron("0 2 * * 1,4").unwrap();
        assert_eq!(slots, vec![(6, 17, 0), (2, 17, 0)]);
    }

    #[test]
    fn late_kst_hour_does_not_shift_the_weekday() {
        // 14:00 KST Monday (cron dow 1) is 05:00 UTC the same day (ISO 0).
        let slots = parse_kst_weekly_cron("0 14 * * 1").unwrap();
        assert_eq!(slots, vec![(0, 5, 0)]);
    }

    #[test]
    fn rejects_non_wildcard_day_of_month() {
        assert!(parse_kst_weekly_cron("0 2 1 * 1,4").is_err());
    }
}

/// Dispatches one fired job by name.
pub async fn dispatch_fired_job(job: Job, state: Arc<AppState>) {
    match job.name.as_str() {
        "sla_monitor" => run_sla_sweep(&state).await,
        "self_learning" => run_self_learning(&state).await,
        other => warn!(job_name = other, "fired job has no known handler, ignoring"),
    }
}

async fn run_sla_sweep(state: &Arc<AppState>) {
    let now = chrono::Utc::now();
    let breaches = match csintel_tickets::sla::run_tick(
        &state.tickets,
        &state.notifications,
        state.config.sla_threshold_minutes,
        now,
    )
    .await
    {
        Ok(b) => b,
        Err(e) => {
            error!(err = %e, "sla monitor tick failed");
            return;
        }
    };

    let Some(slack) = &state.slack else {
        if !breaches.is_empty() {
            info!(count = breaches.len(), "sla breaches recorded, Slack alerting disabled");
        }
        return;
    };

    for breach in breaches {
        if let Err(e) = slack.post_text(&format!(":rotating_light: {}", breach.notification.message)).await {
            error!(ticket_id = %breach.ticket.id, err = %e, "failed to post SLA breach to Slack");
        }
    }
}

async fn run_self_learning(state: &Arc<AppState>) {
    match state.learning.run(TriggerType::Scheduled).await {
        Ok(outcome) => {
            info!(status = %outcome.execution.status, "scheduled self-learning run finished");
        }
        Err(e) => {
            error!(err = %e, "scheduled self-learning run failed to start");
        }
    }
}
