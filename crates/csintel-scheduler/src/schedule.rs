use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::types::Schedule;

/// Compute the next UTC execution time for `schedule` starting *after* `from`.
/// Returns `None` only for an exhausted `Once` (its instant has passed).
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Interval { every_secs } => Some(from + Duration::seconds(*every_secs as i64)),

        Schedule::Daily { hour, minute } => {
            let candidate = Utc
                .with_ymd_and_hms(from.year(), from.month(), from.day(), *hour as u32, *minute as u32, 0)
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            let today_dow = from.weekday().num_days_from_monday() as i64;
            let target_dow = (*day as i64).clamp(0, 6);
            let days_ahead = target_dow - today_dow;

            let candidate_day = if days_ahead < 0 {
                from + Duration::days(7 + days_ahead)
            } else {
                from + Duration::days(days_ahead)
            };

            let candidate = Utc
                .with_ymd_and_hms(candidate_day.year(), candidate_day.month(), candidate_day.day(), *hour as u32, *minute as u32, 0)
                .single()?;

            if candidate > from {
                Some(candidate)
            } else {
                let push = if days_ahead <= 0 { 7 } else { 7 - days_ahead };
                Some(candidate + Duration::days(push))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn interval_advances_by_exactly_one_period() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = compute_next_run(&Schedule::Interval { every_secs: 60 }, from).unwrap();
        assert_eq!((next - from).num_seconds(), 60);
    }

    #[test]
    fn once_in_the_past_is_exhausted() {
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(compute_next_run(&Schedule::Once { at: past }, now).is_none());
    }

    #[test]
    fn weekly_rolls_forward_to_the_next_matching_weekday() {
        // 2026-01-13 is a Tuesday; day=0 is Monday, so the next Monday should
        // be 2026-01-19.
        let tuesday = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 0).unwrap();
        let next = compute_next_run(&Schedule::Weekly { day: 0, hour: 2, minute: 0 }, tuesday).unwrap();
        assert_eq!(next.weekday(), chrono::Weekday::Mon);
        assert!(next > tuesday);
    }
}
