//! All timestamps are stored and reasoned about in UTC; KST (UTC+09:00) is
//! purely a display convention.

use chrono::{DateTime, Utc};

use crate::config::KST_OFFSET_HOURS;

/// Render a UTC instant as its KST wall-clock equivalent, RFC 3339 with the
/// `+09:00` offset rather than `Z`.
pub fn to_kst_display(at: DateTime<Utc>) -> String {
    let kst = at + chrono::Duration::hours(KST_OFFSET_HOURS);
    let fixed = chrono::FixedOffset::east_opt(KST_OFFSET_HOURS as i32 * 3600)
        .expect("KST offset is a valid fixed offset");
    kst.with_timezone(&fixed).to_rfc3339()
}

/// Floor `at` to the start of its `window_secs`-wide bucket — used for the
/// dedup `bucket_ts`.
pub fn floor_to_bucket(at: DateTime<Utc>, window_secs: i64) -> DateTime<Utc> {
    let epoch = at.timestamp();
    let floored = epoch - epoch.rem_euclid(window_secs);
    DateTime::from_timestamp(floored, 0).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_floor_is_stable_within_window() {
        let t1 = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 3).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 9).unwrap();
        assert_eq!(floor_to_bucket(t1, 10), floor_to_bucket(t2, 10));
    }

    #[test]
    fn bucket_floor_separates_adjacent_windows() {
        let t1 = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 9).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 11).unwrap();
        assert_ne!(floor_to_bucket(t1, 10), floor_to_bucket(t2, 10));
    }

    #[test]
    fn kst_display_adds_nine_hours() {
        let utc = Utc.with_ymd_and_hms(2026, 1, 13, 1, 0, 0).unwrap();
        let s = to_kst_display(utc);
        assert!(s.starts_with("2026-01-13T10:00:00"));
        assert!(s.ends_with("+09:00"));
    }
}
