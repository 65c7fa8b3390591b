use chrono::{DateTime, Utc};
use csintel_core::time::floor_to_bucket;
use sha2::{Digest, Sha256};

/// `text_hash = SHA256(chat_room || 0x01 || sender_name || 0x01 || text_raw)`.
/// The `0x01` separator keeps concatenation injective for any input that
/// doesn't itself contain that control byte.
pub fn text_hash(chat_room: &str, sender_name: &str, text_raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chat_room.as_bytes());
    hasher.update([0x01]);
    hasher.update(sender_name.as_bytes());
    hasher.update([0x01]);
    hasher.update(text_raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Floor `received_at` to the configured dedup window (default 10 s).
pub fn bucket_ts(received_at: DateTime<Utc>, window_secs: u32) -> DateTime<Utc> {
    floor_to_bucket(received_at, window_secs as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn identical_inputs_hash_identically() {
        let a = text_hash("room", "sender", "text");
        let b = text_hash("room", "sender", "text");
        assert_eq!(a, b);
    }

    #[test]
    fn separator_prevents_concatenation_collisions() {
        // Without a separator, ("ab", "c", "d") and ("a", "bc", "d") would collide.
        let a = text_hash("ab", "c", "d");
        let b = text_hash("a", "bc", "d");
        assert_ne!(a, b);
    }

    #[test]
    fn resend_within_window_shares_bucket() {
        let received = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 0).unwrap();
        let resent = Utc.with_ymd_and_hms(2026, 1, 13, 10, 0, 3).unwrap();
        assert_eq!(bucket_ts(received, 10), bucket_ts(resent, 10));
    }
}
