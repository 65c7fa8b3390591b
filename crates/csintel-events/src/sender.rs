use std::sync::OnceLock;

use csintel_core::types::SenderClass;
use regex::Regex;

/// A sender whose display name fully matches `^\[모션랩스_(.+)\]$` is staff,
/// with the capture group as `staff_member`; anyone else is a customer.
/// This is a pure function, derived once at ingest and never re-derived
/// downstream.
pub fn classify_sender(sender_name: &str) -> SenderClass {
    let re = staff_pattern();
    match re.captures(sender_name) {
        Some(caps) => SenderClass::Staff {
            staff_member: caps[1].to_string(),
        },
        None => SenderClass::Customer,
    }
}

fn staff_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[모션랩스_(.+)\]$").expect("staff sender pattern is a valid regex")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_name_is_classified_with_member_captured() {
        let class = classify_sender("[모션랩스_이우진]");
        assert_eq!(
            class,
            SenderClass::Staff {
                staff_member: "이우진".to_string()
            }
        );
    }

    #[test]
    fn plain_name_is_customer() {
        assert_eq!(classify_sender("원장님"), SenderClass::Customer);
    }

    #[test]
    fn partial_match_is_not_staff() {
        // The pattern must match the whole string, not just a prefix/suffix.
        assert_eq!(
            classify_sender("prefix [모션랩스_이우진]"),
            SenderClass::Customer
        );
    }
}
