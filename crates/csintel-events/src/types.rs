use chrono::{DateTime, Utc};
use csintel_core::types::SenderClass;
use serde::{Deserialize, Serialize};

/// Caller-supplied fields for a new event, before dedup/classification are
/// applied.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessageEvent {
    pub device_id: String,
    pub chat_room: String,
    pub sender_name: String,
    pub text_raw: String,
    pub received_at: DateTime<Utc>,
    pub notification_id: Option<String>,
}

/// Input constraints enforced before persistence.
pub const MAX_TEXT_RAW_BYTES: usize = 8 * 1024;
pub const MAX_CHAT_ROOM_BYTES: usize = 512;

/// A persisted chat message. Never mutated after
/// insert; soft-linked to exactly one Ticket by `csintel-tickets`.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEvent {
    pub id: String,
    pub device_id: String,
    pub chat_room: String,
    pub sender_name: String,
    pub sender_class: SenderClass,
    pub text_raw: String,
    pub text_hash: String,
    pub bucket_ts: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub server_received_at: DateTime<Utc>,
    pub notification_id: Option<String>,
    pub ticket_id: Option<String>,
}

impl MessageEvent {
    pub fn is_staff(&self) -> bool {
        self.sender_class.is_staff()
    }

    pub fn staff_member(&self) -> Option<&str> {
        match &self.sender_class {
            SenderClass::Staff { staff_member } => Some(staff_member.as_str()),
            SenderClass::Customer => None,
        }
    }
}

/// Result of `EventStore::insert` — `deduped=true` when the
/// `(text_hash, bucket_ts)` tuple already existed.
#[derive(Debug, Clone, Serialize)]
pub struct InsertOutcome {
    pub event: MessageEvent,
    pub deduped: bool,
}
