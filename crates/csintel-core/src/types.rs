use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sender classification, derived once at ingest and never re-derived
/// downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SenderClass {
    Customer,
    Staff { staff_member: String },
}

impl SenderClass {
    pub fn is_staff(&self) -> bool {
        matches!(self, SenderClass::Staff { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SenderClass::Customer => "customer",
            SenderClass::Staff { .. } => "staff",
        }
    }
}

/// Ticket lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    InProgress,
    Waiting,
    Done,
}

impl TicketStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, TicketStatus::Done)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TicketStatus::New => "new",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Waiting => "waiting",
            TicketStatus::Done => "done",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TicketStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(TicketStatus::New),
            "in_progress" => Ok(TicketStatus::InProgress),
            "waiting" => Ok(TicketStatus::Waiting),
            "done" => Ok(TicketStatus::Done),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// LLM-reported urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Fixed mapping owned by the ticket engine's policy: `critical->urgent, high->high, medium->normal,
    /// low->low`. Inference may only ever raise a ticket's priority.
    pub fn inferred_priority(&self) -> Priority {
        match self {
            Urgency::Critical => Priority::Urgent,
            Urgency::High => Priority::High,
            Urgency::Medium => Priority::Normal,
            Urgency::Low => Priority::Low,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Urgency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            other => Err(format!("unknown urgency: {other}")),
        }
    }
}

/// Trigger origin for a `LearningExecution` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Scheduled,
    Manual,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerType::Scheduled => "scheduled",
            TriggerType::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TriggerType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TriggerType::Scheduled),
            "manual" => Ok(TriggerType::Manual),
            other => Err(format!("unknown trigger type: {other}")),
        }
    }
}

/// Outcome of a `LearningExecution` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl fmt::Display for LearningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LearningStatus::Running => "running",
            LearningStatus::Success => "success",
            LearningStatus::Partial => "partial",
            LearningStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LearningStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(LearningStatus::Running),
            "success" => Ok(LearningStatus::Success),
            "partial" => Ok(LearningStatus::Partial),
            "failed" => Ok(LearningStatus::Failed),
            other => Err(format!("unknown learning status: {other}")),
        }
    }
}

/// Notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    SlaBreach,
    UrgentTicket,
    System,
    Info,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationType::SlaBreach => "sla_breach",
            NotificationType::UrgentTicket => "urgent_ticket",
            NotificationType::System => "system",
            NotificationType::Info => "info",
        };
        write!(f, "{s}")
    }
}

impl FromStr for NotificationType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sla_breach" => Ok(NotificationType::SlaBreach),
            "urgent_ticket" => Ok(NotificationType::UrgentTicket),
            "system" => Ok(NotificationType::System),
            "info" => Ok(NotificationType::Info),
            other => Err(format!("unknown notification type: {other}")),
        }
    }
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Member,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Member => write!(f, "member"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "member" => Ok(UserRole::Member),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_inference_is_monotonic_table() {
        assert_eq!(Urgency::Critical.inferred_priority(), Priority::Urgent);
        assert_eq!(Urgency::High.inferred_priority(), Priority::High);
        assert_eq!(Urgency::Medium.inferred_priority(), Priority::Normal);
        assert_eq!(Urgency::Low.inferred_priority(), Priority::Low);
    }

    #[test]
    fn ticket_status_roundtrip() {
        for s in ["new", "in_progress", "waiting", "done"] {
            let parsed = TicketStatus::from_str(s).unwrap();
            assert_eq!(parsed.to_string(), s);
        }
    }

    #[test]
    fn priority_ordering_supports_never_lower_check() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }
}
