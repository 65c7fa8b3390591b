use csintel_events::MessageEvent;
use csintel_tickets::Ticket;

/// Keeps the assembled prompt bounded regardless of corpus size, truncating
/// ticket-by-ticket once the running total would exceed the cap.
const MAX_PROMPT_CHARS: usize = 24_000;
const MAX_TURNS_PER_TICKET: usize = 12;
const MAX_TURN_CHARS: usize = 240;

/// One ticket plus its interleaved turns, ready to render into the prompt.
pub struct SampledTicket {
    pub ticket: Ticket,
    pub turns: Vec<MessageEvent>,
}

/// Renders the previous understanding (if any) and the sampled tickets into
/// a single prompt body, truncating once `MAX_PROMPT_CHARS` is reached.
pub fn render_prompt(previous_understanding: Option<&str>, sampled: &[SampledTicket]) -> String {
    let mut out = String::with_capacity(MAX_PROMPT_CHARS);

    if let Some(prev) = previous_understanding {
        out.push_str("## Previous understanding\n");
        out.push_str(prev);
        out.push_str("\n\n");
    }

    out.push_str("## Sampled tickets\n");
    for sampled_ticket in sampled {
        let section = render_ticket_section(sampled_ticket);
        if out.len() + section.len() > MAX_PROMPT_CHARS {
            break;
        }
        out.push_str(&section);
    }

    out
}

fn render_ticket_section(sampled: &SampledTicket) -> String {
    let t = &sampled.ticket;
    let mut s = format!(
        "### {} (status={}, priority={}, topic={})\n",
        t.clinic_key,
        t.status,
        t.priority,
        t.topic_primary.as_deref().unwrap_or("none"),
    );
    for turn in sampled.turns.iter().take(MAX_TURNS_PER_TICKET) {
        let role = if turn.is_staff() { "staff" } else { "customer" };
        let text: String = turn.text_raw.chars().take(MAX_TURN_CHARS).collect();
        s.push_str(&format!("- {role}: {text}\n"));
    }
    s.push('\n');
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use csintel_core::types::{Priority, SenderClass, TicketStatus};

    fn ticket(clinic_key: &str) -> Ticket {
        Ticket {
            id: "t1".into(),
            clinic_key: clinic_key.into(),
            status: TicketStatus::New,
            priority: Priority::Normal,
            topic_primary: None,
            summary_latest: None,
            next_action: None,
            needs_reply: true,
            first_inbound_at: None,
            last_inbound_at: None,
            last_outbound_at: None,
            first_response_sec: None,
            sla_breached: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn event(is_staff: bool, text: &str) -> MessageEvent {
        MessageEvent {
            id: "e1".into(),
            device_id: "d".into(),
            chat_room: "room".into(),
            sender_name: "x".into(),
            sender_class: if is_staff {
                SenderClass::Staff { staff_member: "원장님".into() }
            } else {
                SenderClass::Customer
            },
            text_raw: text.into(),
            text_hash: "h".into(),
            bucket_ts: Utc::now(),
            received_at: Utc::now(),
            server_received_at: Utc::now(),
            notification_id: None,
            ticket_id: None,
        }
    }

    #[test]
    fn renders_previous_understanding_and_ticket_turns() {
        let sampled = vec![SampledTicket { ticket: ticket("room-a"), turns: vec![event(false, "hello"), event(true, "hi there")] }];
        let out = render_prompt(Some("old summary"), &sampled);
        assert!(out.contains("old summary"));
        assert!(out.contains("room-a"));
        assert!(out.contains("customer: hello"));
        assert!(out.contains("staff: hi there"));
    }

    #[test]
    fn truncates_once_budget_is_exceeded() {
        let mut sampled = Vec::new();
        for i in 0..5000 {
            sampled.push(SampledTicket { ticket: ticket(&format!("room-{i}")), turns: vec![event(false, "x".repeat(50).as_str())] });
        }
        let out = render_prompt(None, &sampled);
        assert!(out.len() <= MAX_PROMPT_CHARS + 1024);
    }
}
