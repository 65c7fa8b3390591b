//! `csintel-tickets` — the per-room ticket state machine, its
//! notification side-table, and the SLA sweep logic that drives breach
//! alerting.

pub mod db;
pub mod engine;
pub mod error;
pub mod locks;
pub mod notifications;
pub mod sla;
pub mod types;

pub use engine::{TicketFilter, TicketStore};
pub use error::{Result, TicketError};
pub use notifications::NotificationStore;
pub use types::{EventKind, Notification, Ticket, TicketMetrics, TicketPatch};
