//! `csintel-events` — ingest-side persistence: the `MessageEvent` model,
//! SHA-256 dedup hashing, sender classification, and the SQLite-backed
//! `EventStore` used by the ingest endpoint.

pub mod db;
pub mod dedup;
pub mod error;
pub mod sender;
pub mod store;
pub mod types;

pub use error::{EventError, Result};
pub use store::EventStore;
pub use types::{InsertOutcome, MessageEvent, NewMessageEvent};
