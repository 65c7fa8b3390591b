pub mod health;
pub mod ingest;
pub mod learning;
pub mod login;
pub mod metrics;
pub mod notifications;
pub mod tickets;
pub mod users;
