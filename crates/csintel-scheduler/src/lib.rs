//! `csintel-scheduler` — a small, domain-agnostic job scheduler used to
//! drive the SLA monitor tick and the twice-weekly self-learning run. Kept
//! free of any `csintel-core` dependency so it could be lifted into another
//! project unchanged; the gateway binary is responsible for mapping
//! `SchedulerError` into the shared error envelope and for dispatching on
//! `Job::name`.

pub mod db;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use schedule::compute_next_run;
pub use types::{Job, JobStatus, Schedule};
