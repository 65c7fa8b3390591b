//! `csintel-learning` — the twice-weekly self-learning job: samples the
//! accumulated corpus, produces a versioned `Understanding` document via one
//! LLM call, and records each run as a `LearningExecution`.

pub mod anthropic;
pub mod corpus;
pub mod db;
pub mod error;
pub mod job;
pub mod provider;
pub mod store;
pub mod types;

pub use anthropic::AnthropicSummaryProvider;
pub use corpus::SampledTicket;
pub use error::{LearningError, Result};
pub use job::{JobOutcome, LearningJob};
pub use provider::{SummaryProvider, SummaryResponse};
pub use store::LearningStore;
pub use types::{LearningExecution, Understanding};
