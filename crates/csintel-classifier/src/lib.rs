//! `csintel-classifier` — the LLM annotation worker: pulls unclassified
//! events, routes them between a fast and an escalation model, and writes
//! annotations back onto events and tickets.

pub mod anthropic;
pub mod db;
pub mod error;
pub mod provider;
pub mod router;
pub mod store;
pub mod types;
pub mod worker;

pub use anthropic::AnthropicProvider;
pub use error::{ClassifierError, Result};
pub use provider::{ClassifyContext, ClassifyResponse, ClassifyResult, LlmProvider, ProviderError};
pub use router::{ClassifierRouter, ClassifyOutcome};
pub use store::AnnotationStore;
pub use types::{AnnotationStatus, LlmAnnotation};
pub use worker::ClassifierWorker;
