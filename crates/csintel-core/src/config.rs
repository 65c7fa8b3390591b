use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_SLA_THRESHOLD_MINUTES: u32 = 20;
pub const DEFAULT_DEDUP_WINDOW_SECONDS: u32 = 10;
pub const DEFAULT_CLASSIFIER_BATCH_SIZE: usize = 16;
pub const DEFAULT_CLASSIFIER_MAX_TOKENS_PER_RUN: u64 = 200_000;
pub const DEFAULT_LEARNING_SCHEDULE_CRON: &str = "0 2 * * 1,4";
pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";
/// KST is a fixed UTC+9 offset — no DST, so a constant is exact.
pub const KST_OFFSET_HOURS: i64 = 9;

/// Top-level config, loaded from an optional TOML file plus `CSINTEL_`-prefixed
/// environment overrides, in that precedence order (explicit path > env >
/// file > defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,

    /// SQLite file backing every subsystem's tables.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Shared secret the mobile collector must present via `X-DEVICE-KEY`.
    pub device_key: String,

    /// Signing key for dashboard JWTs.
    pub jwt_secret: String,

    pub llm_api_key: String,
    #[serde(default = "default_model_fast")]
    pub llm_model_fast: String,
    #[serde(default = "default_model_escalation")]
    pub llm_model_escalation: String,

    /// Optional — Slack alerting is disabled entirely when unset.
    pub slack_webhook_url: Option<String>,

    #[serde(default = "default_sla_threshold_minutes")]
    pub sla_threshold_minutes: u32,
    #[serde(default = "default_dedup_window_seconds")]
    pub dedup_window_seconds: u32,

    #[serde(default = "default_classifier_batch_size")]
    pub classifier_batch_size: usize,
    #[serde(default = "default_classifier_max_tokens_per_run")]
    pub classifier_max_tokens_per_run: u64,

    /// 5-field cron (`minute hour * * days`), days per the standard
    /// 0-or-7=Sunday..6=Saturday convention. Only `*` is supported in the
    /// day-of-month and month fields.
    #[serde(default = "default_learning_schedule_cron")]
    pub learning_schedule_cron: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_database_url() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.csintel/csintel.db", home)
}
fn default_model_fast() -> String {
    "claude-haiku-4-5".to_string()
}
fn default_model_escalation() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_sla_threshold_minutes() -> u32 {
    DEFAULT_SLA_THRESHOLD_MINUTES
}
fn default_dedup_window_seconds() -> u32 {
    DEFAULT_DEDUP_WINDOW_SECONDS
}
fn default_classifier_batch_size() -> usize {
    DEFAULT_CLASSIFIER_BATCH_SIZE
}
fn default_classifier_max_tokens_per_run() -> u64 {
    DEFAULT_CLASSIFIER_MAX_TOKENS_PER_RUN
}
fn default_learning_schedule_cron() -> String {
    DEFAULT_LEARNING_SCHEDULE_CRON.to_string()
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

impl Config {
    /// Load config from an optional TOML file with `CSINTEL_*` env overrides.
    ///
    /// Checks, in order: explicit path argument, then `CSINTEL_CONFIG` env var,
    /// then `~/.csintel/csintel.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("CSINTEL_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: Config = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CSINTEL_"))
            .extract()
            .map_err(|e| crate::error::CsIntelError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.csintel/csintel.toml", home)
}
