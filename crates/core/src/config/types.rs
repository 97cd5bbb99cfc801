use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::ConfigError;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Resolve the API credential from the config file or `GITHUB_TOKEN`.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        self.resolve_token_with(std::env::var(TOKEN_ENV_VAR).ok())
    }

    /// Same as [`Config::resolve_token`] with the environment value supplied.
    pub fn resolve_token_with(&self, env_token: Option<String>) -> Result<String, ConfigError> {
        self.api
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| env_token.filter(|t| !t.trim().is_empty()))
            .ok_or(ConfigError::MissingCredential(TOKEN_ENV_VAR))
    }
}

/// Upstream API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the REST API (default: https://api.github.com).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Access token. Falls back to the `GITHUB_TOKEN` environment variable.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Value of the `Accept` header.
    #[serde(default = "default_accept")]
    pub accept: String,
    /// Value of the `User-Agent` header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-attempt request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            accept: default_accept(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_accept() -> String {
    "application/vnd.github+json".to_string()
}

fn default_user_agent() -> String {
    concat!("prharvest/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Retry policy for transient HTTP failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff factor in milliseconds; attempt `n` sleeps `factor * 2^n`.
    #[serde(default = "default_backoff_factor_ms")]
    pub backoff_factor_ms: u64,

    /// Upper bound for a single sleep, in seconds.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Status codes that trigger a retry.
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

impl RetryConfig {
    /// Delay before the retry that follows attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = Duration::from_millis(self.backoff_factor_ms.saturating_mul(factor));
        delay.min(self.max_backoff())
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor_ms: default_backoff_factor_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            retry_statuses: default_retry_statuses(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_factor_ms() -> u64 {
    1000
}

fn default_max_backoff_secs() -> u64 {
    120
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

/// Which collection to harvest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Repository full name, `owner/name`.
    pub container: String,
    /// Pull request state filter sent upstream (default: closed).
    #[serde(default = "default_state")]
    pub state: String,
    /// Page size (default: 100, the upstream maximum).
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Sub-resource that determines `checks_status`.
    #[serde(default)]
    pub checks_source: ChecksSource,
}

fn default_state() -> String {
    "closed".to_string()
}

fn default_per_page() -> u32 {
    100
}

/// Sub-resource used to derive check status.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChecksSource {
    /// `commits/{sha}/check-runs`
    #[default]
    CheckRuns,
    /// Legacy `commits/{sha}/status`
    CombinedStatus,
}

/// Widths of the two bounded stages.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_workers")]
    pub page_workers: usize,
    #[serde(default = "default_workers")]
    pub enrich_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            page_workers: default_workers(),
            enrich_workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    crate::runner::DEFAULT_CONCURRENCY
}

/// Where the results go.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    /// Optional JSON dump of the fetched merged items, before enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_snapshot_path: Option<PathBuf>,
    /// Optional Prometheus textfile written at the end of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            path: default_output_path(),
            raw_snapshot_path: None,
            metrics_path: None,
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data/report.json")
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Sqlite,
}
