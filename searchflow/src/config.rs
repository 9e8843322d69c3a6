//! Process-wide configuration.
//!
//! Configuration is read once at startup (from the environment or a JSON
//! file), validated, and handed to the [`Pipeline`](crate::pipeline::Pipeline)
//! at construction. Stages only ever see the limits they need.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{Result, SearchflowError};
use crate::pipeline::RetryConfig;

const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Top-level configuration for a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Search provider settings.
    #[serde(default)]
    pub search: SearchSettings,
    /// Language model settings.
    #[serde(default)]
    pub model: ModelSettings,
    /// Page fetching settings.
    #[serde(default)]
    pub fetch: FetchSettings,
    /// Numeric limits applied by the stages.
    #[serde(default)]
    pub limits: Limits,
    /// Whether the entity annotation stage runs.
    #[serde(default)]
    pub entities_enabled: bool,
    /// Deadline for a whole run in seconds; `None` disables it.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: Option<f64>,
    /// Retry policy for transient upstream failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogSettings,
}

#[allow(clippy::unnecessary_wraps)]
fn default_run_timeout() -> Option<f64> {
    Some(120.0)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            model: ModelSettings::default(),
            fetch: FetchSettings::default(),
            limits: Limits::default(),
            entities_enabled: false,
            run_timeout_seconds: default_run_timeout(),
            retry: RetryConfig::default(),
            log: LogSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file. Unset
    /// variables keep their defaults; malformed numbers are rejected.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.search.api_key = get("GOOGLE_API_KEY").or_else(|| get("SEARCHFLOW_SEARCH_API_KEY"));
        config.search.engine_id =
            get("GOOGLE_CSE_ID").or_else(|| get("SEARCHFLOW_SEARCH_ENGINE_ID"));
        if let Some(endpoint) = get("SEARCHFLOW_SEARCH_ENDPOINT") {
            config.search.endpoint = endpoint;
        }

        config.model.api_key = get("OPENAI_API_KEY").or_else(|| get("SEARCHFLOW_MODEL_API_KEY"));
        if let Some(model) = get("SEARCHFLOW_MODEL") {
            config.model.model = model;
        }
        if let Some(base_url) = get("SEARCHFLOW_MODEL_BASE_URL") {
            config.model.base_url = base_url;
        }

        let limits = &mut config.limits;
        parse_into(&get, "SEARCHFLOW_MAX_EXPANSIONS", &mut limits.max_expansions)?;
        parse_into(&get, "SEARCHFLOW_MAX_RESULTS_PER_QUERY", &mut limits.max_results_per_query)?;
        parse_into(&get, "SEARCHFLOW_MAX_TOTAL_RESULTS", &mut limits.max_total_results)?;
        parse_into(&get, "SEARCHFLOW_MAX_FETCH_CONCURRENCY", &mut limits.max_fetch_concurrency)?;
        parse_into(&get, "SEARCHFLOW_FETCH_TIMEOUT_SECONDS", &mut limits.fetch_timeout_seconds)?;
        parse_into(&get, "SEARCHFLOW_MAX_CHARS_PER_DOCUMENT", &mut limits.max_chars_per_document)?;
        parse_into(&get, "SEARCHFLOW_MAX_TOTAL_CHARS", &mut limits.max_total_chars)?;

        parse_into(&get, "SEARCHFLOW_ENTITIES", &mut config.entities_enabled)?;
        parse_into(&get, "SEARCHFLOW_MAX_ATTEMPTS", &mut config.retry.max_attempts)?;
        if let Some(raw) = get("SEARCHFLOW_RUN_TIMEOUT_SECONDS") {
            let seconds: f64 = parse_value("SEARCHFLOW_RUN_TIMEOUT_SECONDS", &raw)?;
            // only zero disables the deadline; negatives fail validation below
            config.run_timeout_seconds = (seconds != 0.0).then_some(seconds);
        }

        if let Some(level) = get("SEARCHFLOW_LOG") {
            config.log.level = level;
        }
        parse_into(&get, "SEARCHFLOW_LOG_JSON", &mut config.log.json)?;

        config.validate()?;
        Ok(config)
    }

    /// Sets whether entity annotation runs.
    #[must_use]
    pub fn with_entities(mut self, enabled: bool) -> Self {
        self.entities_enabled = enabled;
        self
    }

    /// Sets the run deadline in seconds.
    #[must_use]
    pub fn with_run_timeout(mut self, seconds: Option<f64>) -> Self {
        self.run_timeout_seconds = seconds;
        self
    }

    /// Replaces the limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Gets the run deadline as a Duration.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_seconds.map(seconds_to_duration)
    }

    /// Validates limits and timeouts.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let limits = &self.limits;

        if limits.max_fetch_concurrency == 0 {
            errors.push("limits.max_fetch_concurrency must be at least 1".to_string());
        }
        if !is_valid_timeout(limits.fetch_timeout_seconds) {
            errors.push(timeout_error("limits.fetch_timeout_seconds"));
        }
        if limits.max_chars_per_document == 0 {
            errors.push("limits.max_chars_per_document must be at least 1".to_string());
        }
        if limits.max_total_chars == 0 {
            errors.push("limits.max_total_chars must be at least 1".to_string());
        }
        if !is_valid_timeout(self.search.timeout_seconds) {
            errors.push(timeout_error("search.timeout_seconds"));
        }
        if !is_valid_timeout(self.model.timeout_seconds) {
            errors.push(timeout_error("model.timeout_seconds"));
        }
        if let Some(seconds) = self.run_timeout_seconds {
            if !is_valid_timeout(seconds) {
                errors.push(timeout_error("run_timeout_seconds"));
            }
        }
        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SearchflowError::config(errors.join("; ")))
        }
    }
}

/// Upper bound for every timeout setting, one day.
pub const MAX_TIMEOUT_SECONDS: f64 = 86_400.0;

fn timeout_error(field: &str) -> String {
    format!("{field} must be more than 0 and at most {MAX_TIMEOUT_SECONDS} seconds")
}

fn is_valid_timeout(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0 && seconds <= MAX_TIMEOUT_SECONDS
}

/// Converts validated seconds to a Duration, clamping out-of-range input.
fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.min(MAX_TIMEOUT_SECONDS)).unwrap_or(Duration::ZERO)
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| SearchflowError::config(format!("{key}: cannot parse '{raw}'")))
}

fn parse_into<T, G>(get: &G, key: &str, target: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *target = parse_value(key, &raw)?;
    }
    Ok(())
}

/// Search provider settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchSettings {
    /// Search engine identifier (Google `cx`).
    #[serde(default)]
    pub engine_id: Option<String>,
    /// API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Endpoint URL.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// Per-call timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: f64,
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_search_timeout() -> f64 {
    10.0
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            engine_id: None,
            api_key: None,
            endpoint: default_search_endpoint(),
            timeout_seconds: default_search_timeout(),
        }
    }
}

impl SearchSettings {
    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        seconds_to_duration(self.timeout_seconds)
    }
}

impl std::fmt::Debug for SearchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSettings")
            .field("engine_id", &self.engine_id)
            .field("has_api_key", &self.api_key.is_some())
            .field("endpoint", &self.endpoint)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Language model settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSettings {
    /// API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_model_base_url")]
    pub base_url: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-call timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: f64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_model_base_url() -> String {
    DEFAULT_MODEL_BASE_URL.to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_model_timeout() -> f64 {
    60.0
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_model_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_model_timeout(),
        }
    }
}

impl ModelSettings {
    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        seconds_to_duration(self.timeout_seconds)
    }
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("has_api_key", &self.api_key.is_some())
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Page fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchSettings {
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum response size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
}

fn default_user_agent() -> String {
    format!("searchflow/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_response_bytes() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// Numeric limits applied by the stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Limits {
    /// Additional queries requested from the model.
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
    /// Results kept per search query.
    #[serde(default = "default_max_results_per_query")]
    pub max_results_per_query: usize,
    /// Results kept across all queries.
    #[serde(default = "default_max_total_results")]
    pub max_total_results: usize,
    /// Fetches allowed in flight at once.
    #[serde(default = "default_max_fetch_concurrency")]
    pub max_fetch_concurrency: usize,
    /// Per-fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: f64,
    /// Characters of one document included in the synthesis prompt.
    #[serde(default = "default_max_chars_per_document")]
    pub max_chars_per_document: usize,
    /// Characters of all documents included in the synthesis prompt.
    #[serde(default = "default_max_total_chars")]
    pub max_total_chars: usize,
    /// Entities listed in the synthesis prompt.
    #[serde(default = "default_max_prompt_entities")]
    pub max_prompt_entities: usize,
}

fn default_max_expansions() -> usize {
    3
}

fn default_max_results_per_query() -> usize {
    5
}

fn default_max_total_results() -> usize {
    10
}

fn default_max_fetch_concurrency() -> usize {
    4
}

fn default_fetch_timeout() -> f64 {
    15.0
}

fn default_max_chars_per_document() -> usize {
    4_000
}

fn default_max_total_chars() -> usize {
    20_000
}

fn default_max_prompt_entities() -> usize {
    10
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_expansions: default_max_expansions(),
            max_results_per_query: default_max_results_per_query(),
            max_total_results: default_max_total_results(),
            max_fetch_concurrency: default_max_fetch_concurrency(),
            fetch_timeout_seconds: default_fetch_timeout(),
            max_chars_per_document: default_max_chars_per_document(),
            max_total_chars: default_max_total_chars(),
            max_prompt_entities: default_max_prompt_entities(),
        }
    }
}

impl Limits {
    /// Gets the per-fetch timeout as Duration.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        seconds_to_duration(self.fetch_timeout_seconds)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSettings {
    /// Default level filter, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
