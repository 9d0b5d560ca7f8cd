use std::path::PathBuf;
use std::time::Duration;

use journey_store::DEFAULT_DRAFT_KEY;

use crate::http::DEFAULT_REQUEST_TIMEOUT;
use crate::retry::RetryConfig;
use crate::scheduler::DEFAULT_DEBOUNCE_WINDOW;

const DEFAULT_API_URL: &str = "http://localhost:3000/api";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Draft sync configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Remote document store base URL.
    pub api_url: String,
    /// Opaque bearer token for remote requests.
    pub api_token: Option<String>,
    /// Organization every write is attributed to.
    pub organization_id: Option<String>,
    /// Delay between the last edit and the sync it triggers.
    pub debounce_window: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Directory for the file-backed draft cache; in-memory when unset.
    pub cache_dir: Option<PathBuf>,
    /// Key the draft is stored under.
    pub cache_key: String,
    pub retry: RetryConfig,
    pub log_format: LogFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            organization_id: None,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_dir: None,
            cache_key: DEFAULT_DRAFT_KEY.to_string(),
            retry: RetryConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                      |
    /// |---------------------------|------------------------------|
    /// | `JOURNEY_API_URL`         | `http://localhost:3000/api`  |
    /// | `JOURNEY_API_TOKEN`       | unset                        |
    /// | `JOURNEY_ORGANIZATION_ID` | unset                        |
    /// | `DRAFT_DEBOUNCE_SECS`     | `30`                         |
    /// | `REMOTE_TIMEOUT_SECS`     | `10`                         |
    /// | `DRAFT_CACHE_DIR`         | unset (in-memory cache)      |
    /// | `DRAFT_CACHE_KEY`         | `journeyDraft`               |
    /// | `SYNC_MAX_RETRIES`        | `0`                          |
    /// | `LOG_FORMAT`              | `pretty` (`json` also valid) |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let debounce_window = match non_empty("DRAFT_DEBOUNCE_SECS") {
            Some(v) => Duration::from_secs(parse_number("DRAFT_DEBOUNCE_SECS", &v)?),
            None => defaults.debounce_window,
        };

        let request_timeout = match non_empty("REMOTE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("REMOTE_TIMEOUT_SECS", &v)?),
            None => defaults.request_timeout,
        };

        let retry = match non_empty("SYNC_MAX_RETRIES") {
            Some(v) => defaults
                .retry
                .clone()
                .with_max_retries(parse_number("SYNC_MAX_RETRIES", &v)?),
            None => defaults.retry.clone(),
        };

        let log_format = match non_empty("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected `pretty` or `json`".to_string(),
                })
            }
        };

        Ok(Self {
            api_url: non_empty("JOURNEY_API_URL").unwrap_or(defaults.api_url),
            api_token: non_empty("JOURNEY_API_TOKEN"),
            organization_id: non_empty("JOURNEY_ORGANIZATION_ID"),
            debounce_window,
            request_timeout,
            cache_dir: non_empty("DRAFT_CACHE_DIR").map(PathBuf::from),
            cache_key: non_empty("DRAFT_CACHE_KEY").unwrap_or(defaults.cache_key),
            retry,
            log_format,
        })
    }
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
