use std::time::Duration;

use crate::{retry::Backoff, ApiError, Locale, Result, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configures base URLs, timeouts, retry and queue behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Primary API origin, e.g. `https://api.example.sch.id`.
    pub base_url: String,
    /// Origin used once when the primary is blocked client-side.
    pub fallback_base_url: Option<String>,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// HTTP statuses that are retried.
    pub retry_statuses: Vec<u16>,
    /// Pause between two queued requests.
    pub queue_delay: Duration,
    /// Language of classified error messages.
    pub locale: Locale,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            fallback_base_url: None,
            timeout: Duration::from_millis(15_000),
            max_attempts: retry.max_attempts,
            backoff: retry.backoff,
            retry_statuses: retry.retry_statuses,
            queue_delay: Duration::from_millis(100),
            locale: Locale::default(),
        }
    }
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self, fallback_base_url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(fallback_base_url.into());
        self
    }

    /// Builds options from `TKA_API_*` environment variables.
    ///
    /// Reads:
    /// - `TKA_API_BASE_URL` — primary origin
    /// - `TKA_API_FALLBACK_URL` — fallback origin
    /// - `TKA_API_TIMEOUT_MS` — per-attempt timeout
    /// - `TKA_API_MAX_ATTEMPTS` — attempts per operation
    /// - `TKA_API_RETRY_BACKOFF_MS` — linear backoff base
    /// - `TKA_API_QUEUE_DELAY_MS` — delay between queued requests
    /// - `TKA_API_LOCALE` — `id` or `en`
    ///
    /// Unset or empty variables keep their defaults.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tka_portal_client::ClientOptions;
    ///
    /// let options = ClientOptions::from_env().expect("invalid TKA_API_* env vars");
    /// ```
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientOptions::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let mut options = Self::default();
        if let Some(url) = get("TKA_API_BASE_URL") {
            options.base_url = url;
        }
        options.fallback_base_url = get("TKA_API_FALLBACK_URL");
        if let Some(value) = get("TKA_API_TIMEOUT_MS") {
            options.timeout = parse_millis("TKA_API_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("TKA_API_MAX_ATTEMPTS") {
            options.max_attempts = value.parse().map_err(|_| {
                ApiError::Config(format!("TKA_API_MAX_ATTEMPTS must be an integer, got '{value}'"))
            })?;
        }
        if let Some(value) = get("TKA_API_RETRY_BACKOFF_MS") {
            options.backoff = Backoff::Linear {
                base: parse_millis("TKA_API_RETRY_BACKOFF_MS", &value)?,
            };
        }
        if let Some(value) = get("TKA_API_QUEUE_DELAY_MS") {
            options.queue_delay = parse_millis("TKA_API_QUEUE_DELAY_MS", &value)?;
        }
        if let Some(value) = get("TKA_API_LOCALE") {
            options.locale = value
                .parse()
                .map_err(|err| ApiError::Config(format!("TKA_API_LOCALE: {err}")))?;
        }

        options.validate()?;
        Ok(options)
    }

    /// Rejects settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        validate_origin("base_url", &self.base_url)?;
        if let Some(fallback) = &self.fallback_base_url {
            validate_origin("fallback_base_url", fallback)?;
        }
        if self.max_attempts == 0 {
            return Err(ApiError::Config("max_attempts must be at least 1".to_owned()));
        }
        if self.timeout.is_zero() {
            return Err(ApiError::Config("timeout must be greater than zero".to_owned()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff: self.backoff,
            retry_statuses: self.retry_statuses.clone(),
        }
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ApiError::Config(format!("{key} must be milliseconds, got '{value}'")))
}

fn validate_origin(field: &str, url: &str) -> Result<()> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ApiError::Config(format!(
            "{field} must start with http:// or https://, got '{url}'"
        )))
    }
}
