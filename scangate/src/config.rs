use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://app-staging.apiiro.com";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing {name} environment variable")]
    Missing { name: &'static str },
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}

/// Unwrap a required input, treating an empty or blank value as absent.
pub fn require(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { name }),
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Cadence and budget of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    poll_interval: Duration,
    max_wait: Duration,
    retry_transport_errors: bool,
}

impl PollSettings {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Result<Self, ConfigError> {
        if poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(Self {
            poll_interval,
            max_wait,
            retry_transport_errors: false,
        })
    }

    /// Treat connection failures and per-attempt timeouts as pending instead of fatal.
    pub fn retry_transport_errors(mut self, retry: bool) -> Self {
        self.retry_transport_errors = retry;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn retries_transport_errors(&self) -> bool {
        self.retry_transport_errors
    }

    /// `floor(max_wait / poll_interval)`, saturating at `u32::MAX`.
    pub fn max_attempts(&self) -> u32 {
        let attempts = self.max_wait.as_nanos() / self.poll_interval.as_nanos();
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            retry_transport_errors: false,
        }
    }
}
