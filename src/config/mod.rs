use crate::error::TilerError;
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.cesium.com/v1";
pub const DEFAULT_UPLOAD_REGION: &str = "us-east-1";

/// How a polling stage waits for a remote status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between consecutive polls (default: 5s)
    pub interval: Duration,

    /// Give up after this many polls (default: unbounded)
    pub max_attempts: Option<u32>,

    /// Give up after this much wall time (default: unbounded)
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: None,
            timeout: None,
        }
    }
}

impl PollPolicy {
    /// Poll back to back with no limits. Test doubles answer instantly.
    pub fn immediate() -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts: None,
            timeout: None,
        }
    }
}

/// Run-wide configuration, read once at startup.
#[derive(Clone)]
pub struct TilerConfig {
    /// Bearer token for the tiling API (required)
    pub auth_token: String,

    /// API base URL (default: https://api.cesium.com/v1)
    pub api_base_url: String,

    /// Region of the upload bucket (default: "us-east-1")
    pub upload_region: String,

    /// Object storage endpoint override, path-style addressing (default: none)
    pub upload_endpoint: Option<String>,

    /// Per-request HTTP timeout (default: 300s)
    pub request_timeout: Duration,

    pub poll: PollPolicy,
}

impl fmt::Debug for TilerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TilerConfig")
            .field("auth_token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("upload_region", &self.upload_region)
            .field("upload_endpoint", &self.upload_endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("poll", &self.poll)
            .finish()
    }
}

impl TilerConfig {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            api_base_url: DEFAULT_API_URL.to_string(),
            upload_region: DEFAULT_UPLOAD_REGION.to_string(),
            upload_endpoint: None,
            request_timeout: Duration::from_secs(300),
            poll: PollPolicy::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, TilerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TilerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let auth_token = get("CESIUM_AUTH_TOKEN").ok_or_else(|| {
            TilerError::Configuration("CESIUM_AUTH_TOKEN must be set".to_string())
        })?;

        let mut config = Self::new(auth_token);

        if let Some(url) = get("CESIUM_API_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(region) = get("CESIUM_UPLOAD_REGION") {
            config.upload_region = region;
        }
        config.upload_endpoint = get("CESIUM_UPLOAD_ENDPOINT");

        if let Some(secs) = parse_number::<u64>(
            "TILER_REQUEST_TIMEOUT_SECS",
            get("TILER_REQUEST_TIMEOUT_SECS"),
        )? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_number::<u64>(
            "TILER_POLL_INTERVAL_SECS",
            get("TILER_POLL_INTERVAL_SECS"),
        )? {
            config.poll.interval = Duration::from_secs(secs);
        }
        // 0 keeps polling unbounded
        if let Some(secs) = parse_number::<u64>(
            "TILER_POLL_TIMEOUT_SECS",
            get("TILER_POLL_TIMEOUT_SECS"),
        )? {
            config.poll.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(attempts) = parse_number::<u32>(
            "TILER_POLL_MAX_ATTEMPTS",
            get("TILER_POLL_MAX_ATTEMPTS"),
        )? {
            config.poll.max_attempts = (attempts > 0).then_some(attempts);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TilerError> {
        if self.auth_token.trim().is_empty() {
            return Err(TilerError::Configuration(
                "auth token must not be empty".to_string(),
            ));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(TilerError::Configuration(format!(
                "API URL must be http(s), got {}",
                self.api_base_url
            )));
        }
        if self.upload_region.is_empty() {
            return Err(TilerError::Configuration(
                "upload region must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
) -> Result<Option<T>, TilerError> {
    match raw {
        None => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| {
            TilerError::Configuration(format!("{key} must be a non-negative integer, got {v:?}"))
        }),
    }
}
