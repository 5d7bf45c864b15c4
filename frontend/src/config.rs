// frontend/src/config.rs

use crate::error::{ClientError, Result};
use crate::persist::{BASE_URL_KEY, Storage};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Delay between a telemetry loss and the single reconnect attempt it triggers.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Cap for the opt-in backoff policy.
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

// ---------- Base URL ----------

/// Server origin, `scheme://host[:port]` with no path and no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    origin: String,
}

impl BaseUrl {
    /// Accepts `http(s)://` or `ws(s)://` origins, or a bare `host[:port]`
    /// (taken as plain http). Any path, query or fragment is dropped.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClientError::InvalidBaseUrl("empty url".to_string()));
        }
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{raw}: {e}")))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "http",
            "https" | "wss" => "https",
            other => {
                return Err(ClientError::InvalidBaseUrl(format!(
                    "{raw}: unsupported scheme '{other}'"
                )));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ClientError::InvalidBaseUrl(format!("{raw}: missing host")))?;

        let origin = match url.port() {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        };
        Ok(Self { origin })
    }

    pub fn as_str(&self) -> &str {
        &self.origin
    }

    /// Absolute http(s) URL for an API path.
    pub fn http(&self, path: &str) -> String {
        join_path(&self.origin, path)
    }

    /// Absolute ws(s) URL for a streaming path.
    pub fn ws(&self, path: &str) -> String {
        let ws_origin = if let Some(rest) = self.origin.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.origin.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.origin.clone()
        };
        join_path(&ws_origin, path)
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.origin)
    }
}

fn join_path(origin: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{origin}{path}")
    } else {
        format!("{origin}/{path}")
    }
}

// ---------- Reconnect policy ----------

/// What the telemetry channel does after losing its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// One attempt after the same delay every time, forever.
    Fixed(Duration),
    /// Doubling delay from `initial` up to `max`, reset after a successful connect.
    Backoff { initial: Duration, max: Duration },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed(RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    pub fn hardened() -> Self {
        ReconnectPolicy::Backoff {
            initial: RECONNECT_DELAY,
            max: MAX_BACKOFF,
        }
    }

    /// Delay before the next attempt. `consecutive_losses` counts losses since
    /// the last successful connect and starts at 1.
    pub fn delay(&self, consecutive_losses: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Backoff { initial, max } => {
                let shift = consecutive_losses.saturating_sub(1).min(16);
                initial.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

// ---------- Client config ----------

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: BaseUrl,
    pub reconnect: ReconnectPolicy,
    /// `None` keeps uploads unbounded.
    pub upload_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: BaseUrl) -> Self {
        Self {
            base_url,
            reconnect: ReconnectPolicy::default(),
            upload_timeout: None,
        }
    }

    /// Picks the base URL: explicit value, then the persisted one, then the default.
    pub fn resolve(explicit: Option<&str>, storage: &Storage) -> Result<Self> {
        let raw = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(url) => url.to_string(),
            None => storage
                .get_string(BASE_URL_KEY)?
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };
        Ok(Self::new(BaseUrl::parse(&raw)?))
    }

    pub fn with_backoff(mut self, enabled: bool) -> Self {
        if enabled {
            self.reconnect = ReconnectPolicy::hardened();
        }
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upload_timeout = timeout;
        self
    }
}
