use std::time::Duration;

use log::warn;
use reqwest::Url;

use crate::settings::LiveSettings;

pub const DEFAULT_DEV_PORT: u16 = 8050;
pub const DEFAULT_DEV_ORIGIN: &str = "http://localhost:8000";
pub const DEFAULT_STREAM_PATH: &str = "/api/events/stream";

/// Tunables for the live-update client, with durations already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConfig {
    /// Origin of the dashboard page, e.g. `https://checkin.example.se`.
    pub origin: Option<String>,
    /// Page port that marks a development setup.
    pub dev_port: u16,
    /// Backend origin used while developing on `dev_port`.
    pub dev_origin: String,
    pub stream_path: String,
    pub startup_delay: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub fallback_interval: Duration,
    pub indicator_retry: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            origin: None,
            dev_port: DEFAULT_DEV_PORT,
            dev_origin: DEFAULT_DEV_ORIGIN.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            startup_delay: Duration::from_millis(1000),
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 10,
            fallback_interval: Duration::from_millis(30_000),
            indicator_retry: Duration::from_millis(500),
        }
    }
}

impl LiveConfig {
    /// Explicit port of the page origin; default ports count as none.
    pub fn page_port(&self) -> Option<u16> {
        self.origin
            .as_deref()
            .and_then(|origin| Url::parse(origin).ok())
            .and_then(|url| url.port())
    }

    /// Stream endpoint: the backend directly when developing, otherwise the
    /// stream path on the page's own origin.
    ///
    /// Without an origin the bare path is returned, which no transport can
    /// open; the client then falls back to polling.
    pub fn endpoint_url(&self) -> String {
        if self.page_port() == Some(self.dev_port) {
            return format!("{}{}", self.dev_origin.trim_end_matches('/'), self.stream_path);
        }

        match self.origin.as_deref().map(Url::parse) {
            Some(Ok(origin)) => origin
                .join(&self.stream_path)
                .map(String::from)
                .unwrap_or_else(|_| self.stream_path.clone()),
            _ => self.stream_path.clone(),
        }
    }
}

impl From<&LiveSettings> for LiveConfig {
    fn from(settings: &LiveSettings) -> Self {
        let defaults = Self::default();
        Self {
            origin: settings.origin.clone(),
            dev_port: settings.dev_port,
            dev_origin: settings.dev_origin.clone(),
            stream_path: settings.stream_path.clone(),
            startup_delay: Duration::from_millis(settings.startup_delay_ms),
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            fallback_interval: non_zero(
                "fallbackIntervalMs",
                settings.fallback_interval_ms,
                defaults.fallback_interval,
            ),
            indicator_retry: non_zero(
                "indicatorRetryMs",
                settings.indicator_retry_ms,
                defaults.indicator_retry,
            ),
        }
    }
}

/// Periodic timers need a non-zero period; zero falls back to the default.
fn non_zero(key: &str, millis: u64, default: Duration) -> Duration {
    if millis == 0 {
        warn!("Ignoring {key} of 0, using {}ms", default.as_millis());
        return default;
    }
    Duration::from_millis(millis)
}
