// Shared transport configuration for building reqwest::Client instances.

use std::time::Duration;

/// Every device call is cancelled if no response arrives within this window.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Origin the locally hosted device is reached through.
pub const DEFAULT_ORIGIN: &str = "http://localhost/";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Absolute deadline applied to each request, body included.
    pub timeout: Duration,
    /// Base URL for [`DeviceAddress::Current`](crate::DeviceAddress::Current).
    pub origin: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            origin: DEFAULT_ORIGIN.to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("nightsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(crate::error::Error::Transport)
    }

    /// Timeout in whole milliseconds, as reported in errors.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}
