// ── Runtime device configuration ──
//
// These types describe how to talk to a NightDriver device and how
// aggressively to poll it. They never touch disk; the CLI builds a
// `ControllerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use nightsync_api::transport::DEFAULT_TIMEOUT;
use nightsync_api::{DeviceAddress, TransportConfig};

/// Fixed delay between attempts of a failed fetch.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

/// How a fetch pipeline behaves after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause before re-issuing the same trigger occurrence.
    pub delay: Duration,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempts` failures.
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

/// Configuration for synchronizing with a single device.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Device selected on start; `None` leaves the controller idle.
    pub device: Option<DeviceAddress>,
    /// Origin the locally hosted device is reached through.
    pub origin: String,
    /// Deadline for each device call.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Effect timing tick.
    pub tick_interval: Duration,
    /// Re-fetch `/effects` on the adaptive cadence.
    pub poll_effects: bool,
    /// Re-fetch `/statistics` every `statsRefreshRate` seconds.
    pub poll_statistics: bool,
    /// Backing file for site and effect preferences. `None` keeps them in memory.
    pub session_path: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            device: Some(DeviceAddress::Current),
            origin: transport.origin,
            request_timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            tick_interval: crate::timing::TICK_INTERVAL,
            poll_effects: true,
            poll_statistics: true,
            session_path: None,
        }
    }
}

impl ControllerConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default()
            .with_timeout(self.request_timeout)
            .with_origin(self.origin.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_is_unbounded() {
        let policy = RetryPolicy::default();
        assert!(policy.allows(0));
        assert!(policy.allows(u32::MAX - 1));
        assert_eq!(policy.delay, Duration::from_millis(3000));
    }

    #[test]
    fn bounded_retry_stops() {
        let policy = RetryPolicy {
            delay: Duration::from_millis(10),
            max_attempts: Some(2),
        };
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
    }
}
