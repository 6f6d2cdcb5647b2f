// ── Core error types ──
//
// User-facing errors from nightsync-core. Transport details are folded
// into a handful of variants; the `Error` bus channel carries the raw
// cause for notification sinks.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("No device selected")]
    NoDeviceSelected,

    #[error("Cannot reach device: {reason}")]
    DeviceUnreachable { reason: String },

    #[error("Device did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Device errors ────────────────────────────────────────────────
    #[error("{operation} rejected by device (HTTP {status})")]
    Rejected { operation: String, status: u16 },

    #[error("{operation} failed")]
    RequestFailed { operation: String },

    #[error("Unusable payload: {message}")]
    Payload { message: String },

    // ── Store errors ─────────────────────────────────────────────────
    #[error("Unknown store: {name}")]
    UnknownStore { name: String },

    #[error("Store {name} is not in this facade's scope")]
    OutOfScope { name: String },

    #[error("Store {name} holds a different value type")]
    TypeMismatch { name: String },

    #[error("Store {name} is read-only")]
    ReadOnly { name: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    // ── Persistence / configuration ──────────────────────────────────
    #[error("Session storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<nightsync_api::Error> for CoreError {
    fn from(err: nightsync_api::Error) -> Self {
        match err {
            nightsync_api::Error::Transport(e) => CoreError::DeviceUnreachable {
                reason: e.to_string(),
            },
            nightsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid device address: {e}"),
            },
            nightsync_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            nightsync_api::Error::Status { status, label } => CoreError::Rejected {
                operation: label,
                status,
            },
            nightsync_api::Error::Parse(e) => CoreError::Payload {
                message: e.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Payload {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_keeps_budget() {
        let core: CoreError = nightsync_api::Error::Timeout { timeout_ms: 3000 }.into();
        assert!(matches!(core, CoreError::Timeout { timeout_ms: 3000 }));
    }

    #[test]
    fn status_becomes_rejection() {
        let core: CoreError = nightsync_api::Error::Status {
            status: 404,
            label: "navigate".into(),
        }
        .into();
        assert_eq!(core.to_string(), "navigate rejected by device (HTTP 404)");
    }
}
