//! User-facing failures and exit codes.
//!
//! Maps `CoreError` and bus error notices into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use nightsync_config::ConfigError;
use nightsync_core::{CoreError, ErrorNotice};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach device {device}")]
    #[diagnostic(
        code(nightsync::connection_failed),
        help(
            "Check that the controller is powered and on the network.\n\
             Reported: {reason}\n\
             Try: nightsync --address http://<device-ip> effects"
        )
    )]
    ConnectionFailed { device: String, reason: String },

    #[error("No device selected")]
    #[diagnostic(
        code(nightsync::no_device),
        help("Pass --address or --device, or set default_device in the config file.")
    )]
    NoDevice,

    #[error("Device did not answer within {timeout_ms}ms")]
    #[diagnostic(
        code(nightsync::timeout),
        help("Increase the deadline with --timeout-ms or check the device's Wi-Fi signal.")
    )]
    Timeout { timeout_ms: u64 },

    // ── Device ───────────────────────────────────────────────────────
    #[error("{operation} rejected by device (HTTP {status})")]
    #[diagnostic(code(nightsync::rejected))]
    Rejected { operation: String, status: u16 },

    #[error("{operation} failed: {reason}")]
    #[diagnostic(code(nightsync::request_failed))]
    RequestFailed { operation: String, reason: String },

    #[error("Device sent an unusable payload: {message}")]
    #[diagnostic(
        code(nightsync::payload),
        help("The firmware may be older than this client expects.")
    )]
    Payload { message: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(nightsync::not_found),
        help("Run: nightsync {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(nightsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Device profile '{name}' not found in configuration")]
    #[diagnostic(
        code(nightsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Add one under [devices.{name}] in {path}"
        )
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(nightsync::config))]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    #[diagnostic(code(nightsync::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(nightsync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NoDevice => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Turn the first `Error` bus notice seen during a command into a
    /// failure for `device`.
    pub fn from_notice(device: &str, notice: &ErrorNotice) -> Self {
        if notice.kind == "JSON" {
            return Self::Payload {
                message: format!("{}: {}", notice.target, notice.notification),
            };
        }
        Self::ConnectionFailed {
            device: device.into(),
            reason: notice.to_string(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoDeviceSelected => CliError::NoDevice,

            CoreError::DeviceUnreachable { reason } => CliError::ConnectionFailed {
                device: "(selected device)".into(),
                reason,
            },

            CoreError::Timeout { timeout_ms } => CliError::Timeout { timeout_ms },

            CoreError::Rejected { operation, status } => CliError::Rejected { operation, status },

            CoreError::RequestFailed { operation } => CliError::RequestFailed {
                operation,
                reason: "no response from device".into(),
            },

            CoreError::Payload { message } => CliError::Payload { message },

            CoreError::InvalidValue { field, reason } => CliError::Validation { field, reason },

            CoreError::Config { message } => CliError::Validation {
                field: "address".into(),
                reason: message,
            },

            other @ (CoreError::UnknownStore { .. }
            | CoreError::OutOfScope { .. }
            | CoreError::TypeMismatch { .. }
            | CoreError::ReadOnly { .. }
            | CoreError::Storage { .. }) => CliError::Internal(other.to_string()),
        }
    }
}
