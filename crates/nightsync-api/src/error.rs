use thiserror::Error;

use crate::json::ParseError;

/// Top-level error type for the `nightsync-api` crate.
///
/// Covers every way a single device call can fail: the socket, the clock,
/// the HTTP status, and the payload. `nightsync-core` maps these into
/// bus notifications and user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No response arrived before the request deadline; the call was cancelled.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Device ──────────────────────────────────────────────────────
    /// The device answered with a non-success status code.
    #[error("{label}: device answered HTTP {status}")]
    Status { status: u16, label: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The response body failed the JSON parse guard.
    #[error("{0}")]
    Parse(#[from] ParseError),
}

impl Error {
    /// Returns `true` for failures where the device never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }

    /// Returns `true` if the device answered but the payload was unusable.
    pub fn is_payload(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Wrap a `reqwest` failure, folding deadline expiry into [`Error::Timeout`].
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_ms }
        } else {
            Self::Transport(err)
        }
    }
}
