/*
[INPUT]:  Error sources (HTTP, WebSocket, parsing, subscriber callbacks)
[OUTPUT]: Structured error types with context
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use std::time::Duration;

use thiserror::Error;

/// Main error type for the Hyperliquid feed crate.
#[derive(Error, Debug)]
pub enum HyperliquidError {
    /// Network-level failure: connect refused, broken pipe, request timeout,
    /// abnormal WebSocket close.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success status.
    #[error("remote error (status {status}): {body}")]
    Remote { status: u16, body: String },

    /// Malformed inbound frame; the frame is dropped and processing continues.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A subscriber callback failed or panicked; delivery to other
    /// subscribers is unaffected.
    #[error("subscriber callback error: {0}")]
    Callback(String),

    /// Serialization/deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The WebSocket handshake did not complete in time.
    #[error("connection timeout after {duration:?}")]
    ConnectTimeout { duration: Duration },

    /// All reconnection attempts were used up; the caller must call
    /// `connect()` again to resume.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },
}

impl From<reqwest::Error> for HyperliquidError {
    fn from(err: reqwest::Error) -> Self {
        HyperliquidError::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for HyperliquidError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        HyperliquidError::Transport(err.to_string())
    }
}

impl HyperliquidError {
    /// True for errors handled locally (logged and skipped) without tearing
    /// down the connection or surfacing to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HyperliquidError::Protocol(_) | HyperliquidError::Callback(_)
        )
    }

    /// True for network-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HyperliquidError::Transport(_) | HyperliquidError::ConnectTimeout { .. }
        )
    }

    /// HTTP status for remote rejections.
    pub fn status(&self) -> Option<u16> {
        match self {
            HyperliquidError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for feed operations
pub type Result<T> = std::result::Result<T, HyperliquidError>;
