//! Wire protocol error types.

use thiserror::Error;

/// Errors produced while encoding or decoding Gremlin Server frames.
///
/// A decode failure cannot be attributed to a single request because the
/// request id may itself be unparseable, so the connection layer treats
/// every `GremlinError` coming out of the codec as fatal for the
/// connection that produced it.
#[derive(Error, Debug)]
pub enum GremlinError {
    /// Frame body could not be serialized or parsed as JSON.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame exceeds the configured size limit.
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Observed frame size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Frame violated the protocol in a non-JSON way.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error while reading or writing a frame.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GremlinError {
    /// Protocol error with a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Result alias for wire-level operations.
pub type GremlinResult<T> = Result<T, GremlinError>;
