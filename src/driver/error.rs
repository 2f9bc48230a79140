//! Driver error taxonomy.
//!
//! Four kinds of failure flow through the driver: transport errors (which
//! feed the retry loop), protocol errors surfaced by the server status
//! code, input errors caught before any I/O, and control errors such as
//! cancellation or a closed pool.

use thiserror::Error;

use crate::gremlin::error::GremlinError;
use crate::gremlin::message::error_message;

/// Errors surfaced to callers of the driver.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The connection was never established or has been torn down.
    #[error("Not connected")]
    NotConnected,

    /// The connection closed while the request was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The pool has been closed; no further leases are possible.
    #[error("Pool is closed")]
    PoolClosed,

    /// Pool construction or refill failed.
    #[error("Pool error: {0}")]
    Pool(String),

    /// A query argument contained a character outside the allowlist.
    #[error("Invalid character in query argument: {0}")]
    InvalidArg(String),

    /// The query template and arguments do not line up.
    #[error("Query format error: {0}")]
    QueryFormat(String),

    /// The retry budget was exhausted.
    #[error("Max retries reached after {attempts} attempts, last error: {last}")]
    MaxRetries {
        /// Attempts made before giving up.
        attempts: u32,
        /// Message of the last underlying failure.
        last: String,
    },

    /// The caller cancelled the request.
    #[error("Operation cancelled")]
    Cancelled,

    /// Terminal error status from the server, message per the fixed table.
    #[error("{message}")]
    Server {
        /// Response status code.
        code: u16,
        /// Mapped caller-facing message.
        message: String,
    },

    /// Terminal error status outside the known table.
    #[error("An unknown error occurred")]
    Unknown {
        /// Response status code.
        code: u16,
    },

    /// A timeout elapsed (handshake, read deadline, write deadline).
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Lock client failure.
    #[error("Lock error: {0}")]
    Lock(String),

    /// Invalid driver configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Frame encode/decode failure.
    #[error("Wire error: {0}")]
    Wire(#[from] GremlinError),

    /// WebSocket transport failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Underlying socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Timeout error with a message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Pool error with a message.
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// Lock error with a message.
    pub fn lock(msg: impl Into<String>) -> Self {
        Self::Lock(msg.into())
    }

    /// Configuration error with a message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Invalid-argument error naming the offending value.
    pub fn invalid_arg(arg: impl Into<String>) -> Self {
        Self::InvalidArg(arg.into())
    }

    /// Map a terminal error status code through the fixed message table.
    pub fn from_status(code: u16) -> Self {
        match error_message(code) {
            Some(message) => Self::Server {
                code,
                message: message.to_string(),
            },
            None => Self::Unknown { code },
        }
    }

    /// Whether the retry loop should treat this as a transport failure
    /// worth another attempt. Protocol and input errors are not.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionClosed
                | Self::Timeout(_)
                | Self::WebSocket(_)
                | Self::Io(_)
        )
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Wire(GremlinError::Json(err))
    }
}

/// Result alias used across the driver.
pub type DriverResult<T> = Result<T, DriverError>;
