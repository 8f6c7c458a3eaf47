//! Error types for warren-wire.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Result type for warren-wire operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors raised by the wire layer and its collaborator implementations.
#[derive(Debug, Error)]
pub enum WireError {
    /// The peer did not reply within the channel's timeout.
    #[error("request to {peer} timed out")]
    Timeout { peer: Ipv4Addr },

    /// Transport-level failure.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// A payload failed to encode or decode.
    #[error("codec failure: {0}")]
    Codec(#[from] bincode::Error),

    /// The peer answered with a different reply kind than the request asks
    /// for.
    #[error("unexpected reply kind, expected {expected}")]
    UnexpectedReply { expected: &'static str },

    /// A reply failed its bounds checks.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// The neighbor scan could not run.
    #[error("neighbor scan failed: {0}")]
    Scan(String),

    /// The network interface refused the address.
    #[error("device configuration failed: {0}")]
    Device(String),
}
