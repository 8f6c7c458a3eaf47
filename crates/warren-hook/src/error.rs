//! Error types for the join core.
//!
//! Malformed individual replies never appear here: they are bounds-check
//! failures surfaced by the wire layer, logged and skipped per candidate.
//! Only stage-wide exhaustion ends an attempt.

use std::time::Duration;

use thiserror::Error;

/// Result type for join operations.
pub type Result<T> = std::result::Result<T, HookError>;

/// Attempt-ending failures of the join procedure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The neighbor scan found nobody: the node sits in a dead zone.
    #[error("no neighbors found, this is a dead zone")]
    NoNeighbors,

    /// The neighbor scan itself could not run.
    #[error("neighbor scan failed: {0}")]
    ScanFailed(String),

    /// Every candidate was exhausted without one well-formed address offer.
    #[error("no peer offered a usable address slot")]
    NoAddressAvailable,

    /// No candidate supplied an external topology map.
    #[error("no peer supplied an external topology map")]
    NoExternalMap,

    /// No candidate supplied a usable internal topology map. A node cannot
    /// operate without a starting internal view.
    #[error("no peer supplied a usable internal topology map")]
    NoInternalMap,

    /// The network interface refused the negotiated address.
    #[error("interface configuration failed: {0}")]
    Device(String),
}

/// Rehook admission refusals. Returned immediately, with no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RehookError {
    /// Another join attempt holds the gate right now.
    #[error("another join attempt is already in flight")]
    InProgress,

    /// The per-level window is exhausted.
    #[error("rehook rate limit reached, retry in {retry_after:?}")]
    RateLimited {
        /// Time until `window_start + REHOOK_WAIT_TIME(level)`.
        retry_after: Duration,
    },
}
