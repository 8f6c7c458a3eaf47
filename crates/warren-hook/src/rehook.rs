//! Rehook admission control.
//!
//! Rehooking — re-running the whole join procedure on an already hooked
//! node — is disruptive, and more so at higher hierarchy levels where it
//! touches larger portions of the topology. The throttle enforces two
//! rules:
//!
//! 1. At most one join attempt (initial hook or rehook) is in flight at a
//!    time, process-wide. Concurrent requests are rejected immediately,
//!    never queued.
//! 2. Per level, at most [`REHOOK_PER_INSTANCE`] rehooks within
//!    [`rehook_instance_time`]; past that, callers must wait until
//!    [`rehook_wait_time`] after the window started. Both intervals grow
//!    with the level, the wait geometrically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::RehookError;

/// Total rehooks allowed within one instance window.
pub const REHOOK_PER_INSTANCE: u32 = 8;

/// Length of the rehook accounting window at a level:
/// `8 * level * 60` seconds.
pub fn rehook_instance_time(level: u8) -> Duration {
    Duration::from_secs(u64::from(REHOOK_PER_INSTANCE) * u64::from(level) * 60)
}

/// How long an exhausted window blocks further rehooks at a level:
/// `(8 << level) * 60` seconds.
pub fn rehook_wait_time(level: u8) -> Duration {
    let factor = u64::from(REHOOK_PER_INSTANCE)
        .checked_shl(u32::from(level))
        .unwrap_or(u64::MAX);
    Duration::from_secs(factor.saturating_mul(60))
}

/// Accounting for one level's rehook activity.
#[derive(Debug, Clone, Copy)]
struct RehookWindow {
    started: Instant,
    attempts: u32,
}

/// Proof of admission. The underlying gate stays held until the permit is
/// dropped, so hold it for the join attempt's entire duration, not just the
/// accounting step.
#[derive(Debug)]
pub struct JoinPermit {
    _gate: tokio::sync::OwnedMutexGuard<()>,
}

/// Process-wide rehook admission control.
#[derive(Debug)]
pub struct RehookThrottle {
    gate: Arc<tokio::sync::Mutex<()>>,
    windows: Mutex<HashMap<u8, RehookWindow>>,
}

impl Default for RehookThrottle {
    fn default() -> Self {
        Self::new()
    }
}

impl RehookThrottle {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(tokio::sync::Mutex::new(())),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit the very first hook: takes the gate but does no window
    /// accounting, since only *re*-hooks are rate limited.
    pub fn acquire_initial(&self) -> Result<JoinPermit, RehookError> {
        let gate = self
            .gate
            .clone()
            .try_lock_owned()
            .map_err(|_| RehookError::InProgress)?;
        Ok(JoinPermit { _gate: gate })
    }

    /// Admit a rehook at `level`, or refuse with no side effects.
    pub fn admit(&self, level: u8) -> Result<JoinPermit, RehookError> {
        self.admit_at(level, Instant::now())
    }

    /// Admission against an explicit clock reading. [`admit`](Self::admit)
    /// is this at `Instant::now()`; schedulers and tests supply their own.
    pub fn admit_at(&self, level: u8, now: Instant) -> Result<JoinPermit, RehookError> {
        // Reject, don't wait: a rehook arriving while another attempt runs
        // is refused on the spot.
        let gate = self
            .gate
            .clone()
            .try_lock_owned()
            .map_err(|_| RehookError::InProgress)?;

        let mut windows = self.windows.lock().expect("rehook window lock poisoned");
        let window = windows.entry(level).or_insert(RehookWindow {
            started: now,
            attempts: 0,
        });

        if now.duration_since(window.started) > rehook_instance_time(level) {
            debug!(level, "rehook window expired, starting a new one");
            window.started = now;
            window.attempts = 0;
        }

        if window.attempts >= REHOOK_PER_INSTANCE {
            let retry_at = window.started + rehook_wait_time(level);
            return Err(RehookError::RateLimited {
                retry_after: retry_at.saturating_duration_since(now),
            });
        }

        window.attempts += 1;
        debug!(
            level,
            attempts = window.attempts,
            "rehook admitted"
        );
        drop(windows);

        Ok(JoinPermit { _gate: gate })
    }

    /// Attempts recorded in the current window for a level. Diagnostics.
    pub fn attempts_in_window(&self, level: u8) -> u32 {
        self.windows
            .lock()
            .expect("rehook window lock poisoned")
            .get(&level)
            .map_or(0, |w| w.attempts)
    }
}
