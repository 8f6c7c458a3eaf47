//! Join configuration.

use std::time::Duration;

/// Tunables for one join attempt.
#[derive(Debug, Clone)]
pub struct HookConfig {
    /// How long a freshly addressed day node dwells before announcing
    /// itself, letting the topology settle around the new address.
    pub dwell: Duration,

    /// Upper bound on the wait for promotion acknowledgements. Peers that
    /// never acknowledge do not block promotion past this.
    pub ack_wait: Duration,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            dwell: Duration::from_secs(10),
            ack_wait: Duration::from_secs(5),
        }
    }
}

impl HookConfig {
    /// A config with no dwell and a short ack wait, for tests and local
    /// meshes.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            dwell: Duration::ZERO,
            ack_wait: Duration::from_millis(50),
        }
    }

    /// Set the pre-announcement dwell.
    #[must_use]
    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    /// Set the acknowledgement wait bound.
    #[must_use]
    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }
}
