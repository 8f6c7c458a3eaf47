//! Daemon configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use warren_hook::HookConfig;

/// Configuration for a Warren node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the mesh service socket binds to.
    pub bind: SocketAddr,

    /// UDP port every mesh node serves the join protocol on.
    pub mesh_port: u16,

    /// Bootstrap peers probed by the radar when no topology exists yet.
    pub bootstrap_peers: Vec<Ipv4Addr>,

    /// Network interface to assign the negotiated address to.
    /// `None` leaves the system untouched (dry runs, tests).
    pub device: Option<String>,

    /// Per-request reply timeout.
    pub rpc_timeout: Duration,

    /// Join tunables (dwell, ack wait).
    pub hook: HookConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let mesh_port = std::env::var("WARREN_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(9707);

        let bind = std::env::var("WARREN_BIND")
            .ok()
            .and_then(|b| b.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], mesh_port)));

        let bootstrap_peers = std::env::var("WARREN_BOOTSTRAP_PEERS")
            .map(|s| {
                s.split(',')
                    .filter_map(|p| p.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        let device = std::env::var("WARREN_DEV").ok().filter(|d| !d.is_empty());

        let rpc_timeout = std::env::var("WARREN_RPC_TIMEOUT_MS")
            .ok()
            .and_then(|t| t.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(3));

        let mut hook = HookConfig::default();
        if let Some(dwell) = std::env::var("WARREN_DWELL_SECS")
            .ok()
            .and_then(|d| d.parse().ok())
        {
            hook = hook.with_dwell(Duration::from_secs(dwell));
        }
        if let Some(ack_wait) = std::env::var("WARREN_ACK_WAIT_SECS")
            .ok()
            .and_then(|d| d.parse().ok())
        {
            hook = hook.with_ack_wait(Duration::from_secs(ack_wait));
        }

        Self {
            bind,
            mesh_port,
            bootstrap_peers,
            device,
            rpc_timeout,
            hook,
        }
    }
}
