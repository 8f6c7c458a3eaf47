//! The daemon: join orchestration and operator surface.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use warren_hook::{
    HookError, Hooker, LocalIdentity, RehookError, RehookThrottle,
};
use warren_map::{ExternalMap, InternalMap};

use crate::{serve, BootstrapRadar, Device, NodeConfig, UdpMesh};

/// State installed by a completed, successful join attempt.
#[derive(Debug, Clone)]
pub struct HookedState {
    pub identity: LocalIdentity,
    pub internal: InternalMap,
    pub external: ExternalMap,
}

/// Process-wide node state. `hooked` flips from `None` exactly when a join
/// attempt completes; in-progress attempts are never visible here.
#[derive(Debug, Default)]
pub struct NodeState {
    pub hooked: Option<HookedState>,
}

/// Errors surfaced by the operator interface.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The throttle refused admission; no attempt ran.
    #[error(transparent)]
    Rehook(#[from] RehookError),
    /// An admitted attempt ran and failed.
    #[error(transparent)]
    Hook(#[from] HookError),
}

/// A Warren node instance.
pub struct WarrenNode {
    config: NodeConfig,
    mesh: UdpMesh,
    device: Device,
    state: Arc<RwLock<NodeState>>,
    throttle: RehookThrottle,
}

impl WarrenNode {
    /// Bind the transport and assemble an unhooked node.
    pub async fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let mesh = UdpMesh::bind(config.bind, config.mesh_port, config.rpc_timeout).await?;
        let device = match &config.device {
            Some(dev) => Device::Iface(dev.clone()),
            None => Device::Null,
        };
        Ok(Self {
            config,
            mesh,
            device,
            state: Arc::new(RwLock::new(NodeState::default())),
            throttle: RehookThrottle::new(),
        })
    }

    /// Shared node state (responder, diagnostics).
    pub fn state(&self) -> Arc<RwLock<NodeState>> {
        Arc::clone(&self.state)
    }

    /// Run the initial hook. Holds the attempt gate but does no rate
    /// accounting: only *re*-hooks are rate limited.
    pub async fn run_join(&self) -> Result<(), NodeError> {
        let _permit = self.throttle.acquire_initial().map_err(NodeError::Rehook)?;
        Ok(self.attempt().await?)
    }

    /// Request a rehook at a hierarchy level.
    ///
    /// Refused immediately — with no side effects — when another attempt is
    /// in flight or the level's window is exhausted; otherwise the attempt
    /// runs to completion while the admission permit is held.
    pub async fn request_rehook(&self, level: u8) -> Result<(), NodeError> {
        let _permit = self.throttle.admit(level)?;
        Ok(self.attempt().await?)
    }

    async fn attempt(&self) -> warren_hook::Result<()> {
        let radar = BootstrapRadar::new(self.config.bootstrap_peers.clone(), self.mesh.clone());
        let mut hooker = Hooker::new(
            radar,
            self.mesh.clone(),
            self.mesh.clone(),
            self.device.clone(),
            self.config.hook.clone(),
        );
        let report = hooker.run_join().await?;

        // Only a completed, successful attempt becomes visible to the
        // responder and the routing consumers.
        let mut state = self.state.write().await;
        state.hooked = Some(HookedState {
            identity: report.identity,
            internal: report.internal,
            external: report.external,
        });
        Ok(())
    }

    /// Serve forever: responder task, initial hook, then operator signals
    /// (SIGHUP requests a level-1 rehook).
    pub async fn run(self) -> anyhow::Result<()> {
        let responder = tokio::spawn(serve(
            self.mesh.socket(),
            Arc::clone(&self.state),
            self.mesh.ack_sink(),
        ));

        if let Err(err) = self.run_join().await {
            responder.abort();
            // An unhooked node cannot route; dying here is the caller's
            // documented option and the daemon takes it.
            anyhow::bail!("initial hook failed: {err}");
        }

        let mut rehook_signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;
        loop {
            tokio::select! {
                _ = rehook_signal.recv() => {
                    info!("operator requested rehook");
                    match self.request_rehook(1).await {
                        Ok(()) => info!("rehook complete"),
                        Err(err) => warn!(%err, "rehook refused or failed"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    break;
                }
            }
        }

        responder.abort();
        Ok(())
    }
}
