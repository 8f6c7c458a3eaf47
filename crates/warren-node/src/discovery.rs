//! Bootstrap-peer radar.
//!
//! A production node discovers neighbors with an active link-level scan;
//! this daemon stands that subsystem in with a probe over the configured
//! bootstrap peers: each is asked for its external map, unreachable peers
//! are dropped, and the survivors are ordered by measured round-trip time,
//! best first — the ordering every join stage consumes.

use std::net::Ipv4Addr;

use tracing::debug;
use warren_wire::{Discovery, PeerCandidate, Request, RpcChannel};

/// Probes configured bootstrap peers and ranks them by responsiveness.
#[derive(Debug, Clone)]
pub struct BootstrapRadar<C> {
    peers: Vec<Ipv4Addr>,
    channel: C,
}

impl<C: RpcChannel> BootstrapRadar<C> {
    pub fn new(peers: Vec<Ipv4Addr>, channel: C) -> Self {
        Self { peers, channel }
    }
}

impl<C: RpcChannel> Discovery for BootstrapRadar<C> {
    async fn scan(&self) -> warren_wire::Result<Vec<PeerCandidate>> {
        let mut found = Vec::new();
        for &addr in &self.peers {
            let start = tokio::time::Instant::now();
            match self.channel.request(addr, Request::ExternalMap).await {
                Ok(_) => found.push(PeerCandidate {
                    addr,
                    rtt: start.elapsed(),
                }),
                Err(err) => {
                    debug!(peer = %addr, %err, "bootstrap peer unreachable, dropped from scan");
                }
            }
        }
        found.sort_by_key(|c| c.rtt);
        Ok(found)
    }
}
