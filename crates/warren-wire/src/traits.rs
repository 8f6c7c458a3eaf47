//! Collaborator seams the join core is driven through.
//!
//! Each trait stands in for a subsystem the join procedure consumes but does
//! not own: the neighbor radar, the request/response channel, local
//! broadcast, and interface configuration. The daemon provides network-backed
//! implementations; tests drive the core with scripted fakes.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::{Announcement, Reply, Request, Result};

/// A reachable peer produced by the neighbor scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCandidate {
    /// The peer's mesh address.
    pub addr: Ipv4Addr,
    /// Measured round-trip time; the scan orders candidates by it,
    /// best first.
    pub rtt: Duration,
}

/// Active neighbor discovery.
#[allow(async_fn_in_trait)]
pub trait Discovery {
    /// Scan for reachable peers, ordered by ascending round-trip time.
    ///
    /// An empty result means the node is isolated (a "dead zone").
    async fn scan(&self) -> Result<Vec<PeerCandidate>>;
}

/// Synchronous request/response exchange with one peer.
///
/// Blocks the caller until a reply arrives or the implementation's timeout
/// expires. The join procedure never has more than one request in flight.
#[allow(async_fn_in_trait)]
pub trait RpcChannel {
    async fn request(&self, peer: Ipv4Addr, request: Request) -> Result<Reply>;
}

/// Fire-and-forget broadcasts plus promotion acknowledgements.
#[allow(async_fn_in_trait)]
pub trait Broadcast {
    /// Broadcast to the directly linked peers.
    async fn announce(&self, announcement: Announcement) -> Result<()>;

    /// Wait up to `wait` for promotion acknowledgements, returning how many
    /// arrived. Never waits past the deadline: unresponsive peers must not
    /// block promotion.
    async fn collect_acks(&self, expected: usize, wait: Duration) -> usize;

    /// Advertise to the wider network.
    async fn advertise(&self, announcement: Announcement) -> Result<()>;
}

/// Local network interface configuration.
pub trait DeviceConfig {
    /// Assign an address to the mesh interface.
    fn set_interface_address(&self, addr: Ipv4Addr) -> Result<()>;
}
