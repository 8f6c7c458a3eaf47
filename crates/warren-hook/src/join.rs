//! The join state machine.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use warren_map::{ExternalMap, InternalMap, Link, MAX_NEIGHBOR_LINKS};
use warren_wire::{Broadcast, DeviceConfig, Discovery, RpcChannel};

use crate::{
    fetch_external, fetch_internal, negotiate_address, promote, HookConfig, HookError,
    LocalIdentity, Result,
};

/// Where a join attempt currently stands.
///
/// `Failed` is absorbing for the attempt; whether and when to start a new
/// attempt from `Idle` is the caller's decision — there is no retry loop in
/// the machine itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinState {
    Idle,
    Scanning,
    NegotiatingAddress,
    FetchingTopology,
    Promoting,
    Active,
    Failed(HookError),
}

impl std::fmt::Display for JoinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::NegotiatingAddress => write!(f, "NegotiatingAddress"),
            Self::FetchingTopology => write!(f, "FetchingTopology"),
            Self::Promoting => write!(f, "Promoting"),
            Self::Active => write!(f, "Active"),
            Self::Failed(err) => write!(f, "Failed({err})"),
        }
    }
}

/// Everything a completed attempt produced. The caller installs this as the
/// process-wide node state; nothing earlier in the attempt is visible
/// outside it, so a failed attempt leaves no partial state behind.
#[derive(Debug, Clone)]
pub struct JoinReport {
    pub identity: LocalIdentity,
    pub internal: InternalMap,
    pub external: ExternalMap,
    /// Internal-map snapshots merged, for diagnostics.
    pub merged_snapshots: usize,
    /// Promotion acknowledgements received.
    pub acks: usize,
}

/// Drives one join attempt end to end.
pub struct Hooker<D, C, B, V> {
    discovery: D,
    channel: C,
    broadcast: B,
    device: V,
    config: HookConfig,
    rng: StdRng,
    state: JoinState,
}

impl<D, C, B, V> Hooker<D, C, B, V>
where
    D: Discovery,
    C: RpcChannel,
    B: Broadcast,
    V: DeviceConfig,
{
    pub fn new(discovery: D, channel: C, broadcast: B, device: V, config: HookConfig) -> Self {
        Self::with_rng(
            discovery,
            channel,
            broadcast,
            device,
            config,
            StdRng::from_entropy(),
        )
    }

    /// Like [`new`](Self::new) with an explicit RNG, so tests can pin the
    /// slot choice.
    pub fn with_rng(
        discovery: D,
        channel: C,
        broadcast: B,
        device: V,
        config: HookConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            discovery,
            channel,
            broadcast,
            device,
            config,
            rng,
            state: JoinState::Idle,
        }
    }

    /// The machine's current state.
    #[must_use]
    pub fn state(&self) -> &JoinState {
        &self.state
    }

    /// Run one join attempt from `Idle` through to `Active`.
    ///
    /// Every stage failure ends the attempt: the machine lands in
    /// `Failed(reason)` and the error is returned once. Calling again starts
    /// a fresh attempt.
    pub async fn run_join(&mut self) -> Result<JoinReport> {
        let result = self.attempt().await;
        match &result {
            Ok(report) => {
                info!(
                    addr = %report.identity.addr,
                    group = %report.identity.group,
                    merged = report.merged_snapshots,
                    "join complete, node is stable"
                );
            }
            Err(err) => {
                warn!(%err, "join attempt failed");
                self.state = JoinState::Failed(err.clone());
            }
        }
        result
    }

    async fn attempt(&mut self) -> Result<JoinReport> {
        self.state = JoinState::Scanning;
        debug!("join begins, scanning the area");
        let candidates = self
            .discovery
            .scan()
            .await
            .map_err(|err| HookError::ScanFailed(err.to_string()))?;
        if candidates.is_empty() {
            return Err(HookError::NoNeighbors);
        }
        debug!(count = candidates.len(), "scan found candidates");

        self.state = JoinState::NegotiatingAddress;
        let identity = negotiate_address(&self.channel, &candidates, &mut self.rng).await?;
        self.device
            .set_interface_address(identity.addr)
            .map_err(|err| HookError::Device(err.to_string()))?;

        self.state = JoinState::FetchingTopology;
        let external_snapshot = fetch_external(&self.channel, &candidates).await?;
        let external = ExternalMap::adopt(identity.group, external_snapshot);

        let mut internal = InternalMap::new(identity.group, identity.base);
        // The scanned neighbors inside our group become the day node's links.
        let links: Vec<Link> = candidates
            .iter()
            .filter_map(|c| {
                identity.base.slot_of(c.addr).map(|to| Link {
                    to,
                    rtt_ms: c.rtt.as_millis() as u32,
                })
            })
            .take(MAX_NEIGHBOR_LINKS)
            .collect();
        internal.set_local(identity.slot, links);

        let merged_snapshots = fetch_internal(&self.channel, &candidates, &mut internal).await?;

        self.state = JoinState::Promoting;
        let linked_peers = internal.record(identity.slot).links.len();
        let occupied = internal.occupied_count() as u16;
        // The candidate list only existed to bootstrap before a real
        // topology did; the merged map supersedes it.
        drop(candidates);

        let promotion = promote(
            &self.broadcast,
            &self.config,
            &identity,
            linked_peers,
            occupied,
        )
        .await;
        internal.promote_local();

        self.state = JoinState::Active;
        Ok(JoinReport {
            identity,
            internal,
            external,
            merged_snapshots,
            acks: promotion.acks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::time::Duration;
    use warren_map::{
        GroupAddr, GroupId, GroupRecord, InternalSnapshot, SlotId, SlotRecord, MAX_NEIGHBOR_LINKS,
    };
    use warren_wire::{
        AddressOffer, Announcement, ExternalSnapshot as ExtSnap, OfferReply, PeerCandidate, Reply,
        Request, WireError,
    };

    fn peer(last_octet: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last_octet)
    }

    fn slot(raw: usize) -> SlotId {
        SlotId::new(raw).unwrap()
    }

    fn base() -> GroupAddr {
        GroupAddr::new(Ipv4Addr::new(10, 0, 0, 0))
    }

    /// A scripted mesh neighborhood: per-peer canned replies per request
    /// kind, a candidate list, and a record of what happened.
    #[derive(Default)]
    struct FakeMesh {
        candidates: Vec<PeerCandidate>,
        offers: HashMap<Ipv4Addr, Reply>,
        internals: HashMap<Ipv4Addr, Reply>,
        externals: HashMap<Ipv4Addr, Reply>,
        announced: Mutex<Vec<Announcement>>,
        configured: Mutex<Vec<Ipv4Addr>>,
        acks_to_deliver: usize,
    }

    impl FakeMesh {
        fn with_peers(peers: &[u8]) -> Self {
            Self {
                candidates: peers
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| PeerCandidate {
                        addr: peer(p),
                        rtt: Duration::from_millis(i as u64 + 1),
                    })
                    .collect(),
                ..Default::default()
            }
        }

        fn offer(mut self, from: u8, slots: &[usize]) -> Self {
            self.offers.insert(
                peer(from),
                Reply::FreeSlots(OfferReply::Offer(AddressOffer {
                    group: GroupId(1),
                    base: base(),
                    slots: slots.iter().map(|&s| slot(s)).collect(),
                })),
            );
            self
        }

        fn internal(mut self, from: u8, occupied: &[usize]) -> Self {
            self.internals.insert(
                peer(from),
                Reply::InternalMap(InternalSnapshot {
                    root: slot(from as usize),
                    slots: occupied
                        .iter()
                        .map(|&i| (slot(i), SlotRecord::occupied(Vec::new())))
                        .collect(),
                }),
            );
            self
        }

        fn internal_oversized(mut self, from: u8) -> Self {
            self.internals.insert(
                peer(from),
                Reply::InternalMap(InternalSnapshot {
                    root: slot(from as usize),
                    slots: vec![(
                        slot(0),
                        SlotRecord::occupied(vec![
                            warren_map::Link {
                                to: slot(0),
                                rtt_ms: 1
                            };
                            MAX_NEIGHBOR_LINKS + 1
                        ]),
                    )],
                }),
            );
            self
        }

        fn external(mut self, from: u8) -> Self {
            self.externals.insert(
                peer(from),
                Reply::ExternalMap(ExtSnap {
                    own: GroupId(1),
                    groups: vec![GroupRecord {
                        id: GroupId(1),
                        base: base(),
                        occupied: 2,
                    }],
                }),
            );
            self
        }
    }

    impl Discovery for &FakeMesh {
        async fn scan(&self) -> warren_wire::Result<Vec<PeerCandidate>> {
            Ok(self.candidates.clone())
        }
    }

    impl RpcChannel for &FakeMesh {
        async fn request(&self, to: Ipv4Addr, request: Request) -> warren_wire::Result<Reply> {
            let table = match request {
                Request::FreeSlots => &self.offers,
                Request::InternalMap => &self.internals,
                Request::ExternalMap => &self.externals,
            };
            table
                .get(&to)
                .cloned()
                .ok_or(WireError::Timeout { peer: to })
        }
    }

    impl Broadcast for &FakeMesh {
        async fn announce(&self, announcement: Announcement) -> warren_wire::Result<()> {
            self.announced.lock().unwrap().push(announcement);
            Ok(())
        }

        async fn collect_acks(&self, expected: usize, _wait: Duration) -> usize {
            self.acks_to_deliver.min(expected)
        }

        async fn advertise(&self, announcement: Announcement) -> warren_wire::Result<()> {
            self.announced.lock().unwrap().push(announcement);
            Ok(())
        }
    }

    impl DeviceConfig for &FakeMesh {
        fn set_interface_address(&self, addr: Ipv4Addr) -> warren_wire::Result<()> {
            self.configured.lock().unwrap().push(addr);
            Ok(())
        }
    }

    fn hooker(mesh: &FakeMesh) -> Hooker<&FakeMesh, &FakeMesh, &FakeMesh, &FakeMesh> {
        Hooker::with_rng(
            mesh,
            mesh,
            mesh,
            mesh,
            HookConfig::fast(),
            StdRng::seed_from_u64(0),
        )
    }

    #[tokio::test]
    async fn empty_scan_fails_with_no_neighbors() {
        let mesh = FakeMesh::with_peers(&[]);
        let mut machine = hooker(&mesh);

        let err = machine.run_join().await.unwrap_err();
        assert_eq!(err, HookError::NoNeighbors);
        assert_eq!(*machine.state(), JoinState::Failed(HookError::NoNeighbors));
        // No identity was ever applied.
        assert!(mesh.configured.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_join_reaches_active() {
        let mesh = FakeMesh::with_peers(&[1, 2, 3])
            .offer(1, &[40, 41, 42])
            .external(1)
            .internal(1, &[1, 2])
            .internal_oversized(2)
            .internal(3, &[3]);
        let mut mesh = mesh;
        mesh.acks_to_deliver = 3;
        let mut machine = hooker(&mesh);

        let report = machine.run_join().await.unwrap();

        assert_eq!(*machine.state(), JoinState::Active);
        // Candidate 2's oversized reply was rejected: two snapshots merged.
        assert_eq!(report.merged_snapshots, 2);
        assert!([40usize, 41, 42].contains(&report.identity.slot.index()));
        assert_eq!(
            report.identity.addr,
            base().slot_addr(report.identity.slot)
        );
        // The interface got the provisional address during the attempt.
        assert_eq!(
            mesh.configured.lock().unwrap().as_slice(),
            &[report.identity.addr]
        );
        // The local slot ended up stable, not provisional.
        assert!(!report.internal.local_is_provisional());
        // Stable-node announcement then topology advertisement.
        let announced = mesh.announced.lock().unwrap();
        assert!(matches!(announced[0], Announcement::StableNode { .. }));
        assert!(matches!(announced[1], Announcement::Topology { .. }));
    }

    #[tokio::test]
    async fn missing_external_map_fails_attempt() {
        let mesh = FakeMesh::with_peers(&[1, 2])
            .offer(1, &[9])
            .internal(1, &[1]);
        let mut machine = hooker(&mesh);

        let err = machine.run_join().await.unwrap_err();
        assert_eq!(err, HookError::NoExternalMap);
        assert_eq!(*machine.state(), JoinState::Failed(HookError::NoExternalMap));
    }

    #[tokio::test]
    async fn missing_internal_map_discards_negotiated_identity() {
        // Address negotiation and external fetch succeed, but nobody returns
        // a usable internal map: the attempt fails and the negotiated
        // address is not retained as active identity.
        let mesh = FakeMesh::with_peers(&[1, 2]).offer(1, &[9]).external(1);
        let mut machine = hooker(&mesh);

        let err = machine.run_join().await.unwrap_err();
        assert_eq!(err, HookError::NoInternalMap);
        assert_eq!(*machine.state(), JoinState::Failed(HookError::NoInternalMap));
        // The provisional address touched the interface mid-attempt, but no
        // JoinReport exists to install it as node state.
    }

    #[tokio::test]
    async fn day_node_links_come_from_in_group_candidates() {
        let mesh = FakeMesh::with_peers(&[1, 2])
            .offer(1, &[50])
            .external(1)
            .internal(1, &[1])
            .internal(2, &[2]);
        let mut machine = hooker(&mesh);

        let report = machine.run_join().await.unwrap();
        let links = &report.internal.record(report.identity.slot).links;
        let linked: Vec<usize> = links.iter().map(|l| l.to.index()).collect();
        assert_eq!(linked, vec![1, 2]);
    }
}
