//! Topology fetch: external map from the first responsive peer, internal
//! map merged from every responsive peer.

use tracing::{debug, warn};
use warren_map::{ExternalSnapshot, InternalMap};
use warren_wire::{PeerCandidate, Reply, Request, RpcChannel};

use crate::{HookError, Result};

/// Fetch the inter-group topology from the first candidate that answers
/// with a well-formed snapshot.
pub async fn fetch_external<C>(channel: &C, candidates: &[PeerCandidate]) -> Result<ExternalSnapshot>
where
    C: RpcChannel,
{
    for candidate in candidates {
        let reply = match channel.request(candidate.addr, Request::ExternalMap).await {
            Ok(reply) => reply,
            Err(err) => {
                debug!(peer = %candidate.addr, %err, "no external map from peer, skipping");
                continue;
            }
        };

        let snapshot = match reply {
            Reply::ExternalMap(snapshot) => snapshot,
            _ => {
                warn!(peer = %candidate.addr, "unexpected reply to external-map request, skipping");
                continue;
            }
        };

        if let Err(err) = snapshot.validate() {
            warn!(peer = %candidate.addr, %err, "malformed external map, skipping");
            continue;
        }

        debug!(peer = %candidate.addr, groups = snapshot.groups.len(), "adopted external map");
        return Ok(snapshot);
    }

    Err(HookError::NoExternalMap)
}

/// Fetch the intra-group topology from *every* candidate and merge each
/// well-formed snapshot into `map`, in candidate order, so earlier (more
/// responsive) sources win conflicting slots.
///
/// Candidates outside the map's group cannot be translated into its id
/// space and are skipped. Returns the number of snapshots merged; zero is
/// [`HookError::NoInternalMap`] — a node cannot operate without a starting
/// internal view.
pub async fn fetch_internal<C>(
    channel: &C,
    candidates: &[PeerCandidate],
    map: &mut InternalMap,
) -> Result<usize>
where
    C: RpcChannel,
{
    let mut merged = 0usize;

    for candidate in candidates {
        let Some(sender_slot) = map.base().slot_of(candidate.addr) else {
            debug!(peer = %candidate.addr, "peer outside the local group, skipping");
            continue;
        };

        let reply = match channel.request(candidate.addr, Request::InternalMap).await {
            Ok(reply) => reply,
            Err(err) => {
                debug!(peer = %candidate.addr, %err, "no internal map from peer, skipping");
                continue;
            }
        };

        let snapshot = match reply {
            Reply::InternalMap(snapshot) => snapshot,
            _ => {
                warn!(peer = %candidate.addr, "unexpected reply to internal-map request, skipping");
                continue;
            }
        };

        if let Err(err) = snapshot.validate() {
            warn!(peer = %candidate.addr, %err, "malformed internal map, skipping");
            continue;
        }

        let outcome = map.merge_snapshot(&snapshot, sender_slot);
        merged += 1;
        debug!(
            peer = %candidate.addr,
            added = outcome.added,
            kept = outcome.kept,
            dropped = outcome.dropped,
            "merged internal map snapshot"
        );
    }

    if merged == 0 {
        return Err(HookError::NoInternalMap);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use warren_map::{
        GroupAddr, GroupId, GroupRecord, InternalSnapshot, SlotId, SlotRecord, MAX_NEIGHBOR_LINKS,
    };
    use warren_wire::WireError;

    struct MapChannel {
        replies: HashMap<Ipv4Addr, Reply>,
    }

    impl RpcChannel for MapChannel {
        async fn request(&self, peer: Ipv4Addr, _request: Request) -> warren_wire::Result<Reply> {
            self.replies
                .get(&peer)
                .cloned()
                .ok_or(WireError::Timeout { peer })
        }
    }

    fn peer(last_octet: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last_octet)
    }

    fn candidate(last_octet: u8) -> PeerCandidate {
        PeerCandidate {
            addr: peer(last_octet),
            rtt: Duration::from_millis(last_octet as u64),
        }
    }

    fn slot(raw: usize) -> SlotId {
        SlotId::new(raw).unwrap()
    }

    fn internal_reply(root: usize, occupied: &[usize]) -> Reply {
        Reply::InternalMap(InternalSnapshot {
            root: slot(root),
            slots: occupied
                .iter()
                .map(|&i| (slot(i), SlotRecord::occupied(Vec::new())))
                .collect(),
        })
    }

    fn external_reply(own: u32) -> Reply {
        Reply::ExternalMap(ExternalSnapshot {
            own: GroupId(own),
            groups: vec![GroupRecord {
                id: GroupId(own),
                base: GroupAddr::new(Ipv4Addr::new(10, 0, 0, 0)),
                occupied: 3,
            }],
        })
    }

    fn fresh_map() -> InternalMap {
        InternalMap::new(GroupId(1), GroupAddr::new(Ipv4Addr::new(10, 0, 0, 0)))
    }

    #[tokio::test]
    async fn external_first_responder_wins() {
        let channel = MapChannel {
            replies: HashMap::from([(peer(2), external_reply(9)), (peer(3), external_reply(8))]),
        };
        // Candidate 1 is unresponsive; candidate 2 answers first.
        let snapshot = fetch_external(&channel, &[candidate(1), candidate(2), candidate(3)])
            .await
            .unwrap();
        assert_eq!(snapshot.own, GroupId(9));
    }

    #[tokio::test]
    async fn external_exhaustion_is_fatal() {
        let channel = MapChannel {
            replies: HashMap::new(),
        };
        let err = fetch_external(&channel, &[candidate(1)]).await.unwrap_err();
        assert_eq!(err, HookError::NoExternalMap);
    }

    #[tokio::test]
    async fn internal_merges_all_usable_replies() {
        // Candidate 1 answers, candidate 2 sends an oversized link block
        // (rejected), candidate 3 answers: merge count must be 2.
        let oversized = Reply::InternalMap(InternalSnapshot {
            root: slot(2),
            slots: vec![(
                slot(5),
                SlotRecord::occupied(vec![
                    warren_map::Link {
                        to: slot(0),
                        rtt_ms: 1
                    };
                    MAX_NEIGHBOR_LINKS + 1
                ]),
            )],
        });
        let channel = MapChannel {
            replies: HashMap::from([
                (peer(1), internal_reply(1, &[1, 4])),
                (peer(2), oversized),
                (peer(3), internal_reply(3, &[3, 9])),
            ]),
        };

        let mut map = fresh_map();
        let merged = fetch_internal(&channel, &[candidate(1), candidate(2), candidate(3)], &mut map)
            .await
            .unwrap();

        assert_eq!(merged, 2);
        for occupied in [1, 3, 4, 9] {
            assert!(map.record(slot(occupied)).state.is_occupied());
        }
        assert!(!map.record(slot(5)).state.is_occupied());
    }

    #[tokio::test]
    async fn internal_zero_merges_is_fatal() {
        let channel = MapChannel {
            replies: HashMap::new(),
        };
        let mut map = fresh_map();
        let err = fetch_internal(&channel, &[candidate(1), candidate(2)], &mut map)
            .await
            .unwrap_err();
        assert_eq!(err, HookError::NoInternalMap);
    }

    #[tokio::test]
    async fn internal_skips_out_of_group_candidates() {
        let foreign = PeerCandidate {
            addr: Ipv4Addr::new(10, 0, 9, 1),
            rtt: Duration::from_millis(1),
        };
        let channel = MapChannel {
            replies: HashMap::from([(peer(1), internal_reply(1, &[1]))]),
        };
        let mut map = fresh_map();
        let merged = fetch_internal(&channel, &[foreign, candidate(1)], &mut map)
            .await
            .unwrap();
        assert_eq!(merged, 1);
    }
}
