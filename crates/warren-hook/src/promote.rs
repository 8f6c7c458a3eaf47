//! Promotion: day node to stable node.

use tracing::{debug, warn};
use warren_wire::{Announcement, Broadcast};

use crate::{HookConfig, LocalIdentity};

/// What the promotion sequence observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionReport {
    /// Acknowledgements received from directly linked peers.
    pub acks: usize,
    /// How many were expected.
    pub linked_peers: usize,
}

/// Run the dnode→snode sequence: dwell, announce, wait (bounded) for
/// acknowledgements, advertise the topology.
///
/// Promotion never fails: broadcast errors and missing acknowledgements are
/// logged and the node becomes stable regardless.
pub async fn promote<B>(
    broadcast: &B,
    config: &HookConfig,
    identity: &LocalIdentity,
    linked_peers: usize,
    occupied: u16,
) -> PromotionReport
where
    B: Broadcast,
{
    // Let the topology settle around the new address before speaking up.
    tokio::time::sleep(config.dwell).await;

    if let Err(err) = broadcast
        .announce(Announcement::StableNode {
            addr: identity.addr,
        })
        .await
    {
        warn!(%err, "stable-node announcement failed, promoting anyway");
    }

    let acks = broadcast.collect_acks(linked_peers, config.ack_wait).await;
    if acks < linked_peers {
        warn!(
            acks,
            linked_peers, "promotion acknowledgements incomplete, proceeding after bounded wait"
        );
    } else {
        debug!(acks, "all linked peers acknowledged promotion");
    }

    if let Err(err) = broadcast
        .advertise(Announcement::Topology {
            group: identity.group,
            occupied,
        })
        .await
    {
        warn!(%err, "topology advertisement failed");
    }

    PromotionReport { acks, linked_peers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::time::Duration;
    use warren_map::{GroupAddr, GroupId, SlotId};

    #[derive(Default)]
    struct RecordingBroadcast {
        announced: Mutex<Vec<Announcement>>,
        acks_to_deliver: usize,
    }

    impl Broadcast for RecordingBroadcast {
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

    fn identity() -> LocalIdentity {
        let base = GroupAddr::new(Ipv4Addr::new(10, 0, 0, 0));
        let slot = SlotId::new(4).unwrap();
        LocalIdentity {
            group: GroupId(1),
            base,
            slot,
            addr: base.slot_addr(slot),
        }
    }

    #[tokio::test]
    async fn promotion_announces_then_advertises() {
        let broadcast = RecordingBroadcast {
            acks_to_deliver: 3,
            ..Default::default()
        };
        let report = promote(&broadcast, &HookConfig::fast(), &identity(), 3, 12).await;

        assert_eq!(report.acks, 3);
        let announced = broadcast.announced.lock().unwrap();
        assert_eq!(
            announced[0],
            Announcement::StableNode {
                addr: Ipv4Addr::new(10, 0, 0, 4)
            }
        );
        assert_eq!(
            announced[1],
            Announcement::Topology {
                group: GroupId(1),
                occupied: 12
            }
        );
    }

    #[tokio::test]
    async fn promotion_proceeds_without_full_acks() {
        let broadcast = RecordingBroadcast {
            acks_to_deliver: 1,
            ..Default::default()
        };
        let report = promote(&broadcast, &HookConfig::fast(), &identity(), 4, 5).await;

        // Short of acks, but promotion still ran to completion.
        assert_eq!(report.acks, 1);
        assert_eq!(report.linked_peers, 4);
        assert_eq!(broadcast.announced.lock().unwrap().len(), 2);
    }
}
