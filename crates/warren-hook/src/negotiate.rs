//! Address negotiation: ask scanned peers for a free slot.

use std::net::Ipv4Addr;

use rand::Rng;
use tracing::{debug, warn};
use warren_map::{GroupAddr, GroupId, SlotId};
use warren_wire::{OfferReply, PeerCandidate, Reply, Request, RpcChannel};

use crate::{HookError, Result};

/// The identity a join attempt negotiates for the local node.
///
/// Mutated exactly once per attempt; becomes process-wide node state only
/// after the attempt completes successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    pub group: GroupId,
    pub base: GroupAddr,
    pub slot: SlotId,
    /// The assigned address, `base + slot`.
    pub addr: Ipv4Addr,
}

/// Ask each candidate in discovery order for the free slots of its group;
/// the first well-formed offer wins and one of its slots is chosen uniformly
/// at random.
///
/// Unresponsive peers, group-full refusals and malformed offers are skipped
/// individually. One pass only: if every candidate is exhausted the
/// negotiation fails with [`HookError::NoAddressAvailable`] and re-running
/// discovery is the caller's decision.
pub async fn negotiate_address<C, R>(
    channel: &C,
    candidates: &[PeerCandidate],
    rng: &mut R,
) -> Result<LocalIdentity>
where
    C: RpcChannel,
    R: Rng,
{
    for candidate in candidates {
        let reply = match channel.request(candidate.addr, Request::FreeSlots).await {
            Ok(reply) => reply,
            Err(err) => {
                debug!(peer = %candidate.addr, %err, "no address offer from peer, skipping");
                continue;
            }
        };

        let offer = match reply {
            Reply::FreeSlots(OfferReply::Offer(offer)) => offer,
            Reply::FreeSlots(OfferReply::GroupFull) => {
                debug!(peer = %candidate.addr, "peer's group is full, skipping");
                continue;
            }
            _ => {
                warn!(peer = %candidate.addr, "unexpected reply to free-slots request, skipping");
                continue;
            }
        };

        if let Err(err) = offer.validate() {
            warn!(peer = %candidate.addr, %err, "malformed address offer, skipping");
            continue;
        }

        let slot = offer.slots[rng.gen_range(0..offer.slots.len())];
        let addr = offer.base.slot_addr(slot);
        debug!(
            peer = %candidate.addr,
            group = %offer.group,
            offered = offer.slots.len(),
            %slot,
            %addr,
            "accepted address offer"
        );

        return Ok(LocalIdentity {
            group: offer.group,
            base: offer.base,
            slot,
            addr,
        });
    }

    Err(HookError::NoAddressAvailable)
}
