//! Request, reply and broadcast message types.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use warren_map::{ExternalSnapshot, GroupAddr, GroupId, InternalSnapshot, SlotId, MAX_GROUP_SIZE};

use crate::WireError;

/// A request a joining node sends to one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Ask for the free address slots in the peer's group.
    FreeSlots,
    /// Ask for the peer's intra-group topology map.
    InternalMap,
    /// Ask for the peer's inter-group topology map.
    ExternalMap,
}

impl Request {
    /// Short name for logging.
    pub const fn name(self) -> &'static str {
        match self {
            Request::FreeSlots => "free-slots",
            Request::InternalMap => "internal-map",
            Request::ExternalMap => "external-map",
        }
    }
}

/// The address slots one peer offers a joining node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressOffer {
    /// The group the offer is for.
    pub group: GroupId,
    /// The group's base address; slot `s` lives at `base + s`.
    pub base: GroupAddr,
    /// The vacant slots on offer.
    pub slots: Vec<SlotId>,
}

impl AddressOffer {
    /// Bounds-check the offer.
    ///
    /// An offer is well-formed only when its declared slot count is in
    /// `[1, MAX_GROUP_SIZE)`: an empty offer carries no information and a
    /// full-group offer is impossible (the offering peer occupies a slot
    /// itself).
    pub fn validate(&self) -> Result<(), WireError> {
        if self.slots.is_empty() || self.slots.len() >= MAX_GROUP_SIZE {
            return Err(WireError::Malformed(format!(
                "offer declares {} free slots",
                self.slots.len()
            )));
        }
        Ok(())
    }
}

/// Reply to [`Request::FreeSlots`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferReply {
    Offer(AddressOffer),
    /// The peer's group has no vacant slot.
    GroupFull,
}

/// A peer's reply to one [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    FreeSlots(OfferReply),
    InternalMap(InternalSnapshot),
    ExternalMap(ExternalSnapshot),
}

/// Fire-and-forget broadcast payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Announcement {
    /// "I am a stable node": sent to directly linked peers at promotion.
    StableNode { addr: Ipv4Addr },
    /// Topology advertisement for the wider network after promotion.
    Topology { group: GroupId, occupied: u16 },
}

/// Acknowledgement of a [`Announcement::StableNode`] broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionAck {
    pub from: Ipv4Addr,
}

/// Top-level datagram framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// A request, tagged so the reply can be correlated.
    Request { id: u64, body: Request },
    /// The reply to the request with the same id.
    Reply { id: u64, body: Reply },
    Announce(Announcement),
    Ack(PromotionAck),
}
