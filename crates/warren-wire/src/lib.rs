//! Warren wire protocol
//!
//! Message types exchanged during the join (hooking) procedure, their
//! bincode encoding, and the collaborator seams the join core is driven
//! through: neighbor discovery, the synchronous RPC channel, broadcast, and
//! device configuration.
//!
//! The exchanges mirror the origin protocol: a joining node asks a peer for
//! the free slots of its group (which may be refused outright when the group
//! is full), then for the peer's internal and external topology maps, and
//! finally announces its promotion to the directly linked peers.

mod codec;
mod error;
mod message;
mod traits;

pub use codec::{decode, encode};
pub use error::{Result, WireError};
pub use message::{AddressOffer, Announcement, Envelope, OfferReply, PromotionAck, Reply, Request};
pub use traits::{Broadcast, DeviceConfig, Discovery, PeerCandidate, RpcChannel};

// Re-export the map types that ride the wire, for convenience
pub use warren_map::{ExternalSnapshot, GroupAddr, GroupId, InternalSnapshot, SlotId};
