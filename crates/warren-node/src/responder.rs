//! Serving side of the join protocol.
//!
//! Once hooked, a node is itself a bootstrap point for later joiners: it
//! answers free-slot queries from its internal map (refusing when the group
//! is full), serves both topology maps, acknowledges stable-node
//! announcements, and routes incoming acknowledgements to the transport's
//! collector.

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use warren_map::SlotRecord;
use warren_wire::{
    decode, encode, AddressOffer, Announcement, Envelope, OfferReply, PromotionAck, Reply, Request,
};

use crate::node::NodeState;
use crate::transport::MAX_DATAGRAM;

/// Build the reply a hooked node gives to one request.
///
/// `None` before the node has an identity of its own: an unhooked node has
/// nothing to offer and stays silent, like an unresponsive peer.
pub fn build_reply(state: &NodeState, request: Request) -> Option<Reply> {
    let hooked = state.hooked.as_ref()?;
    match request {
        Request::FreeSlots => {
            let vacant = hooked.internal.vacant_slots();
            let reply = if vacant.is_empty() {
                OfferReply::GroupFull
            } else {
                OfferReply::Offer(AddressOffer {
                    group: hooked.identity.group,
                    base: hooked.identity.base,
                    slots: vacant,
                })
            };
            Some(Reply::FreeSlots(reply))
        }
        Request::InternalMap => hooked.internal.snapshot().map(Reply::InternalMap),
        Request::ExternalMap => Some(Reply::ExternalMap(hooked.external.snapshot())),
    }
}

/// Run the responder loop on the service socket.
pub async fn serve(
    socket: Arc<UdpSocket>,
    state: Arc<RwLock<NodeState>>,
    ack_sink: UnboundedSender<PromotionAck>,
) -> anyhow::Result<()> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        let envelope = match decode::<Envelope>(&buf[..len]) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(%from, %err, "undecodable datagram dropped");
                continue;
            }
        };

        match envelope {
            Envelope::Request { id, body } => {
                let reply = build_reply(&*state.read().await, body);
                match reply {
                    Some(body) => {
                        let frame = encode(&Envelope::Reply { id, body })?;
                        if let Err(err) = socket.send_to(&frame, from).await {
                            warn!(%from, %err, "failed to send reply");
                        }
                    }
                    None => debug!(%from, "request before hook completed, ignoring"),
                }
            }
            Envelope::Announce(Announcement::StableNode { addr }) => {
                let mut state = state.write().await;
                if let Some(hooked) = state.hooked.as_mut() {
                    // A neighbor finished its join: record its slot and
                    // acknowledge.
                    if let Some(slot) = hooked.identity.base.slot_of(addr) {
                        hooked.internal.occupy(slot, SlotRecord::occupied(Vec::new()));
                        debug!(%addr, %slot, "neighbor promoted to stable node");
                    }
                    let ack = Envelope::Ack(PromotionAck {
                        from: hooked.identity.addr,
                    });
                    let frame = encode(&ack)?;
                    if let Err(err) = socket.send_to(&frame, from).await {
                        warn!(%from, %err, "failed to send promotion ack");
                    }
                }
            }
            Envelope::Announce(Announcement::Topology { group, occupied }) => {
                // Consumed by the routing subsystem; nothing to do here.
                debug!(%group, occupied, "topology advertisement received");
            }
            Envelope::Ack(ack) => {
                // Our own promotion round collects these.
                let _ = ack_sink.send(ack);
            }
            Envelope::Reply { .. } => {
                debug!(%from, "stray reply on service socket dropped");
            }
        }
    }
}
