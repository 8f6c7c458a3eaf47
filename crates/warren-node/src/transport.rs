//! UDP transport for the join protocol.
//!
//! One service socket per daemon answers peer requests and receives
//! promotion acknowledgements; outgoing requests each use a short-lived
//! socket so replies correlate without a demultiplexer. Broadcasts go to
//! the link's broadcast address, the way the origin protocol reaches
//! "directly linked peers" without yet knowing who they are.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::trace;
use warren_wire::{
    decode, encode, Announcement, Broadcast, Envelope, PromotionAck, Reply, Request, RpcChannel,
    WireError,
};

/// Largest datagram the protocol produces; a full internal map fits well
/// within this.
pub(crate) const MAX_DATAGRAM: usize = 64 * 1024;

struct MeshInner {
    socket: Arc<UdpSocket>,
    mesh_port: u16,
    rpc_timeout: Duration,
    ack_tx: mpsc::UnboundedSender<PromotionAck>,
    ack_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PromotionAck>>,
}

/// Handle to the daemon's mesh transport. Cheap to clone.
#[derive(Clone)]
pub struct UdpMesh {
    inner: Arc<MeshInner>,
}

impl UdpMesh {
    /// Bind the service socket with broadcast enabled and generous buffers.
    pub async fn bind(
        bind: SocketAddr,
        mesh_port: u16,
        rpc_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_send_buffer_size(1024 * 1024)?;
        socket.set_recv_buffer_size(1024 * 1024)?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.bind(&bind.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        tracing::info!("mesh transport bound to {}", socket.local_addr()?);

        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        Ok(Self {
            inner: Arc::new(MeshInner {
                socket: Arc::new(socket),
                mesh_port,
                rpc_timeout,
                ack_tx,
                ack_rx: tokio::sync::Mutex::new(ack_rx),
            }),
        })
    }

    /// The service socket, for the responder task.
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.inner.socket)
    }

    /// Where the responder forwards promotion acknowledgements.
    pub fn ack_sink(&self) -> mpsc::UnboundedSender<PromotionAck> {
        self.inner.ack_tx.clone()
    }

    /// The local address the service socket is bound to.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.inner.socket.local_addr()?)
    }

    fn service_addr(&self, peer: Ipv4Addr) -> SocketAddr {
        SocketAddr::from((peer, self.inner.mesh_port))
    }
}

impl RpcChannel for UdpMesh {
    async fn request(&self, peer: Ipv4Addr, request: Request) -> warren_wire::Result<Reply> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        let id: u64 = rand::thread_rng().gen();
        let frame = encode(&Envelope::Request { id, body: request })?;
        socket.send_to(&frame, self.service_addr(peer)).await?;
        trace!(peer = %peer, kind = request.name(), id, "request sent");

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let deadline = tokio::time::Instant::now() + self.inner.rpc_timeout;
        loop {
            let recv = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
            let (len, _from) = match recv {
                Ok(result) => result?,
                Err(_) => return Err(WireError::Timeout { peer }),
            };
            // Stray datagrams (wrong id, junk) don't end the wait.
            match decode::<Envelope>(&buf[..len]) {
                Ok(Envelope::Reply { id: reply_id, body }) if reply_id == id => return Ok(body),
                Ok(_) | Err(_) => trace!(peer = %peer, "ignoring unrelated datagram"),
            }
        }
    }
}

impl Broadcast for UdpMesh {
    async fn announce(&self, announcement: Announcement) -> warren_wire::Result<()> {
        let frame = encode(&Envelope::Announce(announcement))?;
        self.inner
            .socket
            .send_to(&frame, (Ipv4Addr::BROADCAST, self.inner.mesh_port))
            .await?;
        Ok(())
    }

    async fn collect_acks(&self, expected: usize, wait: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + wait;
        let mut rx = self.inner.ack_rx.lock().await;
        let mut received = 0;
        while received < expected {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(ack)) => {
                    trace!(from = %ack.from, "promotion ack received");
                    received += 1;
                }
                // Channel closed or deadline hit: stop counting either way.
                Ok(None) | Err(_) => break,
            }
        }
        received
    }

    async fn advertise(&self, announcement: Announcement) -> warren_wire::Result<()> {
        // The wider flood belongs to the routing subsystem; from here it
        // starts as the same link-level broadcast.
        self.announce(announcement).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback_mesh(mesh_port: u16, timeout: Duration) -> UdpMesh {
        UdpMesh::bind("127.0.0.1:0".parse().unwrap(), mesh_port, timeout)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn request_times_out_against_silence() {
        // A bound socket that never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let mesh = loopback_mesh(port, Duration::from_millis(50)).await;
        let err = mesh
            .request(Ipv4Addr::new(127, 0, 0, 1), Request::FreeSlots)
            .await
            .unwrap_err();
        assert!(matches!(err, WireError::Timeout { .. }));
    }

    #[tokio::test]
    async fn acks_are_counted_up_to_the_deadline() {
        let mesh = loopback_mesh(9, Duration::from_millis(50)).await;
        let sink = mesh.ack_sink();
        for i in 0..2 {
            sink.send(PromotionAck {
                from: Ipv4Addr::new(10, 0, 0, i),
            })
            .unwrap();
        }

        // Two of three expected acks arrive; the bounded wait returns
        // rather than blocking on the third.
        let received = mesh.collect_acks(3, Duration::from_millis(50)).await;
        assert_eq!(received, 2);
    }
}
