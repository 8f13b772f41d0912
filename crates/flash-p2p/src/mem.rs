//! In-memory mock network.
//!
//! Every host registered with the same [`MemNet`] can see, dial and stream
//! to every other one, so multi-node behavior is testable in a single
//! process with no sockets. Streams are pairs of cross-wired byte pipes.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use std::task::{Context, Poll};

use async_trait::async_trait;
use flash_core::FlashError;
use futures::channel::mpsc;
use futures::io::{AsyncRead, AsyncWrite};
use futures::StreamExt;
use libp2p_identity::{Keypair, PeerId, PublicKey};

use crate::host::{BoxedStream, Host, StreamHandler};

// ── MemNet ───────────────────────────────────────────────────────────────────

struct Registered {
    public_key: PublicKey,
    handlers: Mutex<HashMap<&'static str, StreamHandler>>,
}

/// A registry of in-process hosts, fully linked to each other.
#[derive(Clone, Default)]
pub struct MemNet {
    hosts: Arc<RwLock<HashMap<PeerId, Arc<Registered>>>>,
}

impl MemNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host with the given identity to the network.
    pub fn host(&self, keypair: &Keypair) -> Arc<MemHost> {
        let public_key = keypair.public();
        let peer_id = PeerId::from_public_key(&public_key);

        let registered = Arc::new(Registered {
            public_key,
            handlers: Mutex::new(HashMap::new()),
        });
        self.hosts.write().unwrap().insert(peer_id, registered);

        Arc::new(MemHost { peer_id, net: self.clone() })
    }
}

// ── MemHost ──────────────────────────────────────────────────────────────────

pub struct MemHost {
    peer_id: PeerId,
    net: MemNet,
}

#[async_trait]
impl Host for MemHost {
    fn local_peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn connect(&self, addr: &str) -> Result<PeerId, FlashError> {
        // Accepts either a bare peer id or a multiaddr-style string ending
        // in /p2p/<peer-id>.
        let id_part = addr.rsplit('/').next().unwrap_or(addr);
        let peer: PeerId = id_part.parse().map_err(|_| FlashError::InvalidAddress {
            addr: addr.to_string(),
            reason: "no peer id component".to_string(),
        })?;

        if !self.net.hosts.read().unwrap().contains_key(&peer) {
            return Err(FlashError::UnknownPeer(peer.to_string()));
        }
        Ok(peer)
    }

    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: &'static str,
    ) -> Result<BoxedStream, FlashError> {
        let registered = self
            .net
            .hosts
            .read()
            .unwrap()
            .get(peer)
            .cloned()
            .ok_or_else(|| FlashError::UnknownPeer(peer.to_string()))?;

        let handler = registered
            .handlers
            .lock()
            .unwrap()
            .get(protocol)
            .cloned()
            .ok_or_else(|| FlashError::UnsupportedProtocol(protocol.to_string()))?;

        let (local, remote) = pipe_pair();
        tokio::spawn(handler(Box::new(remote)));
        Ok(Box::new(local))
    }

    fn set_stream_handler(&self, protocol: &'static str, handler: StreamHandler) {
        if let Some(registered) = self.net.hosts.read().unwrap().get(&self.peer_id) {
            registered.handlers.lock().unwrap().insert(protocol, handler);
        }
    }

    fn peers(&self) -> Vec<PeerId> {
        self.net.hosts.read().unwrap().keys().copied().collect()
    }

    fn public_key(&self, peer: &PeerId) -> Option<PublicKey> {
        self.net
            .hosts
            .read()
            .unwrap()
            .get(peer)
            .map(|r| r.public_key.clone())
    }
}

// ── MemStream ────────────────────────────────────────────────────────────────

/// One end of an in-process duplex pipe.
pub struct MemStream {
    incoming: mpsc::UnboundedReceiver<Vec<u8>>,
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    pending: Vec<u8>,
    offset: usize,
}

fn pipe_pair() -> (MemStream, MemStream) {
    let (a_tx, a_rx) = mpsc::unbounded();
    let (b_tx, b_rx) = mpsc::unbounded();

    let a = MemStream { incoming: b_rx, outgoing: Some(a_tx), pending: Vec::new(), offset: 0 };
    let b = MemStream { incoming: a_rx, outgoing: Some(b_tx), pending: Vec::new(), offset: 0 };
    (a, b)
}

impl AsyncRead for MemStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            if this.offset < this.pending.len() {
                let n = buf.len().min(this.pending.len() - this.offset);
                buf[..n].copy_from_slice(&this.pending[this.offset..this.offset + n]);
                this.offset += n;
                return Poll::Ready(Ok(n));
            }

            match this.incoming.poll_next_unpin(cx) {
                Poll::Ready(Some(chunk)) => {
                    this.pending = chunk;
                    this.offset = 0;
                }
                // Peer closed its write half.
                Poll::Ready(None) => return Poll::Ready(Ok(0)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl AsyncWrite for MemStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let this = self.get_mut();
        match &this.outgoing {
            Some(tx) => match tx.unbounded_send(buf.to_vec()) {
                Ok(()) => Poll::Ready(Ok(buf.len())),
                Err(_) => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
            },
            None => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().outgoing = None;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{receive_bytes, send_bytes};
    use futures::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn hosts_see_each_other() {
        let net = MemNet::new();
        let a = net.host(&Keypair::generate_ed25519());
        let b = net.host(&Keypair::generate_ed25519());

        let peers = a.peers();
        assert_eq!(peers.len(), 2);
        assert!(peers.contains(&a.local_peer_id()));
        assert!(peers.contains(&b.local_peer_id()));
        assert!(a.public_key(&b.local_peer_id()).is_some());
    }

    #[tokio::test]
    async fn connect_parses_bare_and_multiaddr_forms() {
        let net = MemNet::new();
        let a = net.host(&Keypair::generate_ed25519());
        let b = net.host(&Keypair::generate_ed25519());

        let bare = b.local_peer_id().to_string();
        assert_eq!(a.connect(&bare).await.unwrap(), b.local_peer_id());

        let full = format!("/memory/0/p2p/{bare}");
        assert_eq!(a.connect(&full).await.unwrap(), b.local_peer_id());

        assert!(a.connect("/memory/0").await.is_err());
    }

    #[tokio::test]
    async fn stream_echo_round_trip() {
        let net = MemNet::new();
        let a = net.host(&Keypair::generate_ed25519());
        let b = net.host(&Keypair::generate_ed25519());

        b.set_stream_handler(
            "/test/echo/1.0.0",
            Arc::new(|mut stream| {
                Box::pin(async move {
                    if let Ok(frame) = receive_bytes(&mut stream).await {
                        let _ = send_bytes(&frame, &mut stream).await;
                    }
                    let _ = stream.close().await;
                })
            }),
        );

        let mut stream = a
            .open_stream(&b.local_peer_id(), "/test/echo/1.0.0")
            .await
            .unwrap();
        send_bytes(b"ping", &mut stream).await.unwrap();
        assert_eq!(receive_bytes(&mut stream).await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn unregistered_protocol_is_refused() {
        let net = MemNet::new();
        let a = net.host(&Keypair::generate_ed25519());
        let b = net.host(&Keypair::generate_ed25519());

        let err = a
            .open_stream(&b.local_peer_id(), "/test/none/1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, FlashError::UnsupportedProtocol(_)));
    }

    #[tokio::test]
    async fn close_terminates_the_read_side() {
        let (mut a, mut b) = pipe_pair();

        a.write_all(b"bye").await.unwrap();
        a.close().await.unwrap();

        let mut data = Vec::new();
        b.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"bye");
    }
}
