use std::sync::Arc;

use async_trait::async_trait;
use flash_core::FlashError;
use futures::future::BoxFuture;
use futures::io::{AsyncRead, AsyncWrite};
use libp2p_identity::{PeerId, PublicKey};

/// A bidirectional, close-terminated byte stream.
pub trait P2pStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> P2pStream for T {}

impl std::fmt::Debug for dyn P2pStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("P2pStream")
    }
}

pub type BoxedStream = Box<dyn P2pStream>;

/// Callback invoked once per inbound stream of a registered protocol. The
/// stream is dropped (and thereby closed) when the future completes.
pub type StreamHandler = Arc<dyn Fn(BoxedStream) -> BoxFuture<'static, ()> + Send + Sync>;

/// The transport capability surface the node core consumes.
///
/// Implemented by the libp2p swarm host for production and by [`crate::mem`]
/// for in-process tests; the node never sees past this trait.
#[async_trait]
pub trait Host: Send + Sync + 'static {
    /// The local peer identity.
    fn local_peer_id(&self) -> PeerId;

    /// Dial the peer named by an address-info string and record its address.
    async fn connect(&self, addr: &str) -> Result<PeerId, FlashError>;

    /// Open a stream to `peer` speaking `protocol`.
    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: &'static str,
    ) -> Result<BoxedStream, FlashError>;

    /// Register the handler for inbound `protocol` streams. Each stream is
    /// served on its own task.
    fn set_stream_handler(&self, protocol: &'static str, handler: StreamHandler);

    /// Every peer this host knows of, the local peer included.
    fn peers(&self) -> Vec<PeerId>;

    /// The public key held for `peer`, if known.
    fn public_key(&self, peer: &PeerId) -> Option<PublicKey>;
}
