//! libp2p-backed host.
//!
//! A Swarm over tcp + noise + yamux owns the connections; per-protocol
//! bidirectional streams come from the stream behaviour, and identify feeds
//! the peer-store so verifier public keys are available without any side
//! channel. The event loop runs in a dedicated task; the cloneable
//! [`P2pHost`] handle implements the [`Host`] surface the node consumes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use flash_core::FlashError;
use futures::StreamExt;
use libp2p::swarm::NetworkBehaviour;
use libp2p::swarm::SwarmEvent;
use libp2p::{identify, noise, ping, tcp, yamux, Multiaddr, StreamProtocol, Swarm};
use libp2p_identity::{Keypair, PeerId, PublicKey};
use libp2p_stream as streams;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::host::{BoxedStream, Host, StreamHandler};

/// Configuration for the libp2p host.
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// Local listen multiaddress.
    pub listen_addr: String,
    /// Protocol version advertised through identify.
    pub identify_protocol: String,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_addr: "/ip4/0.0.0.0/tcp/0".into(),
            identify_protocol: "/flash/id/1.0.0".into(),
        }
    }
}

#[derive(NetworkBehaviour)]
struct FlashBehaviour {
    streams: streams::Behaviour,
    identify: identify::Behaviour,
    ping: ping::Behaviour,
}

enum Command {
    Dial {
        peer: PeerId,
        addr: Multiaddr,
        reply: oneshot::Sender<Result<(), FlashError>>,
    },
}

type Peerstore = Arc<RwLock<HashMap<PeerId, PublicKey>>>;

/// Application-facing handle. Cheap to clone behind an `Arc`.
pub struct P2pHost {
    local_peer_id: PeerId,
    control: streams::Control,
    commands: mpsc::Sender<Command>,
    peerstore: Peerstore,
}

/// Owns the Swarm. Pass to `tokio::spawn(network.run())`.
pub struct P2pNetwork {
    swarm: Swarm<FlashBehaviour>,
    commands: mpsc::Receiver<Command>,
    peerstore: Peerstore,
    pending_dials: HashMap<PeerId, Vec<oneshot::Sender<Result<(), FlashError>>>>,
}

impl P2pNetwork {
    /// Build the network and return `(P2pNetwork, P2pHost)`.
    pub fn new(keypair: Keypair, config: &P2pConfig) -> Result<(Self, Arc<P2pHost>), FlashError> {
        let identify_protocol = config.identify_protocol.clone();
        let public_key = keypair.public();

        let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| FlashError::Transport(e.to_string()))?
            .with_behaviour(|key: &Keypair| FlashBehaviour {
                streams: streams::Behaviour::new(),
                identify: identify::Behaviour::new(identify::Config::new(
                    identify_protocol,
                    key.public(),
                )),
                ping: ping::Behaviour::default(),
            })
            .map_err(|e| FlashError::Transport(e.to_string()))?
            .with_swarm_config(|c| c.with_idle_connection_timeout(Duration::from_secs(60)))
            .build();

        let listen_addr: Multiaddr =
            config.listen_addr.parse().map_err(|e: libp2p::multiaddr::Error| {
                FlashError::InvalidAddress {
                    addr: config.listen_addr.clone(),
                    reason: e.to_string(),
                }
            })?;
        swarm
            .listen_on(listen_addr)
            .map_err(|e| FlashError::Transport(e.to_string()))?;

        let local_peer_id = *swarm.local_peer_id();
        let peerstore: Peerstore =
            Arc::new(RwLock::new(HashMap::from([(local_peer_id, public_key)])));
        let control = swarm.behaviour().streams.new_control();
        let (command_tx, command_rx) = mpsc::channel(64);

        let host = Arc::new(P2pHost {
            local_peer_id,
            control,
            commands: command_tx,
            peerstore: Arc::clone(&peerstore),
        });

        let network = P2pNetwork {
            swarm,
            commands: command_rx,
            peerstore,
            pending_dials: HashMap::new(),
        };

        Ok((network, host))
    }

    /// Drive the swarm. Run in a dedicated tokio task.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(command) = self.commands.recv() => self.handle_command(command),
                event = self.swarm.select_next_some() => self.handle_event(event),
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dial { peer, addr, reply } => {
                self.swarm.add_peer_address(peer, addr.clone());
                if self.swarm.is_connected(&peer) {
                    let _ = reply.send(Ok(()));
                    return;
                }
                match self.swarm.dial(addr) {
                    Ok(()) => self.pending_dials.entry(peer).or_default().push(reply),
                    Err(e) => {
                        let _ = reply.send(Err(FlashError::Transport(e.to_string())));
                    }
                }
            }
        }
    }

    fn handle_event(&mut self, event: SwarmEvent<FlashBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(addr = %address, "listening");
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!(peer = %peer_id, "connection established");
                if let Some(waiters) = self.pending_dials.remove(&peer_id) {
                    for waiter in waiters {
                        let _ = waiter.send(Ok(()));
                    }
                }
            }
            SwarmEvent::OutgoingConnectionError { peer_id: Some(peer_id), error, .. } => {
                warn!(peer = %peer_id, error = %error, "dial failed");
                if let Some(waiters) = self.pending_dials.remove(&peer_id) {
                    for waiter in waiters {
                        let _ = waiter.send(Err(FlashError::Transport(error.to_string())));
                    }
                }
            }
            SwarmEvent::Behaviour(FlashBehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => {
                debug!(peer = %peer_id, "identified");
                self.peerstore
                    .write()
                    .unwrap()
                    .insert(peer_id, info.public_key.clone());
                for addr in info.listen_addrs {
                    self.swarm.add_peer_address(peer_id, addr);
                }
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!(peer = %peer_id, "connection closed");
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Host for P2pHost {
    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn connect(&self, addr: &str) -> Result<PeerId, FlashError> {
        let maddr: Multiaddr = addr.parse().map_err(|e: libp2p::multiaddr::Error| {
            FlashError::InvalidAddress { addr: addr.to_string(), reason: e.to_string() }
        })?;

        let peer = match maddr.iter().last() {
            Some(libp2p::multiaddr::Protocol::P2p(peer)) => peer,
            _ => {
                return Err(FlashError::InvalidAddress {
                    addr: addr.to_string(),
                    reason: "missing /p2p/<peer-id> component".to_string(),
                })
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Dial { peer, addr: maddr, reply: reply_tx })
            .await
            .map_err(|_| FlashError::Transport("event loop stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| FlashError::Transport("event loop stopped".to_string()))??;

        Ok(peer)
    }

    async fn open_stream(
        &self,
        peer: &PeerId,
        protocol: &'static str,
    ) -> Result<BoxedStream, FlashError> {
        let mut control = self.control.clone();
        let stream = control
            .open_stream(*peer, StreamProtocol::new(protocol))
            .await
            .map_err(|e| FlashError::Transport(e.to_string()))?;
        Ok(Box::new(stream))
    }

    fn set_stream_handler(&self, protocol: &'static str, handler: StreamHandler) {
        let mut control = self.control.clone();
        match control.accept(StreamProtocol::new(protocol)) {
            Ok(mut incoming) => {
                tokio::spawn(async move {
                    while let Some((peer, stream)) = incoming.next().await {
                        debug!(peer = %peer, protocol, "inbound stream");
                        tokio::spawn(handler(Box::new(stream)));
                    }
                });
            }
            Err(e) => warn!(error = %e, protocol, "stream handler registration failed"),
        }
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peerstore.read().unwrap().keys().copied().collect()
    }

    fn public_key(&self, peer: &PeerId) -> Option<PublicKey> {
        self.peerstore.read().unwrap().get(peer).cloned()
    }
}
