//! Outbound protocol clients: snapshot fetch, verification solicitation and
//! commit broadcast. All three iterate peers sequentially; a peer that
//! fails or times out is logged and skipped.

use std::time::Duration;

use flash_core::{FlashError, Tx, TxMap, Verifier};
use flash_crypto::verify_verifier;
use flash_p2p::{receive_bytes, send_bytes, COMMIT_PROTOCOL, SNAPSHOT_PROTOCOL, VERIFY_PROTOCOL};
use futures::io::AsyncReadExt;
use libp2p_identity::PeerId;
use tracing::{debug, warn};

use crate::node::Node;

/// Outbound deadline applied per peer to verify and commit exchanges.
const PEER_DEADLINE: Duration = Duration::from_secs(5);

impl Node {
    /// Fetch a peer's full tx-log map.
    pub(crate) async fn fetch_snapshot(&self, addr: &str) -> Result<TxMap, FlashError> {
        let fail = |e: FlashError| FlashError::Transport(format!("snapshot from {addr}: {e}"));

        let peer = self.host.connect(addr).await.map_err(fail)?;
        let mut stream = self
            .host
            .open_stream(&peer, SNAPSHOT_PROTOCOL)
            .await
            .map_err(fail)?;

        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .await
            .map_err(|e| fail(FlashError::Io(e)))?;

        serde_json::from_slice(&data).map_err(|e| fail(e.into()))
    }

    /// Ask every known peer to attest to `tx`, collecting the attestations
    /// that verify under the peer's public key.
    pub(crate) async fn fetch_verifications(&self, tx: &mut Tx) {
        for peer in self.host.peers() {
            if peer == self.host.local_peer_id() {
                continue;
            }

            match tokio::time::timeout(PEER_DEADLINE, self.solicit_verification(tx, &peer)).await
            {
                Ok(Ok(verifier)) => {
                    debug!(peer = %peer, "verification received");
                    tx.verifiers.push(verifier);
                }
                Ok(Err(e)) => warn!(peer = %peer, error = %e, "verification failed"),
                Err(_) => warn!(peer = %peer, "verification timed out"),
            }
        }
    }

    async fn solicit_verification(&self, tx: &Tx, peer: &PeerId) -> Result<Verifier, FlashError> {
        let mut stream = self.host.open_stream(peer, VERIFY_PROTOCOL).await?;
        send_bytes(&serde_json::to_vec(tx)?, &mut stream).await?;

        let sig = receive_bytes(&mut stream).await?;
        if sig.is_empty() {
            return Err(FlashError::BadSignature);
        }

        let verifier = Verifier { id: peer.to_string(), sig };
        let pubkey = self
            .host
            .public_key(peer)
            .ok_or_else(|| FlashError::UnknownPeer(peer.to_string()))?;
        if !verify_verifier(&verifier, tx, &pubkey, peer) {
            return Err(FlashError::BadSignature);
        }

        Ok(verifier)
    }

    /// Announce the verified tx to every known peer, then finalise the own
    /// copy and replay balances.
    ///
    /// Peers that miss the announcement keep the tx uncommitted until their
    /// next snapshot sync; the signature-based merge makes that safe.
    pub(crate) async fn broadcast_commit(&self, tx: &Tx) -> Result<(), FlashError> {
        for peer in self.host.peers() {
            if peer == self.host.local_peer_id() {
                continue;
            }

            match tokio::time::timeout(PEER_DEADLINE, self.commit_to_peer(tx, &peer)).await {
                Ok(Ok(())) => {
                    debug!(peer = %peer, "commit acknowledged");
                    self.mark_committed(tx);
                }
                Ok(Err(e)) => warn!(peer = %peer, error = %e, "commit delivery failed"),
                Err(_) => warn!(peer = %peer, "commit timed out"),
            }
        }

        self.mark_committed(tx);
        self.ledger.lock().unwrap().calc_balances()
    }

    async fn commit_to_peer(&self, tx: &Tx, peer: &PeerId) -> Result<(), FlashError> {
        let mut stream = self.host.open_stream(peer, COMMIT_PROTOCOL).await?;
        send_bytes(&serde_json::to_vec(tx)?, &mut stream).await?;

        let reply = receive_bytes(&mut stream).await?;
        if reply != b"ok" {
            return Err(FlashError::CommitRejected(peer.to_string()));
        }
        Ok(())
    }

    fn mark_committed(&self, tx: &Tx) {
        let mut ledger = self.ledger.lock().unwrap();
        if let Some(local) = ledger
            .txs
            .get_mut(&tx.from)
            .and_then(|log| log.iter_mut().find(|t| t.sig == tx.sig))
        {
            local.committed = true;
        }
    }
}
