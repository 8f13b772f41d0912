use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use flash_core::{FlashError, Tx, TxMap};
use flash_crypto::sign_tx;
use flash_ledger::Ledger;
use flash_p2p::Host;
use libp2p_identity::{Keypair, PeerId};
use tracing::{info, warn};

use crate::server;

/// A flash node: one identity, one ledger, one host.
///
/// The ledger lives behind a single coarse lock. Inbound handlers and the
/// transfer pipeline both go through it, and the ledger lock is never held
/// across an await point — the verify handler's slot check and append are
/// therefore atomic with respect to concurrent requests.
///
/// Outgoing transfers additionally funnel through `transfer_lock`: a
/// reserved sequence number must be the next one appended to the local log,
/// and peer solicitation happens in between, so the whole pipeline runs
/// single-writer per node.
pub struct Node {
    pub(crate) host: Arc<dyn Host>,
    pub(crate) keypair: Keypair,
    pub(crate) ledger: Mutex<Ledger>,
    transfer_lock: tokio::sync::Mutex<()>,
    bootstrap_peers: Vec<String>,
}

impl Node {
    pub fn new(
        keypair: Keypair,
        host: Arc<dyn Host>,
        genesis: HashMap<String, f64>,
        bootstrap_peers: Vec<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            keypair,
            ledger: Mutex::new(Ledger::new(genesis)),
            transfer_lock: tokio::sync::Mutex::new(()),
            bootstrap_peers,
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.host.local_peer_id()
    }

    /// Register the stream handlers, sync from the bootstrap peers and
    /// replay balances.
    ///
    /// A bootstrap peer that cannot be reached is skipped; a merged state
    /// that does not replay is fatal.
    pub async fn start(self: &Arc<Self>) -> Result<(), FlashError> {
        info!(peer = %self.peer_id(), "node starting");
        server::register_handlers(self);

        for addr in &self.bootstrap_peers {
            match self.fetch_snapshot(addr).await {
                Ok(snapshot) => {
                    let mut ledger = self.ledger.lock().unwrap();
                    ledger.merge_from(&snapshot);
                    info!(addr = %addr, senders = snapshot.len(), "merged peer snapshot");
                }
                Err(e) => warn!(addr = %addr, error = %e, "bootstrap sync failed"),
            }
        }

        let mut ledger = self.ledger.lock().unwrap();
        ledger
            .calc_balances()
            .map_err(|e| FlashError::CorruptSnapshot(Box::new(e)))?;

        info!(total_coins = ledger.total_coins, "node ready");
        Ok(())
    }

    /// Send `amount` coins to `to`.
    ///
    /// Builds and signs the tx, solicits verifications from every known
    /// peer, appends the tx to the local log, gates on the stake-weighted
    /// quorum and finally broadcasts the commit. On `NoQuorum` the tx stays
    /// in the local log uncommitted; a later snapshot merge dedupes it by
    /// signature.
    pub async fn transfer(&self, to: &PeerId, amount: f64) -> Result<(), FlashError> {
        // Serialise whole transfers: the slot reserved below stays the next
        // open slot of the local log until this tx is appended, even though
        // solicitation suspends in between.
        let _transfers = self.transfer_lock.lock().await;

        let self_id = self.peer_id().to_string();
        let pubkey = self.keypair.public().encode_protobuf();

        let mut tx = {
            let mut ledger = self.ledger.lock().unwrap();
            let tx = build_tx(
                &self_id,
                &to.to_string(),
                amount,
                pubkey,
                ledger.next_sequence_num,
            )?;
            ledger.next_sequence_num += 1;
            tx
        };

        sign_tx(&mut tx, &self.keypair)?;

        self.fetch_verifications(&mut tx).await;
        {
            let mut ledger = self.ledger.lock().unwrap();
            let log = ledger.txs.entry(self_id).or_default();
            // The reserved slot must still be the tail of the log.
            let expected = log.len() as u64;
            if expected != tx.sequence_num {
                return Err(FlashError::InvalidSequenceNum {
                    expected,
                    got: tx.sequence_num,
                });
            }
            log.push(tx.clone());
        }

        {
            let ledger = self.ledger.lock().unwrap();
            if !ledger.has_verifier_quorum(&tx) {
                return Err(FlashError::NoQuorum {
                    stake: ledger.verifier_stake(&tx),
                    total: ledger.total_coins,
                });
            }
        }

        self.broadcast_commit(&tx).await
    }

    // ── Ledger views (used by callers and tests; copies only) ────────────────

    pub fn balances(&self) -> HashMap<String, f64> {
        self.ledger.lock().unwrap().balances.clone()
    }

    pub fn balance_of(&self, peer: &PeerId) -> f64 {
        self.ledger
            .lock()
            .unwrap()
            .balances
            .get(&peer.to_string())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn txs(&self) -> TxMap {
        self.ledger.lock().unwrap().txs.clone()
    }

    pub fn next_sequence_num(&self) -> u64 {
        self.ledger.lock().unwrap().next_sequence_num
    }

    pub fn total_coins(&self) -> f64 {
        self.ledger.lock().unwrap().total_coins
    }
}

/// Assemble an unsigned tx for the given slot.
///
/// Rejects non-positive amounts and peer-id strings that do not decode.
pub fn build_tx(
    from: &str,
    to: &str,
    amount: f64,
    pubkey: Vec<u8>,
    sequence_num: u64,
) -> Result<Tx, FlashError> {
    if amount <= 0.0 {
        return Err(FlashError::ZeroAmount);
    }
    from.parse::<PeerId>()
        .map_err(|e| FlashError::InvalidPeerId { id: from.to_string(), reason: e.to_string() })?;
    to.parse::<PeerId>()
        .map_err(|e| FlashError::InvalidPeerId { id: to.to_string(), reason: e.to_string() })?;

    Ok(Tx {
        sequence_num,
        from: from.to_string(),
        to: to.to_string(),
        pubkey,
        amount,
        sig: Vec::new(),
        verifiers: Vec::new(),
        committed: false,
    })
}
