//! Inbound stream handlers.
//!
//! One request/response exchange per stream. A request that fails any check
//! is logged and the stream closed without a response — remotes observe the
//! refusal as a short read.

use std::sync::Arc;

use flash_core::{FlashError, Tx};
use flash_crypto::{create_verifier_sig, verify_tx_sig, verify_verifier};
use flash_ledger::Ledger;
use flash_p2p::{
    receive_bytes, send_bytes, BoxedStream, COMMIT_PROTOCOL, SNAPSHOT_PROTOCOL, VERIFY_PROTOCOL,
};
use futures::io::AsyncWriteExt;
use libp2p_identity::PeerId;
use tracing::{debug, warn};

use crate::node::Node;

pub fn register_handlers(node: &Arc<Node>) {
    let n = Arc::clone(node);
    node.host.set_stream_handler(
        SNAPSHOT_PROTOCOL,
        Arc::new(move |stream| {
            let node = Arc::clone(&n);
            Box::pin(async move { handle_snapshot(node, stream).await })
        }),
    );

    let n = Arc::clone(node);
    node.host.set_stream_handler(
        VERIFY_PROTOCOL,
        Arc::new(move |stream| {
            let node = Arc::clone(&n);
            Box::pin(async move { handle_verify(node, stream).await })
        }),
    );

    let n = Arc::clone(node);
    node.host.set_stream_handler(
        COMMIT_PROTOCOL,
        Arc::new(move |stream| {
            let node = Arc::clone(&n);
            Box::pin(async move { handle_commit(node, stream).await })
        }),
    );
}

// ── Snapshot ─────────────────────────────────────────────────────────────────

/// Dump the full tx-log map as raw JSON. EOF terminates the response.
async fn handle_snapshot(node: Arc<Node>, mut stream: BoxedStream) {
    let data = {
        let ledger = node.ledger.lock().unwrap();
        match serde_json::to_vec(&ledger.txs) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "could not serialise tx logs");
                return;
            }
        }
    };

    if let Err(e) = stream.write_all(&data).await {
        debug!(error = %e, "snapshot write failed");
    }
    let _ = stream.close().await;
}

// ── Verify ───────────────────────────────────────────────────────────────────

async fn handle_verify(node: Arc<Node>, mut stream: BoxedStream) {
    let frame = match receive_bytes(&mut stream).await {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "could not read verification request");
            return;
        }
    };

    let tx: Tx = match serde_json::from_slice(&frame) {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "malformed verification request");
            return;
        }
    };

    // Check, sign and append under one guard so no concurrent request can
    // claim the same slot.
    let sig = {
        let mut ledger = node.ledger.lock().unwrap();
        match accept_for_verification(&node, &mut ledger, &tx) {
            Ok(sig) => sig,
            Err(e) => {
                warn!(from = %tx.from, seq = tx.sequence_num, error = %e, "verification refused");
                return;
            }
        }
    };

    debug!(from = %tx.from, seq = tx.sequence_num, amount = tx.amount, "tx verified");
    if let Err(e) = send_bytes(&sig, &mut stream).await {
        warn!(error = %e, "could not send verifier signature");
    }
    let _ = stream.close().await;
}

fn accept_for_verification(
    node: &Node,
    ledger: &mut Ledger,
    tx: &Tx,
) -> Result<Vec<u8>, FlashError> {
    match ledger.balances.get(&tx.from) {
        Some(balance) if *balance >= tx.amount => {}
        other => {
            return Err(FlashError::InsufficientBalance {
                peer: tx.from.clone(),
                need: tx.amount,
                have: other.copied().unwrap_or(0.0),
            })
        }
    }

    let expected = ledger.txs.get(&tx.from).map_or(0, |log| log.len() as u64);
    if expected != tx.sequence_num {
        return Err(FlashError::InvalidSequenceNum { expected, got: tx.sequence_num });
    }

    if tx.amount <= 0.0 {
        return Err(FlashError::ZeroAmount);
    }

    tx.from
        .parse::<PeerId>()
        .map_err(|e| FlashError::InvalidPeerId { id: tx.from.clone(), reason: e.to_string() })?;
    tx.to
        .parse::<PeerId>()
        .map_err(|e| FlashError::InvalidPeerId { id: tx.to.clone(), reason: e.to_string() })?;

    if !verify_tx_sig(tx)? {
        return Err(FlashError::BadSignature);
    }

    let sig = create_verifier_sig(tx, &node.keypair)?;

    let mut accepted = tx.clone();
    accepted.committed = false;
    ledger.txs.entry(tx.from.clone()).or_default().push(accepted);

    Ok(sig)
}

// ── Commit ───────────────────────────────────────────────────────────────────

async fn handle_commit(node: Arc<Node>, mut stream: BoxedStream) {
    let frame = match receive_bytes(&mut stream).await {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "could not read commit request");
            return;
        }
    };

    let tx: Tx = match serde_json::from_slice(&frame) {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "malformed commit request");
            return;
        }
    };

    let accepted = {
        let mut ledger = node.ledger.lock().unwrap();
        match apply_commit(&node, &mut ledger, &tx) {
            Ok(()) => true,
            Err(e) => {
                warn!(from = %tx.from, seq = tx.sequence_num, error = %e, "commit refused");
                false
            }
        }
    };

    if accepted {
        debug!(from = %tx.from, seq = tx.sequence_num, "tx committed");
        if let Err(e) = send_bytes(b"ok", &mut stream).await {
            warn!(error = %e, "could not acknowledge commit");
        }
    }
    let _ = stream.close().await;
}

fn apply_commit(node: &Node, ledger: &mut Ledger, tx: &Tx) -> Result<(), FlashError> {
    let position = ledger
        .txs
        .get(&tx.from)
        .and_then(|log| log.iter().position(|t| t.sig == tx.sig))
        .ok_or(FlashError::UnknownTx)?;

    let local = &ledger.txs[&tx.from][position];
    if local.amount != tx.amount
        || local.from != tx.from
        || local.to != tx.to
        || local.pubkey != tx.pubkey
        || local.sig != tx.sig
        || local.sequence_num != tx.sequence_num
    {
        return Err(FlashError::TxMismatch);
    }
    if local.committed || tx.committed {
        return Err(FlashError::AlreadyCommitted);
    }

    for verifier in &tx.verifiers {
        let peer: PeerId = verifier.id.parse().map_err(|e: libp2p_identity::ParseError| {
            FlashError::InvalidPeerId { id: verifier.id.clone(), reason: e.to_string() }
        })?;
        let pubkey = node
            .host
            .public_key(&peer)
            .ok_or_else(|| FlashError::UnknownPeer(verifier.id.clone()))?;
        if !verify_verifier(verifier, tx, &pubkey, &peer) {
            return Err(FlashError::BadSignature);
        }
    }

    if !ledger.has_verifier_quorum(tx) {
        return Err(FlashError::NoQuorum {
            stake: ledger.verifier_stake(tx),
            total: ledger.total_coins,
        });
    }

    if let Some(local) = ledger.txs.get_mut(&tx.from).and_then(|log| log.get_mut(position)) {
        local.verifiers = tx.verifiers.clone();
        local.committed = true;
    }

    ledger.calc_balances()
}
