use flash_core::{FlashError, Tx, Verifier};
use libp2p_identity::{Keypair, PeerId, PublicKey};

use crate::hashes::{hash_tx, hash_tx_with_sig};

/// Sign the canonical tx hash and store the signature on the tx.
pub fn sign_tx(tx: &mut Tx, keypair: &Keypair) -> Result<(), FlashError> {
    let sig = keypair
        .sign(&hash_tx(tx))
        .map_err(|e| FlashError::Signing(e.to_string()))?;
    tx.sig = sig;
    Ok(())
}

/// Check the sender's signature against the public key carried on the tx.
///
/// Fails with `BadKey` when the embedded public key does not decode.
pub fn verify_tx_sig(tx: &Tx) -> Result<bool, FlashError> {
    let pubkey = PublicKey::try_decode_protobuf(&tx.pubkey)
        .map_err(|e| FlashError::BadKey(e.to_string()))?;
    Ok(pubkey.verify(&hash_tx(tx), &tx.sig))
}

/// Produce this node's attestation signature for a tx it has accepted.
pub fn create_verifier_sig(tx: &Tx, keypair: &Keypair) -> Result<Vec<u8>, FlashError> {
    keypair
        .sign(&hash_tx_with_sig(tx))
        .map_err(|e| FlashError::Signing(e.to_string()))
}

/// Check a verifier's attestation under the public key we hold for that peer.
///
/// Rejects outright when the record claims a different peer than the one the
/// signature is being checked against.
pub fn verify_verifier(verifier: &Verifier, tx: &Tx, pubkey: &PublicKey, peer: &PeerId) -> bool {
    if verifier.id != peer.to_string() {
        return false;
    }
    pubkey.verify(&hash_tx_with_sig(tx), &verifier.sig)
}
