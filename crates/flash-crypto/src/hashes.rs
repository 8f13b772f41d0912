use flash_core::Tx;
use sha2::{Digest, Sha256};

// The textual renderings below are a wire contract shared with every peer
// implementation: decimal sequence number, the two peer-id strings, the
// amount with exactly six decimal places, then hex-encoded byte fields.
// Note the asymmetry: the sender hash renders the public key in UPPERCASE
// hex, while the verifier hash renders signature and public key in
// lowercase. Changing either is a network split.

/// Hash signed by the sender.
pub fn hash_tx(tx: &Tx) -> [u8; 32] {
    let data = format!(
        "{}{}{}{:.6}{}",
        tx.sequence_num,
        tx.from,
        tx.to,
        tx.amount,
        hex::encode_upper(&tx.pubkey),
    );
    Sha256::digest(data.as_bytes()).into()
}

/// Hash signed by a verifier: commits to the sender's signature as well.
pub fn hash_tx_with_sig(tx: &Tx) -> [u8; 32] {
    let data = format!(
        "{}{}{}{:.6}{}{}",
        tx.sequence_num,
        tx.from,
        tx.to,
        tx.amount,
        hex::encode(&tx.sig),
        hex::encode(&tx.pubkey),
    );
    Sha256::digest(data.as_bytes()).into()
}
