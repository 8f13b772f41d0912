use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-sender transaction logs: peer-id string → that sender's ordered txs.
///
/// For every sender `s`, `txs[s][i].sequence_num == i` must hold. The
/// snapshot protocol serialises this map verbatim.
pub type TxMap = HashMap<String, Vec<Tx>>;

// ── Verifier ─────────────────────────────────────────────────────────────────

/// A peer's attestation that a transaction passed its checks.
///
/// `sig` is the verifier's signature over the tx-with-sender-sig hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verifier {
    pub id: String,
    #[serde(with = "base64_bytes")]
    pub sig: Vec<u8>,
}

// ── Tx ───────────────────────────────────────────────────────────────────────

/// The unit of value transfer.
///
/// Byte fields travel as base64 strings on the wire; `committed` is an
/// in-memory flag only and is never serialised.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tx {
    /// Index of this tx in the sender's ordered log, starting at 0.
    #[serde(rename = "sequenceNum")]
    pub sequence_num: u64,

    /// Sender peer-id string.
    pub from: String,

    /// Receiver peer-id string.
    pub to: String,

    /// Canonical (protobuf) serialisation of the sender's public key.
    #[serde(rename = "pubKey", with = "base64_bytes")]
    pub pubkey: Vec<u8>,

    /// Coins transferred. Strictly positive.
    pub amount: f64,

    /// Sender's signature over the canonical tx hash.
    #[serde(with = "base64_bytes")]
    pub sig: Vec<u8>,

    /// Attestations accumulated during solicitation.
    #[serde(default, deserialize_with = "nullable_verifiers")]
    pub verifiers: Vec<Verifier>,

    /// True once finalised. Monotonic: never transitions back to false.
    #[serde(skip)]
    pub committed: bool,
}

/// Some peers marshal an empty verifier list as `null`; accept both.
fn nullable_verifiers<'de, D>(deserializer: D) -> Result<Vec<Verifier>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize as _;
    Ok(Option::<Vec<Verifier>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde adapter: `Vec<u8>` ⇄ standard base64 string.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        // Some peers emit `null` for byte fields that were never assigned;
        // treat that the same as absent.
        let opt = Option::<String>::deserialize(deserializer)?;
        match opt {
            Some(s) => STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
