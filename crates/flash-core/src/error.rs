use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlashError {
    // ── Transaction validation ───────────────────────────────────────────────
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("invalid peer id {id}: {reason}")]
    InvalidPeerId { id: String, reason: String },

    #[error("insufficient balance for {peer}: need {need}, have {have}")]
    InsufficientBalance { peer: String, need: f64, have: f64 },

    #[error("invalid sequence number: expected {expected}, got {got}")]
    InvalidSequenceNum { expected: u64, got: u64 },

    // ── Signatures ───────────────────────────────────────────────────────────
    #[error("invalid signature")]
    BadSignature,

    #[error("could not decode public key: {0}")]
    BadKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    // ── Quorum ───────────────────────────────────────────────────────────────
    #[error("verifier stake {stake} does not exceed half of the {total} total coins")]
    NoQuorum { stake: f64, total: f64 },

    // ── Commit ───────────────────────────────────────────────────────────────
    #[error("no local transaction matches the commit request")]
    UnknownTx,

    #[error("commit request disagrees with the local transaction")]
    TxMismatch,

    #[error("transaction is already committed")]
    AlreadyCommitted,

    #[error("peer {0} rejected the commit")]
    CommitRejected(String),

    // ── Ledger replay ────────────────────────────────────────────────────────
    #[error("transactions must be ordered by sequence number")]
    OutOfOrder,

    #[error("negative balances are not allowed")]
    NegativeBalance,

    #[error("ledger replay failed after snapshot merge: {0}")]
    CorruptSnapshot(Box<FlashError>),

    // ── Wire ─────────────────────────────────────────────────────────────────
    #[error("stream closed before the frame was complete")]
    ShortRead,

    #[error("invalid frame length {0}")]
    InvalidFrameLength(i64),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    // ── Transport ────────────────────────────────────────────────────────────
    #[error("invalid peer address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("unknown peer {0}")]
    UnknownPeer(String),

    #[error("no handler registered for protocol {0}")]
    UnsupportedProtocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out waiting for peer {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for FlashError {
    fn from(e: serde_json::Error) -> Self {
        FlashError::Serialization(e.to_string())
    }
}
