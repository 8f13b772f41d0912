//! Stream protocol identifiers. These are spoken on the wire; changing one
//! partitions the node from every existing peer.

/// Full tx-log dump served to bootstrapping peers.
pub const SNAPSHOT_PROTOCOL: &str = "/flash/transactions/1.0.0";

/// Transaction verification request/response.
pub const VERIFY_PROTOCOL: &str = "/flash/verify-transaction/1.0.0";

/// Commit notification request/response.
pub const COMMIT_PROTOCOL: &str = "/flash/commit-transaction/1.0.0";
