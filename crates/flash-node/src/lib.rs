//! flash-node
//!
//! Node orchestration: owns the ledger behind one lock, serves the three
//! inbound stream protocols, runs the outbound clients, and drives the
//! transfer pipeline (build → sign → solicit → quorum → commit).

pub mod client;
pub mod config;
pub mod node;
pub mod server;

pub use node::{build_tx, Node};
