//! flash-p2p
//!
//! Transport layer for flash nodes: the host capability surface the node
//! core consumes, a length-prefixed frame codec, an in-memory mock network
//! for tests, and the production libp2p-backed host (tcp + noise + yamux,
//! one bidirectional stream per request).

pub mod frame;
pub mod host;
pub mod libp2p_host;
pub mod mem;
pub mod protocol;

pub use frame::{receive_bytes, send_bytes};
pub use host::{BoxedStream, Host, StreamHandler};
pub use libp2p_host::{P2pConfig, P2pHost, P2pNetwork};
pub use mem::{MemHost, MemNet};
pub use protocol::{COMMIT_PROTOCOL, SNAPSHOT_PROTOCOL, VERIFY_PROTOCOL};
