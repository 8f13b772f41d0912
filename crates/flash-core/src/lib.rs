pub mod error;
pub mod tx;

pub use error::FlashError;
pub use tx::{Tx, TxMap, Verifier};
