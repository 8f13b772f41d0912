pub mod hashes;
pub mod keyfile;
pub mod keypair;
pub mod sign;

pub use hashes::{hash_tx, hash_tx_with_sig};
pub use keyfile::{read_private_key, write_private_key};
pub use keypair::create_keypair;
pub use sign::{create_verifier_sig, sign_tx, verify_tx_sig, verify_verifier};
