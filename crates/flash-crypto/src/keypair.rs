use flash_core::FlashError;
use libp2p_identity::Keypair;
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use zeroize::Zeroizing;

const RSA_KEY_BITS: usize = 2048;

/// Generate a fresh 2048-bit RSA identity keypair.
///
/// The key is generated with the `rsa` crate and handed to `libp2p-identity`
/// through its PKCS#8 encoding, so signatures and derived peer ids are
/// interoperable with peers running on go-libp2p host keys.
pub fn create_keypair() -> Result<Keypair, FlashError> {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| FlashError::Signing(format!("RSA key generation failed: {e}")))?;

    let document = private
        .to_pkcs8_der()
        .map_err(|e| FlashError::Signing(format!("PKCS#8 encoding failed: {e}")))?;

    let mut der = Zeroizing::new(document.as_bytes().to_vec());
    Keypair::rsa_from_pkcs8(&mut der).map_err(|e| FlashError::BadKey(e.to_string()))
}
