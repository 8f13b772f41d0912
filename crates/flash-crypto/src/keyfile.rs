//! Private-key persistence: base64 of the key's protobuf encoding, one line,
//! in a file readable only by its owner.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flash_core::FlashError;
use libp2p_identity::Keypair;
use zeroize::Zeroizing;

pub fn write_private_key(path: &Path, keypair: &Keypair) -> Result<(), FlashError> {
    let key_bytes = Zeroizing::new(
        keypair
            .to_protobuf_encoding()
            .map_err(|e| FlashError::BadKey(e.to_string()))?,
    );
    let encoded = Zeroizing::new(STANDARD.encode(key_bytes.as_slice()));

    fs::write(path, encoded.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

pub fn read_private_key(path: &Path) -> Result<Keypair, FlashError> {
    let encoded = Zeroizing::new(fs::read_to_string(path)?);
    let key_bytes = Zeroizing::new(
        STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| FlashError::BadKey(format!("invalid base64 key file: {e}")))?,
    );
    Keypair::from_protobuf_encoding(&key_bytes).map_err(|e| FlashError::BadKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_identity::PeerId;

    struct FileGuard(std::path::PathBuf);

    impl Drop for FileGuard {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn key_file_round_trips() {
        let path = std::env::temp_dir().join(format!("flash_keyfile_{}", std::process::id()));
        let _guard = FileGuard(path.clone());

        let keypair = crate::create_keypair().unwrap();
        write_private_key(&path, &keypair).unwrap();
        let restored = read_private_key(&path).unwrap();

        assert_eq!(
            keypair.public().encode_protobuf(),
            restored.public().encode_protobuf()
        );
        assert_eq!(
            PeerId::from_public_key(&keypair.public()),
            PeerId::from_public_key(&restored.public())
        );
    }

    #[test]
    fn garbage_key_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("flash_badkey_{}", std::process::id()));
        let _guard = FileGuard(path.clone());

        fs::write(&path, "not a key").unwrap();
        assert!(matches!(read_private_key(&path), Err(FlashError::BadKey(_))));
    }
}
