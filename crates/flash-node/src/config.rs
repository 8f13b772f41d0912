use std::collections::HashMap;
use std::fs;
use std::path::Path;

use flash_core::FlashError;

/// Load the genesis endowments: a JSON object mapping peer-id strings to
/// initial balances. Every node of a network must load the same file.
pub fn read_genesis(path: &Path) -> Result<HashMap<String, f64>, FlashError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FileGuard(std::path::PathBuf);

    impl Drop for FileGuard {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn genesis_file_parses() {
        let path = std::env::temp_dir().join(format!("flash_genesis_{}", std::process::id()));
        let _guard = FileGuard(path.clone());

        fs::write(&path, r#"{"QmClient": 500.0, "QmServer": 1000}"#).unwrap();
        let genesis = read_genesis(&path).unwrap();

        assert_eq!(genesis.len(), 2);
        assert_eq!(genesis["QmClient"], 500.0);
        assert_eq!(genesis["QmServer"], 1000.0);
    }

    #[test]
    fn malformed_genesis_is_an_error() {
        let path = std::env::temp_dir().join(format!("flash_badgenesis_{}", std::process::id()));
        let _guard = FileGuard(path.clone());

        fs::write(&path, "balances: nope").unwrap();
        assert!(matches!(
            read_genesis(&path),
            Err(FlashError::Serialization(_))
        ));
    }
}
