//! Content hashing for generated artifacts

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// A SHA-256 digest of an artifact's bytes.
///
/// Logged next to every published asset so a stored object can be matched
/// against the file the generator produced.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute a hash from bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Compute a hash from a file's contents
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(&data))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the hash as a prefixed hex string (e.g., "sha256:abcdef...")
    pub fn to_prefixed_hex(&self) -> String {
        format!("sha256:{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistent_hashing() {
        assert_eq!(
            ContentHash::from_bytes(b"glTF"),
            ContentHash::from_bytes(b"glTF")
        );
        assert_ne!(
            ContentHash::from_bytes(b"glTF"),
            ContentHash::from_bytes(b"glTf")
        );
    }

    #[test]
    fn test_known_digest() {
        let h = ContentHash::from_bytes(b"hello");
        assert_eq!(
            h.to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(h.to_prefixed_hex().starts_with("sha256:2cf24dba"));
        assert_eq!(h.to_string(), "2cf24dba5fb0a30e");
    }

    #[test]
    fn test_from_file_matches_bytes() {
        let path = std::env::temp_dir().join(format!("trellis_hash_{}", std::process::id()));
        std::fs::write(&path, b"model bytes").unwrap();
        let from_file = ContentHash::from_file(&path).unwrap();
        assert_eq!(from_file, ContentHash::from_bytes(b"model bytes"));
        std::fs::remove_file(&path).ok();
    }
}
