//! Content hashing for package integrity

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;
use sha2::{Digest, Sha256};

use crate::error::{NccError, Result};

/// Hash prefix for BLAKE3 hashes
pub const HASH_PREFIX: &str = "blake3:";

/// Hash prefix for SHA-256 digests, as advertised by release APIs
pub const SHA256_PREFIX: &str = "sha256:";

/// BLAKE3 content hash of a byte buffer
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{}{}", HASH_PREFIX, blake3::hash(bytes).to_hex())
}

/// Calculate BLAKE3 hash of a file
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| NccError::io(path, e))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| NccError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

/// SHA-256 digest of a byte buffer
pub fn sha256_bytes(bytes: &[u8]) -> String {
    format!("{}{}", SHA256_PREFIX, hex::encode(Sha256::digest(bytes)))
}

/// Hash `bytes` with the algorithm named by the prefix of `advertised`
pub fn hash_like(advertised: &str, bytes: &[u8]) -> String {
    if advertised.starts_with(SHA256_PREFIX) {
        sha256_bytes(bytes)
    } else {
        hash_bytes(bytes)
    }
}

/// Verify a hash matches the expected value
pub fn verify_hash(expected: &str, actual: &str) -> bool {
    let normalize = |h: &str| {
        let h = h.trim().to_ascii_lowercase();
        if h.starts_with(HASH_PREFIX) || h.starts_with(SHA256_PREFIX) {
            h
        } else {
            format!("{HASH_PREFIX}{h}")
        }
    };

    normalize(expected) == normalize(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("package.ncc");
        std::fs::write(&file_path, "test content").unwrap();

        let hash = hash_file(&file_path).unwrap();
        assert!(hash.starts_with(HASH_PREFIX));
        assert_eq!(hash, hash_bytes(b"test content"));
    }

    #[test]
    fn test_hash_file_not_found() {
        let result = hash_file(Path::new("/nonexistent/file.ncc"));
        assert!(matches!(result, Err(NccError::Io { .. })));
    }

    #[test]
    fn test_sha256_known_digest() {
        assert_eq!(
            sha256_bytes(b"abc"),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_like_follows_prefix() {
        assert!(hash_like("sha256:00", b"x").starts_with(SHA256_PREFIX));
        assert!(hash_like("blake3:00", b"x").starts_with(HASH_PREFIX));
    }

    #[test]
    fn test_verify_hash() {
        let hash1 = format!("{}abc123", HASH_PREFIX);
        assert!(verify_hash(&hash1, &hash1.clone()));
        assert!(verify_hash(&hash1, "ABC123"));
        assert!(!verify_hash(&hash1, &format!("{}def456", HASH_PREFIX)));
        assert!(!verify_hash("sha256:abc123", &hash1));
    }
}
