//! Content fingerprinting — raw bytes to identity key
//!
//! The digest is computed over the file's raw bytes and nothing else: no
//! path, no metadata, no decoding or re-encoding. Binary content, empty
//! files, and non-UTF-8 text all hash uniformly, which is what makes the
//! hash usable as a location-independent identity key.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::IdlibResult;

/// File names the identifier recognizes as C/C++ sources worth querying.
static SOURCE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(c|cc|cpp|cxx|h|hh|hpp|hxx)$").unwrap());

/// File names worth fingerprinting during indexing. Slightly wider than the
/// query-side filter: assembly sources are stable fingerprints too.
static INDEXABLE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(c|cc|cpp|cxx|h|hh|hpp|hxx|asm|S)$").unwrap());

/// Hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash a file on disk, returning `(content_hash, size)`.
pub fn hash_file(path: &Path) -> IdlibResult<(String, u64)> {
    let bytes = std::fs::read(path)?;
    Ok((sha256_hex(&bytes), bytes.len() as u64))
}

/// Whether the identifier should query this path.
pub fn is_recognized_source(path: &Path) -> bool {
    file_name_matches(path, &SOURCE_FILENAME)
}

/// Whether sparse indexing should fingerprint this path.
pub fn is_indexable_source(path: &str) -> bool {
    SOURCE_FILENAME.is_match(path) || INDEXABLE_FILENAME.is_match(path)
}

fn file_name_matches(path: &Path, re: &Regex) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| re.is_match(n))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_bytes_same_hash() {
        let a = sha256_hex(b"int main() { return 0; }\n");
        let b = sha256_hex(b"int main() { return 0; }\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sha256_hex(b"int main() { return 1; }\n"));
    }

    #[test]
    fn test_known_digest() {
        // sha256 of the empty input
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_binary_content_hashes_without_decoding() {
        let blob = [0u8, 159, 146, 150, 255, 0, 1];
        assert_eq!(sha256_hex(&blob).len(), 64);
    }

    #[test]
    fn test_recognized_source_extensions() {
        assert!(is_recognized_source(Path::new("src/deflate.c")));
        assert!(is_recognized_source(Path::new("INFLATE.H")));
        assert!(is_recognized_source(Path::new("a/b/tree.CPP")));
        assert!(!is_recognized_source(Path::new("notes.txt")));
        assert!(!is_recognized_source(Path::new("script.py")));
        assert!(!is_recognized_source(Path::new("c")));
    }

    #[test]
    fn test_indexable_includes_assembly() {
        assert!(is_indexable_source("src/aes.S"));
        assert!(is_indexable_source("boot/start.asm"));
        assert!(is_indexable_source("lib/zstd.h"));
        assert!(!is_indexable_source("README.md"));
    }

    #[test]
    fn test_hash_file_reports_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("x.c");
        std::fs::write(&path, b"abc").unwrap();
        let (hash, size) = hash_file(&path).unwrap();
        assert_eq!(size, 3);
        assert_eq!(hash, sha256_hex(b"abc"));
    }
}
