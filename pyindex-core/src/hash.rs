//! SHA-256 digests for stored distribution files.

use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::Path;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Calculate the SHA-256 hash of data as lowercase hex.
///
/// ```
/// # use pyindex_core::hash::sha256_hash;
/// let hash = sha256_hash(b"hello world");
/// assert_eq!(hash.len(), 64);
/// ```
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a file from disk without loading it into memory. Blocking.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Returns `true` if `value` looks like a SHA-256 hex digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
