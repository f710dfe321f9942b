//! Content hashing for change detection.
//!
//! S3 reports the MD5 of a single-part object as its ETag, so files are
//! hashed with MD5 and compared against the normalised ETag.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// A computed file hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    /// Lowercase hex digest.
    pub value: String,
    /// Number of bytes hashed.
    pub size: u64,
}

impl FileHash {
    /// Whether this hash matches a checksum reported by the remote store.
    pub fn matches(&self, remote_checksum: &str) -> bool {
        normalize_checksum(remote_checksum).eq_ignore_ascii_case(&self.value)
    }
}

/// Hash bytes in memory.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// Stream a file through MD5.
pub fn hash_file(path: &Path) -> io::Result<FileHash> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 65536]; // 64KB buffer
    let mut size = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        size += bytes_read as u64;
    }

    Ok(FileHash {
        value: format!("{:x}", hasher.finalize()),
        size,
    })
}

/// Hash a file on the blocking pool.
pub async fn hash_file_async(path: &Path) -> io::Result<FileHash> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file(&path))
        .await
        .map_err(io::Error::other)?
}

/// Strip the quotes S3 wraps around ETags.
pub fn normalize_checksum(checksum: &str) -> &str {
    checksum.trim().trim_matches('"')
}
