//! BLAKE3 content digests.
//!
//! Digests are rendered as lowercase hex strings; the engine treats equal
//! digests as byte-for-byte equality. Small files are read through a
//! buffer, larger ones are memory-mapped by blake3 itself.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::scanner::HashError;
use crate::state::Digest;

/// Files at or above this size are hashed via mmap.
const MMAP_THRESHOLD: u64 = 128 * 1024;

/// Read buffer for small files.
const BUF_SIZE: usize = 64 * 1024;

/// Compute the content digest of one file.
///
/// Deterministic for unchanged content.
///
/// # Errors
///
/// Returns [`HashError`] when the file cannot be opened or read.
pub fn digest_file(path: &Path) -> Result<Digest, HashError> {
    let map_io = |e: std::io::Error| HashError::from_io(path.to_path_buf(), e);

    let metadata = std::fs::metadata(path).map_err(map_io)?;
    let mut hasher = blake3::Hasher::new();

    if metadata.len() >= MMAP_THRESHOLD {
        hasher.update_mmap(path).map_err(map_io)?;
    } else {
        let mut file = File::open(path).map_err(map_io)?;
        let mut buf = [0u8; BUF_SIZE];
        loop {
            let n = file.read(&mut buf).map_err(map_io)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    Ok(hasher.finalize().to_hex().to_string())
}
