//! Content hashing for archive manifests and record files.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::Context;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// A SHA-256 digest of a file or text written into an archive.
///
/// Carried as raw bytes in the archive manifest and rendered as
/// `sha256=<urlsafe-b64-nopad>` in the wheel RECORD file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a byte slice.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hasher.finalize().into())
    }

    /// Hash a file, streaming so large sources are never held in memory.
    pub fn of_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(ContentHash(hasher.finalize().into()))
    }

    /// RECORD-file rendering: `sha256=` followed by the urlsafe-base64
    /// digest with padding stripped.
    pub fn record(&self) -> String {
        format!("sha256={}", URL_SAFE_NO_PAD.encode(self.0))
    }
}
