//! File fingerprinting for ingestion idempotence: `{path, size_bytes,
//! modified_at, sha256}`, computed by streaming the source file through
//! SHA-256 in 8 KiB chunks.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use ferrumyx_common::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub path: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub sha256: String,
}

pub fn fingerprint_file(path: &Path) -> Result<FileFingerprint> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RagError::InvalidArgument(format!("cannot stat {}: {e}", path.display())))?;
    let modified_at: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| RagError::InvalidArgument(format!("cannot read mtime of {}: {e}", path.display())))?
        .into();

    let mut file = std::fs::File::open(path)
        .map_err(|e| RagError::InvalidArgument(format!("cannot open {}: {e}", path.display())))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| RagError::Fatal(format!("read error on {}: {e}", path.display())))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let sha256 = format!("{:x}", hasher.finalize());

    Ok(FileFingerprint { path: path.display().to_string(), size_bytes: metadata.len(), modified_at, sha256 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fingerprints_a_known_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let fp = fingerprint_file(file.path()).unwrap();
        assert_eq!(fp.size_bytes, 11);
        assert_eq!(fp.sha256, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde");
    }

    #[test]
    fn missing_file_is_invalid_argument() {
        let result = fingerprint_file(Path::new("/nonexistent/missing.bin"));
        assert!(matches!(result, Err(RagError::InvalidArgument(_))));
    }
}
