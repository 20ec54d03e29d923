use sha2::{Digest, Sha256};
use std::path::Path;

/// Length of the hex digest kept for file IDs. 16 hex characters (64 bits)
/// is collision-safe for any realistic local document catalog while keeping
/// index keys short.
const FILE_ID_LEN: usize = 16;

/// Derive a stable file ID from a path.
///
/// Same path always yields the same ID, so re-ingesting a file overwrites
/// its previous chunks and record instead of duplicating them.
pub fn file_id<P: AsRef<Path>>(path: P) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_ref().to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..FILE_ID_LEN].to_string()
}

/// Derive a stable chunk ID from a path and a zero-based chunk index.
pub fn chunk_id<P: AsRef<Path>>(path: P, index: usize) -> String {
    format!("{}_chunk_{}", file_id(path), index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_deterministic() {
        let a = file_id("/docs/report.pdf");
        let b = file_id("/docs/report.pdf");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_file_id_distinct_paths() {
        assert_ne!(file_id("/docs/a.pdf"), file_id("/docs/b.pdf"));
    }

    #[test]
    fn test_chunk_id_stable_and_indexed() {
        let id0 = chunk_id("/docs/report.pdf", 0);
        let id7 = chunk_id("/docs/report.pdf", 7);
        assert_eq!(id0, chunk_id("/docs/report.pdf", 0));
        assert_ne!(id0, id7);
        assert!(id0.starts_with(&file_id("/docs/report.pdf")));
        assert!(id0.ends_with("_chunk_0"));
        assert!(id7.ends_with("_chunk_7"));
    }

    #[test]
    fn test_non_ascii_path_produces_ascii_id() {
        // IDs must stay engine-safe even for non-ASCII paths
        let id = file_id("/docs/研究报告.pdf");
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
