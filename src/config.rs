//! Configuration for entropack

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Upper bound on worker threads for chunk and per-file compression.
    pub max_workers: usize,
    /// Size of one chunk when a large input is split for parallel packing.
    pub chunk_size: usize,
    /// Inputs smaller than this are compressed sequentially in one pass.
    pub min_chunk_threshold: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            chunk_size: 1024 * 1024,              // 1 MiB chunks
            min_chunk_threshold: 5 * 1024 * 1024, // 5 MiB minimum
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompressionConfig::default();
        assert!(config.max_workers >= 1);
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.min_chunk_threshold, 5 * 1024 * 1024);
    }
}
