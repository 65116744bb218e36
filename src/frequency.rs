//! Frequency analysis for byte streams.
//!
//! Counts the occurrence of each byte value (0–255) in an input buffer.
//! The histogram is the archive format's source of truth: the decoder
//! regenerates the code table from these counts, never from stored codes.

use rayon::prelude::*;

/// Inputs at least this large are counted in parallel partitions.
const PARALLEL_THRESHOLD: usize = 256 * 1024;
/// Partition size for parallel counting.
const PARTITION_SIZE: usize = 64 * 1024;

/// Per-byte-value occurrence counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: [u64; 256],
}

impl Histogram {
    pub fn new() -> Self {
        Self { counts: [0; 256] }
    }

    /// Count byte frequencies in the input buffer.
    ///
    /// Large inputs are partitioned and counted concurrently; merging by
    /// summation is commutative and associative, so the result is identical
    /// to a sequential scan for any partitioning.
    pub fn of(data: &[u8]) -> Self {
        if data.len() >= PARALLEL_THRESHOLD {
            data.par_chunks(PARTITION_SIZE)
                .map(Self::scan)
                .reduce(Self::new, Self::merged)
        } else {
            Self::scan(data)
        }
    }

    fn scan(data: &[u8]) -> Self {
        let mut histogram = Self::new();
        for &b in data {
            histogram.counts[b as usize] += 1;
        }
        histogram
    }

    fn merged(mut self, other: Self) -> Self {
        for (count, extra) in self.counts.iter_mut().zip(other.counts.iter()) {
            *count += extra;
        }
        self
    }

    /// Set the count for one byte value, used when reading a stored histogram.
    pub fn set(&mut self, byte: u8, count: u64) {
        self.counts[byte as usize] = count;
    }

    pub fn get(&self, byte: u8) -> u64 {
        self.counts[byte as usize]
    }

    /// Present symbols and their counts, ascending by byte value.
    /// Zero counts are omitted.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(byte, &count)| (byte as u8, count))
    }

    /// Number of distinct byte values present.
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&count| count == 0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
