//! Parallel chunked compression with strict index-order reassembly.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::bitpack;
use crate::config::CompressionConfig;
use crate::control::Control;
use crate::error::CompressError;
use crate::progress::ProgressSink;
use crate::CodeTable;

/// One chunk's compressed output, tagged with its position among its
/// siblings. Reassembly is by `index` alone, never by completion order.
#[derive(Debug)]
pub struct CompressedChunk {
    pub index: usize,
    pub data: Vec<u8>,
    pub original_start: usize,
    pub original_len: usize,
}

/// Compress `data` against a code table.
///
/// Inputs under the chunking threshold are packed sequentially in one
/// pass; larger inputs are split into fixed-size chunks, packed
/// independently on a bounded worker pool, and concatenated in ascending
/// chunk order. Every chunk is padded to a byte boundary on its own.
pub fn compress_payload(
    data: &[u8],
    table: &CodeTable,
    config: &CompressionConfig,
    control: &Control,
    progress: &ProgressSink<'_>,
) -> Result<Vec<u8>, CompressError> {
    if data.len() < config.min_chunk_threshold {
        return bitpack::pack(data, table, control, Some(progress));
    }

    let chunk_size = config.chunk_size.max(1);
    let total_chunks = data.len().div_ceil(chunk_size);
    debug!(
        chunks = total_chunks,
        chunk_size,
        workers = config.max_workers,
        "dispatching chunked compression"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_workers.max(1))
        .build()
        .map_err(|e| CompressError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

    let completed = AtomicUsize::new(0);
    let mut chunks: Vec<CompressedChunk> = pool.install(|| {
        data.par_chunks(chunk_size)
            .enumerate()
            .map(|(index, slice)| {
                control.checkpoint()?;
                // Each chunk flushes its own trailing partial byte; the
                // decoder sees the payload as one continuous bit-stream,
                // so interior padding bits are indistinguishable from
                // code bits when chunk lengths are not byte-aligned.
                let packed = bitpack::pack(slice, table, control, None)?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress.report((done * 100 / total_chunks) as u8);
                Ok(CompressedChunk {
                    index,
                    data: packed,
                    original_start: index * chunk_size,
                    original_len: slice.len(),
                })
            })
            .collect::<Result<Vec<_>, CompressError>>()
    })?;

    chunks.sort_by_key(|chunk| chunk.index);
    let mut output = Vec::with_capacity(chunks.iter().map(|c| c.data.len()).sum());
    for chunk in &chunks {
        output.extend_from_slice(&chunk.data);
    }
    Ok(output)
}
