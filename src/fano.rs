//! Shannon-Fano code construction and reverse-map decoding.
//!
//! Symbols are sorted by descending frequency (ties by ascending byte
//! value, for determinism) and recursively partitioned at the index that
//! best balances the two halves' frequency sums; "0" goes to the left
//! partition and "1" to the right at every level.

use std::collections::HashMap;
use std::io::Cursor;

use bitstream_io::{BigEndian, BitReader};

use crate::bitpack;
use crate::control::Control;
use crate::error::CompressError;
use crate::frequency::Histogram;
use crate::progress::ProgressSink;
use crate::CodeTable;

struct SymbolNode {
    symbol: u8,
    weight: u64,
    code: Vec<bool>,
}

/// Build the prefix-free code table for a histogram.
///
/// Zero symbols yield an empty table; a single symbol gets the one-bit
/// code "0".
pub fn build_table(histogram: &Histogram) -> CodeTable {
    let mut nodes: Vec<SymbolNode> = histogram
        .iter()
        .map(|(symbol, weight)| SymbolNode {
            symbol,
            weight,
            code: Vec::new(),
        })
        .collect();
    nodes.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.symbol.cmp(&b.symbol)));

    match nodes.len() {
        0 => return CodeTable::new(),
        1 => nodes[0].code.push(false),
        n => split(&mut nodes, 0, n - 1),
    }

    nodes
        .into_iter()
        .map(|node| (node.symbol, node.code))
        .collect()
}

fn split(nodes: &mut [SymbolNode], start: usize, end: usize) {
    if start >= end {
        return;
    }
    if end - start == 1 {
        nodes[start].code.push(false);
        nodes[end].code.push(true);
        return;
    }

    let total: u64 = nodes[start..=end].iter().map(|n| n.weight).sum();

    // Split where |left_sum - right_sum| is smallest.
    let mut running = 0u64;
    let mut best_split = start;
    let mut best_diff = u64::MAX;
    for i in start..end {
        running += nodes[i].weight;
        let diff = running.abs_diff(total - running);
        if diff < best_diff {
            best_diff = diff;
            best_split = i;
        }
    }

    for node in &mut nodes[start..=best_split] {
        node.code.push(false);
    }
    for node in &mut nodes[best_split + 1..=end] {
        node.code.push(true);
    }

    split(nodes, start, best_split);
    split(nodes, best_split + 1, end);
}

/// Decode `orig_size` symbols by accumulating bits against the reverse
/// code map until a full code matches.
///
/// Asymptotically worse than tree-walking but functionally equivalent; the
/// payload is one continuous bit-stream and an early end leaves the tail
/// zero-filled.
pub fn decode(
    histogram: &Histogram,
    payload: &[u8],
    orig_size: u64,
    control: &Control,
    progress: &ProgressSink<'_>,
) -> Result<Vec<u8>, CompressError> {
    let mut output = vec![0u8; orig_size as usize];
    if orig_size == 0 {
        return Ok(output);
    }

    let reverse: HashMap<Vec<bool>, u8> = build_table(histogram)
        .into_iter()
        .map(|(symbol, code)| (code, symbol))
        .collect();
    if reverse.is_empty() {
        return Err(CompressError::Format(
            "empty histogram for a non-empty entry".into(),
        ));
    }

    let mut reader = BitReader::endian(Cursor::new(payload), BigEndian);
    let mut accumulated = Vec::new();
    let mut produced = 0usize;
    let mut bits_read = 0u64;

    while produced < output.len() {
        if bits_read % 8 == 0 {
            control.checkpoint()?;
        }
        let bit = match bitpack::next_bit(&mut reader)? {
            Some(bit) => bit,
            None => break,
        };
        bits_read += 1;
        accumulated.push(bit);

        if let Some(&symbol) = reverse.get(&accumulated) {
            output[produced] = symbol;
            produced += 1;
            accumulated.clear();
            if produced % 1000 == 0 || produced == output.len() {
                progress.report((produced as u64 * 100 / orig_size) as u8);
            }
        }
    }

    Ok(output)
}
