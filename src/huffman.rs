//! Huffman code construction and bit-level decoding.
//!
//! Builds the classic minimum-weight-merge tree. Construction is fully
//! deterministic: ties on weight are broken by node creation order, with
//! leaves seeded in ascending symbol order, so the decoder rebuilds an
//! identical tree from the stored histogram.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::Cursor;

use bitstream_io::{BigEndian, BitReader};

use crate::bitpack;
use crate::control::Control;
use crate::error::CompressError;
use crate::frequency::Histogram;
use crate::progress::ProgressSink;
use crate::CodeTable;

/// Decode-side walking structure; also the transient shape behind
/// code-table extraction.
#[derive(Debug)]
pub enum Node {
    Leaf(u8),
    Internal(Box<Node>, Box<Node>),
}

struct HeapNode {
    weight: u64,
    order: u32,
    node: Node,
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.order == other.order
    }
}
impl Eq for HeapNode {}
impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the minimum (weight, order) pair.
        other
            .weight
            .cmp(&self.weight)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Build the merge tree for a histogram. Returns `None` for an empty one.
pub fn build_tree(histogram: &Histogram) -> Option<Node> {
    let mut heap = BinaryHeap::new();
    for (symbol, count) in histogram.iter() {
        heap.push(HeapNode {
            weight: count,
            order: u32::from(symbol),
            node: Node::Leaf(symbol),
        });
    }
    if heap.is_empty() {
        return None;
    }

    // Internal nodes are stamped after all 256 possible leaves.
    let mut next_order = 256u32;
    while heap.len() > 1 {
        let left = heap.pop()?;
        let right = heap.pop()?;
        heap.push(HeapNode {
            weight: left.weight + right.weight,
            order: next_order,
            node: Node::Internal(Box::new(left.node), Box::new(right.node)),
        });
        next_order += 1;
    }

    heap.pop().map(|n| n.node)
}

/// Build the prefix-free code table for a histogram.
///
/// A single-symbol histogram still yields a usable one-bit code, since a
/// lone leaf has no branch to derive a code from.
pub fn build_table(histogram: &Histogram) -> CodeTable {
    let mut table = CodeTable::new();
    if let Some(root) = build_tree(histogram) {
        collect_codes(&root, Vec::new(), &mut table);
    }
    table
}

fn collect_codes(node: &Node, prefix: Vec<bool>, table: &mut CodeTable) {
    match node {
        Node::Leaf(symbol) => {
            let code = if prefix.is_empty() { vec![false] } else { prefix };
            table.insert(*symbol, code);
        }
        Node::Internal(left, right) => {
            let mut left_prefix = prefix.clone();
            left_prefix.push(false);
            collect_codes(left, left_prefix, table);

            let mut right_prefix = prefix;
            right_prefix.push(true);
            collect_codes(right, right_prefix, table);
        }
    }
}

/// Decode `orig_size` symbols from a packed payload by walking the tree
/// rebuilt from the stored histogram (0 → left, 1 → right).
///
/// The payload is consumed as one continuous bit-stream. If it runs out
/// early the remaining output stays zero-filled.
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
    let root = build_tree(histogram)
        .ok_or_else(|| CompressError::Format("empty histogram for a non-empty entry".into()))?;

    let mut reader = BitReader::endian(Cursor::new(payload), BigEndian);
    let mut produced = 0usize;

    'stream: while produced < output.len() {
        control.checkpoint()?;
        let mut node = &root;
        loop {
            let bit = match bitpack::next_bit(&mut reader)? {
                Some(bit) => bit,
                None => break 'stream,
            };
            node = match node {
                // A one-leaf tree consumes one bit per symbol.
                Node::Leaf(_) => node,
                Node::Internal(left, right) => {
                    if bit {
                        &**right
                    } else {
                        &**left
                    }
                }
            };
            if let Node::Leaf(symbol) = node {
                output[produced] = *symbol;
                produced += 1;
                break;
            }
        }
        if produced % 1000 == 0 || produced == output.len() {
            progress.report((produced as u64 * 100 / orig_size) as u8);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitpack::pack;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let histogram = Histogram::of(data);
        let table = build_table(&histogram);
        let control = Control::new();
        let packed = pack(data, &table, &control, None).unwrap();
        decode(
            &histogram,
            &packed,
            data.len() as u64,
            &control,
            &ProgressSink::new(None),
        )
        .unwrap()
    }

    #[test]
    fn test_aaaab_scenario() {
        let histogram = Histogram::of(b"aaaab");
        let table = build_table(&histogram);
        assert_eq!(table[&b'a'].len(), 1);
        assert!(!table[&b'b'].is_empty());
        assert_ne!(table[&b'a'], table[&b'b']);
        assert_eq!(roundtrip(b"aaaab"), b"aaaab");
    }

    #[test]
    fn test_single_symbol_gets_one_bit_code() {
        let histogram = Histogram::of(b"aaaaaa");
        let table = build_table(&histogram);
        assert_eq!(table.len(), 1);
        assert_eq!(table[&b'a'], vec![false]);
        assert_eq!(roundtrip(b"aaaaaa"), b"aaaaaa");
    }

    #[test]
    fn test_empty_histogram() {
        let histogram = Histogram::new();
        assert!(build_tree(&histogram).is_none());
        assert!(build_table(&histogram).is_empty());
    }

    #[test]
    fn test_roundtrip_mixed() {
        let data = b"the quick brown fox jumps over the lazy dog";
        assert_eq!(roundtrip(data), data);
    }

    #[test]
    fn test_roundtrip_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).cycle().take(2048).collect();
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn test_deterministic_table() {
        let data = b"deterministic tie-breaking matters here";
        let histogram = Histogram::of(data);
        assert_eq!(build_table(&histogram), build_table(&histogram));
    }

    #[test]
    fn test_prefix_free() {
        let data: Vec<u8> = b"abracadabra".repeat(7).iter().chain(b"xyz").copied().collect();
        let table = build_table(&Histogram::of(&data));
        let codes: Vec<&Vec<bool>> = table.values().collect();
        for (i, a) in codes.iter().enumerate() {
            for (j, b) in codes.iter().enumerate() {
                if i != j {
                    assert!(!b.starts_with(a), "code {a:?} is a prefix of {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_underrun_leaves_zero_tail() {
        let data = b"abab";
        let histogram = Histogram::of(data);
        let table = build_table(&histogram);
        let control = Control::new();
        let packed = pack(data, &table, &control, None).unwrap();
        // Claim more symbols than the payload holds.
        let decoded = decode(
            &histogram,
            &packed,
            16,
            &control,
            &ProgressSink::new(None),
        )
        .unwrap();
        assert_eq!(decoded.len(), 16);
        assert_eq!(&decoded[..4], data);
    }
}
