//! The on-disk archive format.
//!
//! All integers are little-endian and fixed width; tags and names are
//! length-prefixed. A single-file archive is `tag flag name orig_size
//! histogram payload_len payload`; a multi-file archive is `tag flag
//! entry_count` followed by that many `name orig_size histogram
//! payload_len payload` entries. The histogram travels with every entry
//! so the decoder can rebuild the exact code table; the payload is the
//! packed (optionally encrypted) bit-stream.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::CompressError;
use crate::frequency::Histogram;
use crate::Algorithm;

pub const TAG_HUFFMAN: &[u8] = b"HUFFMAN";
pub const TAG_HUFFMAN_MULTI: &[u8] = b"HUFFMAN_MULTI";
pub const TAG_FANO: &[u8] = b"FANO";
pub const TAG_FANO_MULTI: &[u8] = b"FANO_MULTI";

/// What an archive's leading tag says about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub algorithm: Algorithm,
    pub multi: bool,
}

impl Signature {
    fn tag(&self) -> &'static [u8] {
        match (self.algorithm, self.multi) {
            (Algorithm::Huffman, false) => TAG_HUFFMAN,
            (Algorithm::Huffman, true) => TAG_HUFFMAN_MULTI,
            (Algorithm::ShannonFano, false) => TAG_FANO,
            (Algorithm::ShannonFano, true) => TAG_FANO_MULTI,
        }
    }
}

/// The structural fields of one entry, read without touching its payload.
#[derive(Debug)]
pub struct EntryHeader {
    pub name: String,
    pub orig_size: u64,
    pub histogram: Histogram,
    pub payload_len: u64,
}

fn read_exact_checked<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), CompressError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CompressError::Format("archive truncated".into())
        } else {
            CompressError::Io(e)
        }
    })
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16, CompressError> {
    let mut buf = [0u8; 2];
    read_exact_checked(reader, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, CompressError> {
    let mut buf = [0u8; 4];
    read_exact_checked(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, CompressError> {
    let mut buf = [0u8; 8];
    read_exact_checked(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn write_signature<W: Write>(writer: &mut W, signature: Signature) -> io::Result<()> {
    let tag = signature.tag();
    writer.write_all(&[tag.len() as u8])?;
    writer.write_all(tag)
}

pub fn read_signature<R: Read>(reader: &mut R) -> Result<Signature, CompressError> {
    let mut len = [0u8; 1];
    read_exact_checked(reader, &mut len)?;
    let mut tag = vec![0u8; len[0] as usize];
    read_exact_checked(reader, &mut tag)?;

    let signature = match tag.as_slice() {
        t if t == TAG_HUFFMAN => Signature { algorithm: Algorithm::Huffman, multi: false },
        t if t == TAG_HUFFMAN_MULTI => Signature { algorithm: Algorithm::Huffman, multi: true },
        t if t == TAG_FANO => Signature { algorithm: Algorithm::ShannonFano, multi: false },
        t if t == TAG_FANO_MULTI => Signature { algorithm: Algorithm::ShannonFano, multi: true },
        _ => return Err(CompressError::Format("unrecognized archive signature".into())),
    };
    Ok(signature)
}

pub fn write_flag<W: Write>(writer: &mut W, protected: bool) -> io::Result<()> {
    writer.write_all(&[u8::from(protected)])
}

pub fn read_flag<R: Read>(reader: &mut R) -> Result<bool, CompressError> {
    let mut buf = [0u8; 1];
    read_exact_checked(reader, &mut buf)?;
    Ok(buf[0] != 0)
}

pub fn write_entry_count<W: Write>(writer: &mut W, count: u32) -> io::Result<()> {
    writer.write_all(&count.to_le_bytes())
}

pub fn read_entry_count<R: Read>(reader: &mut R) -> Result<u32, CompressError> {
    read_u32(reader)
}

/// Serialize one entry: name, original size, histogram, then the
/// length-prefixed payload.
pub fn write_entry<W: Write>(
    writer: &mut W,
    name: &str,
    orig_size: u64,
    histogram: &Histogram,
    payload: &[u8],
) -> Result<(), CompressError> {
    let name_len: u16 = name
        .len()
        .try_into()
        .map_err(|_| CompressError::Format(format!("entry name too long: {name:?}")))?;
    writer.write_all(&name_len.to_le_bytes())?;
    writer.write_all(name.as_bytes())?;
    writer.write_all(&orig_size.to_le_bytes())?;

    writer.write_all(&(histogram.distinct() as u16).to_le_bytes())?;
    for (symbol, count) in histogram.iter() {
        writer.write_all(&[symbol])?;
        writer.write_all(&count.to_le_bytes())?;
    }

    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Read the structural fields of the next entry, leaving the reader
/// positioned at the first payload byte.
pub fn read_entry_header<R: Read>(reader: &mut R) -> Result<EntryHeader, CompressError> {
    let name_len = read_u16(reader)? as usize;
    let mut name_buf = vec![0u8; name_len];
    read_exact_checked(reader, &mut name_buf)?;
    let name = String::from_utf8(name_buf)
        .map_err(|_| CompressError::Format("entry name is not valid UTF-8".into()))?;

    let orig_size = read_u64(reader)?;

    let hist_count = read_u16(reader)?;
    if hist_count > 256 {
        return Err(CompressError::Format(format!(
            "histogram claims {hist_count} symbols"
        )));
    }
    let mut histogram = Histogram::new();
    for _ in 0..hist_count {
        let mut symbol = [0u8; 1];
        read_exact_checked(reader, &mut symbol)?;
        let count = read_u64(reader)?;
        histogram.set(symbol[0], count);
    }

    let payload_len = read_u64(reader)?;
    Ok(EntryHeader {
        name,
        orig_size,
        histogram,
        payload_len,
    })
}

/// Materialize an entry's payload.
pub fn read_payload<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>, CompressError> {
    let mut payload = Vec::new();
    reader.take(len).read_to_end(&mut payload)?;
    if payload.len() as u64 != len {
        return Err(CompressError::Format("archive truncated".into()));
    }
    Ok(payload)
}

/// Skip an entry's payload using its stored length, without reading it.
pub fn skip_payload<R: Seek>(reader: &mut R, len: u64) -> Result<(), CompressError> {
    let offset = i64::try_from(len)
        .map_err(|_| CompressError::Format("payload length out of range".into()))?;
    reader.seek(SeekFrom::Current(offset))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_signature_roundtrip_all_variants() {
        for algorithm in [Algorithm::Huffman, Algorithm::ShannonFano] {
            for multi in [false, true] {
                let signature = Signature { algorithm, multi };
                let mut buf = Vec::new();
                write_signature(&mut buf, signature).unwrap();
                let parsed = read_signature(&mut Cursor::new(&buf)).unwrap();
                assert_eq!(parsed, signature);
            }
        }
    }

    #[test]
    fn test_unknown_signature_is_format_error() {
        let mut buf = Vec::new();
        buf.push(4);
        buf.extend_from_slice(b"GZIP");
        assert!(matches!(
            read_signature(&mut Cursor::new(&buf)),
            Err(CompressError::Format(_))
        ));
    }

    #[test]
    fn test_truncated_signature_is_format_error() {
        let buf = [7u8, b'H', b'U'];
        assert!(matches!(
            read_signature(&mut Cursor::new(&buf[..])),
            Err(CompressError::Format(_))
        ));
    }

    #[test]
    fn test_entry_roundtrip() {
        let histogram = Histogram::of(b"aaaab");
        let payload = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let mut buf = Vec::new();
        write_entry(&mut buf, "notes.txt", 5, &histogram, &payload).unwrap();

        let mut cursor = Cursor::new(&buf);
        let header = read_entry_header(&mut cursor).unwrap();
        assert_eq!(header.name, "notes.txt");
        assert_eq!(header.orig_size, 5);
        assert_eq!(header.histogram, histogram);
        assert_eq!(header.payload_len, 4);
        assert_eq!(read_payload(&mut cursor, header.payload_len).unwrap(), payload);
    }

    #[test]
    fn test_skip_payload_lands_on_next_entry() {
        let histogram = Histogram::of(b"xy");
        let mut buf = Vec::new();
        write_entry(&mut buf, "first", 2, &histogram, &[1, 2, 3]).unwrap();
        write_entry(&mut buf, "second", 2, &histogram, &[4, 5]).unwrap();

        let mut cursor = Cursor::new(&buf);
        let first = read_entry_header(&mut cursor).unwrap();
        skip_payload(&mut cursor, first.payload_len).unwrap();
        let second = read_entry_header(&mut cursor).unwrap();
        assert_eq!(second.name, "second");
        assert_eq!(read_payload(&mut cursor, second.payload_len).unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_truncated_payload_is_format_error() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        assert!(matches!(
            read_payload(&mut cursor, 10),
            Err(CompressError::Format(_))
        ));
    }

    #[test]
    fn test_flag_roundtrip() {
        let mut buf = Vec::new();
        write_flag(&mut buf, true).unwrap();
        write_flag(&mut buf, false).unwrap();
        let mut cursor = Cursor::new(&buf);
        assert!(read_flag(&mut cursor).unwrap());
        assert!(!read_flag(&mut cursor).unwrap());
    }
}
