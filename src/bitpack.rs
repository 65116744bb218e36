//! Bit-level packing of code sequences into byte buffers.
//!
//! Codes are emitted most-significant-bit first; a trailing partial byte
//! is left-shift-padded with zero bits. The padding is not self-describing,
//! which is why the original symbol count always travels with the payload.

use std::io;
use std::io::Read;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use crate::control::Control;
use crate::error::CompressError;
use crate::progress::ProgressSink;
use crate::CodeTable;

/// Pack every byte's code into a buffer, zero-padding the final byte.
///
/// The pause/cancel control is observed once per input byte. Progress, when
/// a sink is supplied, is reported every 1000 bytes.
pub fn pack(
    data: &[u8],
    table: &CodeTable,
    control: &Control,
    progress: Option<&ProgressSink<'_>>,
) -> Result<Vec<u8>, CompressError> {
    let mut writer = BitWriter::endian(Vec::new(), BigEndian);

    for (i, &byte) in data.iter().enumerate() {
        control.checkpoint()?;
        let code = table.get(&byte).ok_or_else(|| {
            CompressError::Format(format!("byte {byte:#04x} missing from code table"))
        })?;
        for &bit in code {
            writer.write_bit(bit)?;
        }
        if let Some(sink) = progress {
            if i % 1000 == 0 || i + 1 == data.len() {
                sink.report((i as u64 * 100 / data.len() as u64) as u8);
            }
        }
    }

    writer.byte_align()?;
    Ok(writer.into_writer())
}

/// Read the next bit, mapping end-of-stream to `None`.
pub(crate) fn next_bit<R: Read>(
    reader: &mut BitReader<R, BigEndian>,
) -> Result<Option<bool>, CompressError> {
    match reader.read_bit() {
        Ok(bit) => Ok(Some(bit)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(CompressError::Io(e)),
    }
}
