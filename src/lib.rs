//! entropack: Huffman / Shannon-Fano file archiver.
//!
//! A static, per-file entropy coder with:
//! - two interchangeable code-table builders (Huffman, Shannon-Fano)
//! - parallel chunked compression of large inputs with strict
//!   index-order reassembly
//! - single-file and multi-file archive formats with random-access
//!   extraction of one entry
//! - an optional password envelope (PBKDF2 + AES-256-CBC) around the
//!   compressed payload
//! - cooperative pause/cancel and monotonic progress reporting threaded
//!   through every hot loop
//!
//! The archive stores each entry's byte histogram, not its code table;
//! both builders are deterministic, so the decoder regenerates the exact
//! table the encoder used.

pub mod archive;
pub mod bitpack;
pub mod chunks;
pub mod config;
pub mod control;
pub mod crypto;
pub mod error;
pub mod fano;
pub mod frequency;
pub mod huffman;
pub mod progress;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::archive::Signature;
use crate::config::CompressionConfig;
use crate::control::Control;
use crate::error::CompressError;
use crate::frequency::Histogram;
use crate::progress::{ProgressFn, ProgressSink};

/// Byte value → prefix-free bit-string.
pub type CodeTable = HashMap<u8, Vec<bool>>;

/// Sample size for compression-ratio estimation.
const ESTIMATE_SAMPLE: usize = 1024 * 1024;

/// Entropy coding algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Algorithm {
    Huffman,
    ShannonFano,
}

impl Algorithm {
    /// Build the deterministic, prefix-free code table for a histogram.
    pub fn build_table(&self, histogram: &Histogram) -> CodeTable {
        match self {
            Algorithm::Huffman => huffman::build_table(histogram),
            Algorithm::ShannonFano => fano::build_table(histogram),
        }
    }

    fn decode_payload(
        &self,
        histogram: &Histogram,
        payload: &[u8],
        orig_size: u64,
        control: &Control,
        progress: &ProgressSink<'_>,
    ) -> Result<Vec<u8>, CompressError> {
        match self {
            Algorithm::Huffman => huffman::decode(histogram, payload, orig_size, control, progress),
            Algorithm::ShannonFano => fano::decode(histogram, payload, orig_size, control, progress),
        }
    }
}

/// Outcome summary of one compression run.
#[derive(Debug, Clone)]
pub struct CompressReport {
    pub original_size: u64,
    pub compressed_size: u64,
    /// Space saved as a percentage of the original size.
    pub ratio: f64,
}

/// The archiver facade consumed by the UI layer.
pub struct Compressor {
    algorithm: Algorithm,
    config: CompressionConfig,
    last_ratio: Mutex<Option<f64>>,
}

struct PreparedEntry {
    name: String,
    orig_size: u64,
    histogram: Histogram,
    payload: Vec<u8>,
}

impl Compressor {
    pub fn new(algorithm: Algorithm, config: CompressionConfig) -> Self {
        Self {
            algorithm,
            config,
            last_ratio: Mutex::new(None),
        }
    }

    pub fn with_defaults(algorithm: Algorithm) -> Self {
        Self::new(algorithm, CompressionConfig::default())
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Ratio achieved by the most recent `compress_file` run, if any.
    pub fn compression_ratio(&self) -> Option<f64> {
        *self.last_ratio.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Compress one file into a single-file archive.
    pub fn compress_file(
        &self,
        input: &Path,
        output: &Path,
        password: Option<&str>,
        progress: Option<&ProgressFn<'_>>,
        control: &Control,
    ) -> Result<CompressReport, CompressError> {
        info!(?input, ?output, algorithm = ?self.algorithm, "compressing file");
        let sink = ProgressSink::new(progress);
        let name = file_name_of(input)?;

        control.checkpoint()?;
        let data = fs::read(input)?;
        sink.report(10);

        let histogram = Histogram::of(&data);
        let table = self.algorithm.build_table(&histogram);
        sink.report(20);

        let scaled = |p: u8| sink.report(20 + (u32::from(p) * 60 / 100) as u8);
        let chunk_sink = ProgressSink::new(Some(&scaled));
        let payload = chunks::compress_payload(&data, &table, &self.config, control, &chunk_sink)?;
        sink.report(80);

        let password = password.unwrap_or("");
        let protected = !password.is_empty();
        let payload = if protected {
            crypto::encrypt(&payload, password)?
        } else {
            payload
        };

        // The output file only comes into being once all compression work
        // has succeeded, so a cancelled run leaves nothing behind.
        control.checkpoint()?;
        let written = (|| -> Result<(), CompressError> {
            let mut writer = BufWriter::new(File::create(output)?);
            archive::write_signature(
                &mut writer,
                Signature {
                    algorithm: self.algorithm,
                    multi: false,
                },
            )?;
            archive::write_flag(&mut writer, protected)?;
            sink.report(90);
            archive::write_entry(&mut writer, &name, data.len() as u64, &histogram, &payload)?;
            writer.flush()?;
            Ok(())
        })();
        if written.is_err() {
            let _ = fs::remove_file(output);
        }
        written?;
        sink.report(95);

        let compressed_size = fs::metadata(output)?.len();
        let ratio = savings(data.len() as u64, compressed_size);
        *self.last_ratio.lock().unwrap_or_else(|e| e.into_inner()) = Some(ratio);
        sink.report(100);

        Ok(CompressReport {
            original_size: data.len() as u64,
            compressed_size,
            ratio,
        })
    }

    /// Decompress an archive to one file.
    ///
    /// The signature tag selects the decoding algorithm and the
    /// single/multi layout; a multi-file archive yields its first entry.
    pub fn decompress_file(
        &self,
        input: &Path,
        output: &Path,
        password: Option<&str>,
        progress: Option<&ProgressFn<'_>>,
        control: &Control,
    ) -> Result<(), CompressError> {
        info!(?input, ?output, "decompressing archive");
        let sink = ProgressSink::new(progress);
        let mut reader = BufReader::new(File::open(input)?);

        let signature = archive::read_signature(&mut reader)?;
        let protected = archive::read_flag(&mut reader)?;
        let password = password.unwrap_or("");
        if protected && password.is_empty() {
            return Err(CompressError::AccessDenied);
        }

        if signature.multi {
            let count = archive::read_entry_count(&mut reader)?;
            if count == 0 {
                return Err(CompressError::Format("archive holds no entries".into()));
            }
        }

        let header = archive::read_entry_header(&mut reader)?;
        let mut payload = archive::read_payload(&mut reader, header.payload_len)?;
        if protected {
            payload = crypto::decrypt(&payload, password)?;
        }

        let decoded = signature.algorithm.decode_payload(
            &header.histogram,
            &payload,
            header.orig_size,
            control,
            &sink,
        )?;

        control.checkpoint()?;
        fs::write(output, &decoded)?;
        sink.report(100);
        Ok(())
    }

    /// Compress many files into one multi-file archive.
    ///
    /// Files are processed in parallel but entries are written strictly
    /// in the caller-supplied order.
    pub fn compress_many(
        &self,
        files: &[(PathBuf, String)],
        output: &Path,
        password: Option<&str>,
        progress: Option<&ProgressFn<'_>>,
        control: &Control,
    ) -> Result<CompressReport, CompressError> {
        info!(count = files.len(), ?output, algorithm = ?self.algorithm, "building archive");
        let sink = ProgressSink::new(progress);
        let total = files.len().max(1);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers.max(1))
            .build()
            .map_err(|e| CompressError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

        let processed = AtomicUsize::new(0);
        let entries: Vec<PreparedEntry> = pool.install(|| {
            files
                .par_iter()
                .map(|(path, stored_name)| {
                    control.checkpoint()?;
                    let data = fs::read(path)?;
                    let histogram = Histogram::of(&data);
                    let table = self.algorithm.build_table(&histogram);
                    // Per-file progress is discarded; only the file count
                    // feeds the overall percentage.
                    let quiet = ProgressSink::new(None);
                    let payload =
                        chunks::compress_payload(&data, &table, &self.config, control, &quiet)?;
                    let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    sink.report((done * 80 / total) as u8);
                    Ok(PreparedEntry {
                        name: stored_name.clone(),
                        orig_size: data.len() as u64,
                        histogram,
                        payload,
                    })
                })
                .collect::<Result<Vec<_>, CompressError>>()
        })?;

        let password = password.unwrap_or("");
        let protected = !password.is_empty();
        let original_size: u64 = entries.iter().map(|e| e.orig_size).sum();

        control.checkpoint()?;
        let written = (|| -> Result<(), CompressError> {
            let mut writer = BufWriter::new(File::create(output)?);
            archive::write_signature(
                &mut writer,
                Signature {
                    algorithm: self.algorithm,
                    multi: true,
                },
            )?;
            archive::write_flag(&mut writer, protected)?;
            archive::write_entry_count(&mut writer, entries.len() as u32)?;

            for (i, entry) in entries.into_iter().enumerate() {
                control.checkpoint()?;
                let payload = if protected {
                    crypto::encrypt(&entry.payload, password)?
                } else {
                    entry.payload
                };
                archive::write_entry(
                    &mut writer,
                    &entry.name,
                    entry.orig_size,
                    &entry.histogram,
                    &payload,
                )?;
                sink.report((80 + (i + 1) * 20 / total) as u8);
            }
            writer.flush()?;
            Ok(())
        })();
        if written.is_err() {
            let _ = fs::remove_file(output);
        }
        written?;

        let compressed_size = fs::metadata(output)?.len();
        sink.report(100);
        Ok(CompressReport {
            original_size,
            compressed_size,
            ratio: savings(original_size, compressed_size),
        })
    }

    /// Extract one entry from a multi-file archive by name
    /// (case-insensitive). Returns the stored name.
    ///
    /// Non-target payloads are skipped by their stored length, without
    /// decryption or decoding.
    pub fn extract_one(
        &self,
        archive_path: &Path,
        target_name: &str,
        output: &Path,
        password: Option<&str>,
        progress: Option<&ProgressFn<'_>>,
        control: &Control,
    ) -> Result<String, CompressError> {
        info!(?archive_path, target_name, "extracting entry");
        let sink = ProgressSink::new(progress);
        let mut reader = BufReader::new(File::open(archive_path)?);

        let signature = archive::read_signature(&mut reader)?;
        if !signature.multi {
            return Err(CompressError::Format(
                "not a multi-file archive".into(),
            ));
        }
        let protected = archive::read_flag(&mut reader)?;
        let password = password.unwrap_or("");
        if protected && password.is_empty() {
            return Err(CompressError::AccessDenied);
        }

        let count = archive::read_entry_count(&mut reader)?;
        for i in 0..count {
            control.checkpoint()?;
            let header = archive::read_entry_header(&mut reader)?;
            if !header.name.eq_ignore_ascii_case(target_name) {
                archive::skip_payload(&mut reader, header.payload_len)?;
                sink.report(((i + 1) as u64 * 50 / u64::from(count)) as u8);
                continue;
            }

            let mut payload = archive::read_payload(&mut reader, header.payload_len)?;
            if protected {
                payload = crypto::decrypt(&payload, password)?;
            }
            let scaled = |p: u8| sink.report(50 + p / 2);
            let decode_sink = ProgressSink::new(Some(&scaled));
            let decoded = signature.algorithm.decode_payload(
                &header.histogram,
                &payload,
                header.orig_size,
                control,
                &decode_sink,
            )?;

            control.checkpoint()?;
            fs::write(output, &decoded)?;
            sink.report(100);
            return Ok(header.name);
        }

        Err(CompressError::NotFound(target_name.to_string()))
    }

    /// List stored entry names of a multi-file archive, in write order.
    pub fn list_entries(
        &self,
        archive_path: &Path,
        password: Option<&str>,
    ) -> Result<Vec<String>, CompressError> {
        debug!(?archive_path, "listing archive entries");
        let mut reader = BufReader::new(File::open(archive_path)?);

        let signature = archive::read_signature(&mut reader)?;
        if !signature.multi {
            return Err(CompressError::Format(
                "not a multi-file archive".into(),
            ));
        }
        let protected = archive::read_flag(&mut reader)?;
        if protected && password.unwrap_or("").is_empty() {
            return Err(CompressError::AccessDenied);
        }

        let count = archive::read_entry_count(&mut reader)?;
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let header = archive::read_entry_header(&mut reader)?;
            archive::skip_payload(&mut reader, header.payload_len)?;
            names.push(header.name);
        }
        Ok(names)
    }

    /// Estimate the achievable compression ratio from the first 1 MiB of
    /// a file, without writing anything.
    pub fn estimate_ratio(&self, input: &Path) -> Result<f64, CompressError> {
        let data = fs::read(input)?;
        let sample = &data[..data.len().min(ESTIMATE_SAMPLE)];
        if sample.is_empty() {
            return Ok(0.0);
        }

        let table = self.algorithm.build_table(&Histogram::of(sample));
        let original_bits = (sample.len() as u64) * 8;
        let compressed_bits: u64 = sample
            .iter()
            .map(|b| table.get(b).map_or(0, |code| code.len() as u64))
            .sum();
        Ok((original_bits - compressed_bits) as f64 / original_bits as f64 * 100.0)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::with_defaults(Algorithm::Huffman)
    }
}

fn file_name_of(path: &Path) -> Result<String, CompressError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CompressError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path {path:?} has no file name"),
            ))
        })
}

fn savings(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - compressed as f64) / original as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_quick_roundtrip_both_algorithms() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.txt");
        let data = b"a quick facade-level roundtrip".repeat(20);
        fs::write(&input, &data).unwrap();

        for algorithm in [Algorithm::Huffman, Algorithm::ShannonFano] {
            let compressor = Compressor::with_defaults(algorithm);
            let packed = dir.path().join(format!("{algorithm:?}.epk"));
            let restored = dir.path().join(format!("{algorithm:?}.out"));
            let control = Control::new();

            let report = compressor
                .compress_file(&input, &packed, None, None, &control)
                .unwrap();
            assert_eq!(report.original_size, data.len() as u64);
            compressor
                .decompress_file(&packed, &restored, None, None, &control)
                .unwrap();
            assert_eq!(fs::read(&restored).unwrap(), data);
        }
    }

    #[test]
    fn test_compression_ratio_recorded() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.bin");
        fs::write(&input, vec![b'z'; 50_000]).unwrap();

        let compressor = Compressor::default();
        assert!(compressor.compression_ratio().is_none());
        let report = compressor
            .compress_file(
                &input,
                &dir.path().join("out.epk"),
                None,
                None,
                &Control::new(),
            )
            .unwrap();
        assert_eq!(compressor.compression_ratio(), Some(report.ratio));
        assert!(report.ratio > 0.0, "uniform data should compress well");
    }

    #[test]
    fn test_estimate_ratio_repetitive_data() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("sample.txt");
        fs::write(&input, b"aaaaaaaabb".repeat(1000)).unwrap();

        let compressor = Compressor::default();
        let estimate = compressor.estimate_ratio(&input).unwrap();
        assert!(estimate > 50.0, "skewed data should estimate high: {estimate}");
    }

    #[test]
    fn test_estimate_ratio_empty_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("empty");
        fs::write(&input, b"").unwrap();
        let compressor = Compressor::default();
        assert_eq!(compressor.estimate_ratio(&input).unwrap(), 0.0);
    }
}
