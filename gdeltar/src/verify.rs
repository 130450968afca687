//! Archive verification.
//!
//! Structural mode walks headers, entries and the footer without touching
//! payload bytes; data mode additionally re-decodes every payload. Neither
//! mode fails on corruption: everything found lands in the report and
//! `is_valid()` sums it up.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use crate::format::{self, Format};
use crate::{wire, Error, HashSum, ProgressEvent, ProgressSink};

/// Verification configuration.
#[derive(Clone, Debug)]
pub struct VerifyOptions {
    pub archive_path: PathBuf,
    /// Re-decode every payload instead of only walking the structure.
    pub verify_data: bool,
}

/// Everything a verification pass learned about an archive.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub format: Option<Format>,
    pub header_valid: bool,
    pub footer_valid: bool,
    /// False when entries could not be walked to the end.
    pub structure_valid: bool,
    pub file_count: u64,
    pub empty_files: u64,
    pub duplicate_paths: u64,
    /// Chunk references across all files (chunked format).
    pub total_chunks: u64,
    pub unique_chunks: u64,
    /// Hashes referenced by files but absent from the index.
    pub missing_chunks: u64,
    /// Index entries no file references.
    pub orphan_chunks: u64,
    /// Average chunk size echoed from the header.
    pub avg_chunk_size: u64,
    pub data_checked: bool,
    pub corrupt_files: u64,
    pub corrupt_chunks: u64,
    /// True when an I/O error interrupted the walk.
    pub io_error: bool,
    pub errors: Vec<String>,
}

impl VerifyReport {
    /// True when the structure parsed, nothing was inconsistent and the
    /// data pass (when run) found no corruption.
    pub fn is_valid(&self) -> bool {
        self.header_valid
            && self.footer_valid
            && self.structure_valid
            && self.missing_chunks == 0
            && self.duplicate_paths == 0
            && self.corrupt_files == 0
            && self.corrupt_chunks == 0
            && !self.io_error
    }

    fn note(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Verify an archive, returning a report.
///
/// Only failing to open the archive is an error; corruption of any kind is
/// reported through the returned [`VerifyReport`].
pub fn verify(opts: &VerifyOptions, progress: &ProgressSink) -> Result<VerifyReport, Error> {
    let mut file = File::open(&opts.archive_path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::MissingInput(opts.archive_path.clone())
        } else {
            Error::io(&opts.archive_path, err)
        }
    })?;

    let mut report = VerifyReport {
        data_checked: opts.verify_data,
        ..VerifyReport::default()
    };
    let detected = match format::detect(&opts.archive_path, &mut file) {
        Ok(detected) => detected,
        Err(err) => {
            report.note(format!("{}", err));
            return Ok(report);
        }
    };
    report.format = Some(detected);
    debug!(
        "verifying {} as {} (data={})",
        opts.archive_path.display(),
        detected,
        opts.verify_data
    );

    match detected {
        Format::Simple => verify_simple(opts, &mut file, &mut report, progress),
        Format::Chunked => verify_chunked(opts, &mut file, &mut report, progress),
        Format::Dictionary => verify_dictionary(opts, &mut file, &mut report, progress),
        Format::Zip => verify_zip(opts, &mut report),
        Format::TarXz => verify_tar_xz(opts, &mut report),
    }
    Ok(report)
}

/// Stream-decode one payload, returning the decoded byte count.
fn decode_counted(file: &mut File, compressed_size: u64) -> Result<u64, Error> {
    let mut decoder = zstd::stream::Decoder::new(file.by_ref().take(compressed_size))
        .map_err(Error::codec)?;
    std::io::copy(&mut decoder, &mut std::io::sink()).map_err(Error::codec)
}

fn check_footer(path: &Path, file: &mut File, token: &[u8], report: &mut VerifyReport) {
    let result = (|| -> Result<bool, std::io::Error> {
        let len = file.metadata()?.len();
        if len < token.len() as u64 {
            return Ok(false);
        }
        file.seek(SeekFrom::Start(len - token.len() as u64))?;
        let mut read = vec![0u8; token.len()];
        file.read_exact(&mut read)?;
        Ok(read == token)
    })();
    match result {
        Ok(true) => report.footer_valid = true,
        Ok(false) => report.note("footer token missing or damaged"),
        Err(err) => {
            report.io_error = true;
            report.note(format!("i/o error reading footer of {}: {}", path.display(), err));
        }
    }
}

fn verify_simple(
    opts: &VerifyOptions,
    file: &mut File,
    report: &mut VerifyReport,
    progress: &ProgressSink,
) {
    let file_count = match format::read_simple_header(file) {
        Ok(count) => {
            report.header_valid = true;
            count
        }
        Err(err) => {
            report.note(format!("bad header: {}", err));
            return;
        }
    };
    (progress)(ProgressEvent::Start {
        total_files: u64::from(file_count),
        total_bytes: 0,
    });

    let mut paths: HashSet<String> = HashSet::new();
    report.structure_valid = true;
    for _ in 0..file_count {
        let entry = match format::read_simple_entry(file) {
            Ok(entry) => entry,
            Err(err) => {
                report.structure_valid = false;
                report.note(format!("bad file entry: {}", err));
                break;
            }
        };
        report.file_count += 1;
        if entry.original_size == 0 {
            report.empty_files += 1;
        }
        if !paths.insert(entry.relative_path.clone()) {
            report.duplicate_paths += 1;
            report.note(format!("duplicate path {}", entry.relative_path));
        }

        if opts.verify_data {
            match decode_counted(file, entry.compressed_size) {
                Ok(decoded) if decoded == entry.original_size => {}
                Ok(decoded) => {
                    report.corrupt_files += 1;
                    report.note(format!(
                        "{}: decoded {} bytes, expected {}",
                        entry.relative_path, decoded, entry.original_size
                    ));
                }
                Err(err) => {
                    report.corrupt_files += 1;
                    report.note(format!("{}: {}", entry.relative_path, err));
                }
            }
        }
        // Decoding may have stopped short of the payload end; re-anchor.
        if let Err(err) = file.seek(SeekFrom::Start(entry.data_offset + entry.compressed_size)) {
            report.io_error = true;
            report.note(format!("i/o error: {}", err));
            return;
        }
    }

    if report.structure_valid {
        if let Err(err) = wire::expect_token(file, format::FOOTER_SIMPLE) {
            report.note(format!("bad footer: {}", err));
        } else {
            report.footer_valid = true;
        }
    } else {
        check_footer(&opts.archive_path, file, format::FOOTER_SIMPLE, report);
    }
}

fn verify_chunked(
    opts: &VerifyOptions,
    file: &mut File,
    report: &mut VerifyReport,
    progress: &ProgressSink,
) {
    let header = match format::read_chunked_header(file) {
        Ok(header) => {
            report.header_valid = true;
            header
        }
        Err(err) => {
            report.note(format!("bad header: {}", err));
            return;
        }
    };
    report.avg_chunk_size = header.avg_chunk_size;
    report.unique_chunks = u64::from(header.unique_chunk_count);
    (progress)(ProgressEvent::Start {
        total_files: u64::from(header.file_count),
        total_bytes: 0,
    });

    let index = match format::read_chunked_index(file, header.unique_chunk_count) {
        Ok(index) => index,
        Err(err) => {
            report.note(format!("bad chunk index: {}", err));
            check_footer(&opts.archive_path, file, format::FOOTER_CHUNKED, report);
            return;
        }
    };
    let chunk_map: HashMap<HashSum, &crate::ChunkInfo> =
        index.iter().map(|info| (info.hash, info)).collect();

    let mut paths: HashSet<String> = HashSet::new();
    let mut referenced: HashSet<HashSum> = HashSet::new();
    report.structure_valid = true;
    for _ in 0..header.file_count {
        let metadata = match format::read_file_metadata(file) {
            Ok(metadata) => metadata,
            Err(err) => {
                report.structure_valid = false;
                report.note(format!("bad file record: {}", err));
                break;
            }
        };
        report.file_count += 1;
        if metadata.original_size == 0 && metadata.chunk_hashes.is_empty() {
            // Zero-length files legitimately reference no chunks.
            report.empty_files += 1;
        }
        if !paths.insert(metadata.relative_path.clone()) {
            report.duplicate_paths += 1;
            report.note(format!("duplicate path {}", metadata.relative_path));
        }
        report.total_chunks += metadata.chunk_hashes.len() as u64;
        for hash in &metadata.chunk_hashes {
            if chunk_map.contains_key(hash) {
                referenced.insert(*hash);
            } else {
                report.missing_chunks += 1;
                report.note(format!(
                    "{} references missing chunk {}",
                    metadata.relative_path, hash
                ));
            }
        }
    }
    report.orphan_chunks = index
        .iter()
        .filter(|info| !referenced.contains(&info.hash))
        .count() as u64;
    if report.orphan_chunks > 0 {
        report.note(format!("{} orphaned chunks in index", report.orphan_chunks));
    }

    let body_start = match file.stream_position() {
        Ok(position) => position,
        Err(err) => {
            report.io_error = true;
            report.note(format!("i/o error: {}", err));
            return;
        }
    };

    if opts.verify_data && report.structure_valid {
        let mut decompressor = match zstd::bulk::Decompressor::new() {
            Ok(decompressor) => decompressor,
            Err(err) => {
                report.note(format!("decoder setup failed: {}", err));
                return;
            }
        };
        let mut frame = Vec::new();
        for info in &index {
            let ok = (|| -> Result<bool, std::io::Error> {
                file.seek(SeekFrom::Start(body_start + info.offset))?;
                frame.resize(info.compressed_size as usize, 0);
                file.read_exact(&mut frame)?;
                match decompressor.decompress(&frame, info.original_size as usize) {
                    // The index stores each chunk's content hash, so data
                    // mode can prove the decoded bytes, not just their
                    // length.
                    Ok(data) => Ok(data.len() as u64 == info.original_size
                        && HashSum::digest(&data) == info.hash),
                    Err(_) => Ok(false),
                }
            })();
            match ok {
                Ok(true) => {}
                Ok(false) => {
                    report.corrupt_chunks += 1;
                    report.note(format!("corrupt chunk {}", info.hash));
                }
                Err(err) => {
                    // Reading past the body end means a truncated archive,
                    // a structural problem rather than a host I/O failure.
                    if err.kind() == std::io::ErrorKind::UnexpectedEof {
                        report.corrupt_chunks += 1;
                        report.note(format!("chunk {} extends past archive end", info.hash));
                    } else {
                        report.io_error = true;
                        report.note(format!("i/o error: {}", err));
                        return;
                    }
                }
            }
        }
    }

    check_footer(&opts.archive_path, file, format::FOOTER_CHUNKED, report);
}

fn verify_dictionary(
    opts: &VerifyOptions,
    file: &mut File,
    report: &mut VerifyReport,
    progress: &ProgressSink,
) {
    let header = match format::read_dictionary_header(file) {
        Ok(header) => {
            report.header_valid = true;
            header
        }
        Err(err) => {
            report.note(format!("bad header: {}", err));
            return;
        }
    };
    let dictionary = match wire::read_bytes(file, header.dict_size as usize) {
        Ok(dictionary) => dictionary,
        Err(_) => {
            report.note("dictionary bytes truncated");
            check_footer(&opts.archive_path, file, format::FOOTER_DICTIONARY, report);
            return;
        }
    };
    (progress)(ProgressEvent::Start {
        total_files: u64::from(header.file_count),
        total_bytes: 0,
    });

    let mut decompressor = None;
    if opts.verify_data {
        let built = if dictionary.is_empty() {
            zstd::bulk::Decompressor::new()
        } else {
            zstd::bulk::Decompressor::with_dictionary(&dictionary)
        };
        match built {
            Ok(d) => decompressor = Some(d),
            Err(err) => {
                report.note(format!("decoder setup failed: {}", err));
                return;
            }
        }
    }

    let mut paths: HashSet<String> = HashSet::new();
    report.structure_valid = true;
    for _ in 0..header.file_count {
        let entry = match format::read_dictionary_entry(file) {
            Ok(entry) => entry,
            Err(err) => {
                report.structure_valid = false;
                report.note(format!("bad file entry: {}", err));
                break;
            }
        };
        report.file_count += 1;
        if entry.original_size == 0 {
            report.empty_files += 1;
        }
        if !paths.insert(entry.relative_path.clone()) {
            report.duplicate_paths += 1;
            report.note(format!("duplicate path {}", entry.relative_path));
        }

        if let Some(decompressor) = decompressor.as_mut() {
            let mut frame = vec![0u8; entry.compressed_size as usize];
            match file.read_exact(&mut frame) {
                Ok(()) => match decompressor.decompress(&frame, entry.original_size as usize) {
                    Ok(data) if data.len() as u64 == entry.original_size => {}
                    _ => {
                        report.corrupt_files += 1;
                        report.note(format!("{}: corrupt payload", entry.relative_path));
                    }
                },
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    report.structure_valid = false;
                    report.note(format!("{}: payload truncated", entry.relative_path));
                    break;
                }
                Err(err) => {
                    report.io_error = true;
                    report.note(format!("i/o error: {}", err));
                    return;
                }
            }
        } else if let Err(err) = file.seek(SeekFrom::Current(entry.compressed_size as i64)) {
            report.io_error = true;
            report.note(format!("i/o error: {}", err));
            return;
        }
    }

    if report.structure_valid {
        if let Err(err) = wire::expect_token(file, format::FOOTER_DICTIONARY) {
            report.note(format!("bad footer: {}", err));
        } else {
            report.footer_valid = true;
        }
    } else {
        check_footer(&opts.archive_path, file, format::FOOTER_DICTIONARY, report);
    }
}

/// The collaborator formats get a light validity pass: structure is
/// whatever their own readers accept.
fn verify_zip(opts: &VerifyOptions, report: &mut VerifyReport) {
    let parts = crate::ext::discover_parts(&opts.archive_path);
    if let Err(err) = zip_part_check(&parts, opts.verify_data, report) {
        report.note(err);
    }
}

fn zip_part_check(parts: &[PathBuf], verify_data: bool, report: &mut VerifyReport) -> Result<(), String> {
    for part in parts {
        let file = File::open(part).map_err(|e| format!("{}: {}", part.display(), e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
        report.header_valid = true;
        report.footer_valid = true;
        report.structure_valid = true;
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| e.to_string())?;
            if entry.is_dir() {
                continue;
            }
            report.file_count += 1;
            if entry.size() == 0 {
                report.empty_files += 1;
            }
            if verify_data {
                let mut sink = std::io::sink();
                if std::io::copy(&mut entry, &mut sink).is_err() {
                    report.corrupt_files += 1;
                    report.note(format!("corrupt entry {}", entry.name()));
                }
            }
        }
    }
    Ok(())
}

fn verify_tar_xz(opts: &VerifyOptions, report: &mut VerifyReport) {
    let parts = crate::ext::discover_parts(&opts.archive_path);
    for part in &parts {
        let run = (|| -> Result<(), String> {
            let file = File::open(part).map_err(|e| format!("{}: {}", part.display(), e))?;
            let mut archive = tar::Archive::new(xz2::read::XzDecoder::new(file));
            for entry in archive.entries().map_err(|e| e.to_string())? {
                let mut entry = entry.map_err(|e| e.to_string())?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                report.file_count += 1;
                if entry.header().size().unwrap_or(0) == 0 {
                    report.empty_files += 1;
                }
                if opts.verify_data {
                    let mut sink = std::io::sink();
                    std::io::copy(&mut entry, &mut sink).map_err(|e| e.to_string())?;
                }
            }
            Ok(())
        })();
        match run {
            Ok(()) => {
                report.header_valid = true;
                report.footer_valid = true;
                report.structure_valid = true;
            }
            Err(err) => {
                report.note(err);
                return;
            }
        }
    }
}
