//! Dictionary format consumer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::format;
use crate::{wire, Error, ProgressEvent, ProgressSink};

use super::{prepare_target, safe_output_path, ExtractOptions, ExtractResult};

pub(super) fn extract(
    opts: &ExtractOptions,
    mut archive: File,
    progress: &ProgressSink,
) -> Result<ExtractResult, Error> {
    let header = format::read_dictionary_header(&mut archive)?;
    let dictionary = wire::read_bytes(&mut archive, header.dict_size as usize)
        .map_err(|e| Error::archive_read(&opts.archive_path, e))?;
    let mut decompressor = if dictionary.is_empty() {
        zstd::bulk::Decompressor::new().map_err(Error::codec)?
    } else {
        zstd::bulk::Decompressor::with_dictionary(&dictionary).map_err(Error::codec)?
    };

    (progress)(ProgressEvent::Start {
        total_files: u64::from(header.file_count),
        total_bytes: 0,
    });

    let mut result = ExtractResult::default();
    for _ in 0..header.file_count {
        let entry = format::read_dictionary_entry(&mut archive)?;
        (progress)(ProgressEvent::FileStart {
            path: entry.relative_path.clone(),
            total: entry.original_size,
        });

        // Each entry's payload size is explicit, so any per-file failure
        // can skip to the next entry with one seek.
        let payload_start = archive
            .stream_position()
            .map_err(|e| Error::io(&opts.archive_path, e))?;
        let payload_end = payload_start + entry.compressed_size;

        match restore_entry(opts, &mut archive, &entry, &mut decompressor) {
            Ok(written) => {
                result.files_written += 1;
                result.total_bytes += written;
                (progress)(ProgressEvent::FileComplete {
                    path: entry.relative_path.clone(),
                    current: result.files_written,
                    total: u64::from(header.file_count),
                    compressed_size: entry.compressed_size,
                });
            }
            Err(err) => {
                result.errors.push(err);
                (progress)(ProgressEvent::Error {
                    path: entry.relative_path.clone(),
                });
                archive
                    .seek(SeekFrom::Start(payload_end))
                    .map_err(|e| Error::io(&opts.archive_path, e))?;
            }
        }
    }

    wire::expect_token(&mut archive, format::FOOTER_DICTIONARY)?;
    Ok(result)
}

fn restore_entry(
    opts: &ExtractOptions,
    archive: &mut File,
    entry: &format::DictionaryEntry,
    decompressor: &mut zstd::bulk::Decompressor<'_>,
) -> Result<u64, Error> {
    let target = safe_output_path(&opts.output_dir, &entry.relative_path)?;
    prepare_target(&target, opts.overwrite)?;

    let mut frame = vec![0u8; entry.compressed_size as usize];
    archive
        .read_exact(&mut frame)
        .map_err(|e| Error::archive_read(&opts.archive_path, e))?;
    let data = decompressor
        .decompress(&frame, entry.original_size as usize)
        .map_err(Error::codec)?;
    if data.len() as u64 != entry.original_size {
        return Err(Error::SizeMismatch {
            path: entry.relative_path.clone(),
            expected: entry.original_size,
            actual: data.len() as u64,
        });
    }
    let mut out = File::create(&target).map_err(|e| Error::io(&target, e))?;
    out.write_all(&data).map_err(|e| Error::io(&target, e))?;
    Ok(data.len() as u64)
}
