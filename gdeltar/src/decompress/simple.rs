//! Sequential format consumer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::format;
use crate::{wire, Error, ProgressEvent, ProgressSink};

use super::{prepare_target, safe_output_path, ExtractOptions, ExtractResult};

pub(super) fn extract(
    opts: &ExtractOptions,
    mut archive: File,
    progress: &ProgressSink,
) -> Result<ExtractResult, Error> {
    let file_count = format::read_simple_header(&mut archive)?;
    let mut result = ExtractResult::default();
    (progress)(ProgressEvent::Start {
        total_files: u64::from(file_count),
        total_bytes: 0,
    });

    for _ in 0..file_count {
        // A failure to parse an entry header leaves the stream position
        // meaningless, so it aborts the whole run.
        let entry = format::read_simple_entry(&mut archive)?;
        let payload_end = entry.data_offset + entry.compressed_size;
        (progress)(ProgressEvent::FileStart {
            path: entry.relative_path.clone(),
            total: entry.original_size,
        });

        let skip = |archive: &mut File| -> Result<(), Error> {
            archive
                .seek(SeekFrom::Start(payload_end))
                .map_err(|e| Error::io(&opts.archive_path, e))?;
            Ok(())
        };

        let target = match safe_output_path(&opts.output_dir, &entry.relative_path) {
            Ok(target) => target,
            Err(err) => {
                result.errors.push(err);
                (progress)(ProgressEvent::Error {
                    path: entry.relative_path.clone(),
                });
                skip(&mut archive)?;
                continue;
            }
        };
        if let Err(err) = prepare_target(&target, opts.overwrite) {
            result.errors.push(err);
            (progress)(ProgressEvent::Error {
                path: entry.relative_path.clone(),
            });
            skip(&mut archive)?;
            continue;
        }

        match decode_payload(&mut archive, &target, entry.compressed_size) {
            Ok(written) if written == entry.original_size => {
                result.files_written += 1;
                result.total_bytes += written;
                (progress)(ProgressEvent::FileComplete {
                    path: entry.relative_path.clone(),
                    current: result.files_written,
                    total: u64::from(file_count),
                    compressed_size: entry.compressed_size,
                });
            }
            Ok(written) => {
                let _ = std::fs::remove_file(&target);
                result.errors.push(Error::SizeMismatch {
                    path: entry.relative_path.clone(),
                    expected: entry.original_size,
                    actual: written,
                });
                (progress)(ProgressEvent::Error {
                    path: entry.relative_path.clone(),
                });
            }
            Err(err) => {
                let _ = std::fs::remove_file(&target);
                result.errors.push(err);
                (progress)(ProgressEvent::Error {
                    path: entry.relative_path.clone(),
                });
                // Re-anchor at the absolute end of this payload; if that
                // fails the position really is untrusted.
                skip(&mut archive)?;
            }
        }
    }

    wire::expect_token(&mut archive, format::FOOTER_SIMPLE)?;
    Ok(result)
}

/// Decode exactly `compressed_size` archive bytes into the target file.
fn decode_payload(archive: &mut File, target: &std::path::Path, compressed_size: u64) -> Result<u64, Error> {
    let mut out = File::create(target).map_err(|e| Error::io(target, e))?;
    let mut decoder =
        zstd::stream::Decoder::new(archive.by_ref().take(compressed_size)).map_err(Error::codec)?;
    let written = std::io::copy(&mut decoder, &mut out).map_err(Error::codec)?;
    // Leave the archive positioned at the payload end even if the frame
    // ended early.
    let mut rest = decoder.finish();
    std::io::copy(&mut rest, &mut std::io::sink()).map_err(Error::codec)?;
    Ok(written)
}
