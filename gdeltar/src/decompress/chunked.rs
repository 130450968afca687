//! Chunked format consumer.
//!
//! Loads the chunk index into a map, then reassembles each file by seeking
//! to its chunks in the body region. One zstd decompressor is reused for
//! every chunk; constructing a fresh one per chunk dominates runtime at
//! small chunk sizes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::format;
use crate::{ChunkInfo, Error, FileMetadata, HashSum, ProgressEvent, ProgressSink};

use super::{prepare_target, safe_output_path, ExtractOptions, ExtractResult};

pub(super) fn extract(
    opts: &ExtractOptions,
    mut archive: File,
    progress: &ProgressSink,
) -> Result<ExtractResult, Error> {
    let header = format::read_chunked_header(&mut archive)?;
    let index = format::read_chunked_index(&mut archive, header.unique_chunk_count)?;
    let chunk_map: HashMap<HashSum, ChunkInfo> =
        index.into_iter().map(|info| (info.hash, info)).collect();

    let mut files = Vec::with_capacity(header.file_count as usize);
    for _ in 0..header.file_count {
        files.push(format::read_file_metadata(&mut archive)?);
    }
    let body_start = archive
        .stream_position()
        .map_err(|e| Error::io(&opts.archive_path, e))?;

    (progress)(ProgressEvent::Start {
        total_files: u64::from(header.file_count),
        total_bytes: files.iter().map(|f| f.original_size).sum(),
    });

    let mut result = ExtractResult::default();
    let mut decompressor = zstd::bulk::Decompressor::new().map_err(Error::codec)?;
    let mut frame_buf: Vec<u8> = Vec::new();

    for metadata in &files {
        (progress)(ProgressEvent::FileStart {
            path: metadata.relative_path.clone(),
            total: metadata.original_size,
        });
        match rebuild_file(
            opts,
            &mut archive,
            body_start,
            &chunk_map,
            metadata,
            &mut decompressor,
            &mut frame_buf,
            progress,
        ) {
            Ok(written) => {
                result.files_written += 1;
                result.total_bytes += written;
                (progress)(ProgressEvent::FileComplete {
                    path: metadata.relative_path.clone(),
                    current: result.files_written,
                    total: u64::from(header.file_count),
                    compressed_size: 0,
                });
            }
            Err(err) => {
                result.errors.push(err);
                (progress)(ProgressEvent::Error {
                    path: metadata.relative_path.clone(),
                });
            }
        }
    }
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn rebuild_file(
    opts: &ExtractOptions,
    archive: &mut File,
    body_start: u64,
    chunk_map: &HashMap<HashSum, ChunkInfo>,
    metadata: &FileMetadata,
    decompressor: &mut zstd::bulk::Decompressor<'_>,
    frame_buf: &mut Vec<u8>,
    progress: &ProgressSink,
) -> Result<u64, Error> {
    let target = safe_output_path(&opts.output_dir, &metadata.relative_path)?;
    prepare_target(&target, opts.overwrite)?;
    let mut out = File::create(&target).map_err(|e| Error::io(&target, e))?;

    let mut written: u64 = 0;
    for hash in &metadata.chunk_hashes {
        let info = match chunk_map.get(hash) {
            Some(info) => info,
            None => {
                drop(out);
                let _ = std::fs::remove_file(&target);
                return Err(Error::MissingChunk(*hash));
            }
        };
        match rebuild_chunk(opts, archive, body_start, info, decompressor, frame_buf, &target, &mut out) {
            Ok(len) => {
                written += len;
                (progress)(ProgressEvent::FileProgress {
                    path: metadata.relative_path.clone(),
                    current: written,
                    total: metadata.original_size,
                });
            }
            Err(err) => {
                drop(out);
                let _ = std::fs::remove_file(&target);
                return Err(err);
            }
        }
    }
    if written != metadata.original_size {
        drop(out);
        let _ = std::fs::remove_file(&target);
        return Err(Error::SizeMismatch {
            path: metadata.relative_path.clone(),
            expected: metadata.original_size,
            actual: written,
        });
    }
    Ok(written)
}

#[allow(clippy::too_many_arguments)]
fn rebuild_chunk(
    opts: &ExtractOptions,
    archive: &mut File,
    body_start: u64,
    info: &ChunkInfo,
    decompressor: &mut zstd::bulk::Decompressor<'_>,
    frame_buf: &mut Vec<u8>,
    target: &std::path::Path,
    out: &mut File,
) -> Result<u64, Error> {
    archive
        .seek(SeekFrom::Start(body_start + info.offset))
        .map_err(|e| Error::io(&opts.archive_path, e))?;
    frame_buf.resize(info.compressed_size as usize, 0);
    archive
        .read_exact(frame_buf)
        .map_err(|e| Error::archive_read(&opts.archive_path, e))?;
    let data = decompressor
        .decompress(frame_buf, info.original_size as usize)
        .map_err(Error::codec)?;
    if data.len() as u64 != info.original_size {
        return Err(Error::SizeMismatch {
            path: format!("chunk {}", info.hash),
            expected: info.original_size,
            actual: data.len() as u64,
        });
    }
    out.write_all(&data).map_err(|e| Error::io(target, e))?;
    Ok(data.len() as u64)
}
