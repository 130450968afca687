//! Chunked, deduplicating format producer.
//!
//! Workers run the content-defined chunker over their files and offer each
//! chunk to the shared store. New chunks are compressed in-memory and
//! appended to a shared body temp file under a short mutex; duplicates cost
//! nothing. Finalization writes header, chunk index and file records, then
//! splices the body file in.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::debug;
use tempfile::NamedTempFile;

use crate::chunker::{self, SplitError};
use crate::format::{self, ChunkedHeader};
use crate::{
    max_chunks_for_budget, temp, wire, ChunkStore, Compression, Error, FileMetadata,
    ProgressEvent, VerifiedChunk,
};

use super::tasks::{FileTask, TaskList};
use super::{run_workers, CompressResult, Options, ResolvedMode, RunState};

/// Shared append-only chunk body. Real runs append to a temp file; dry runs
/// only advance an estimated offset.
enum BodySink {
    File {
        inner: Mutex<BodyFile>,
        _guard: temp::TempGuard,
    },
    Estimate(AtomicU64),
}

struct BodyFile {
    file: NamedTempFile,
    offset: u64,
}

impl BodySink {
    /// Append one compressed frame, returning its offset.
    fn append(&self, frame: &[u8]) -> Result<u64, Error> {
        match self {
            BodySink::File { inner, .. } => {
                let mut body = inner.lock().unwrap();
                let offset = body.offset;
                body.file
                    .as_file_mut()
                    .write_all(frame)
                    .map_err(|e| Error::io(body.file.path(), e))?;
                body.offset += frame.len() as u64;
                Ok(offset)
            }
            BodySink::Estimate(offset) => {
                Ok(offset.fetch_add(frame.len() as u64, Ordering::Relaxed))
            }
        }
    }
    /// Advance the offset without writing, for dry runs.
    fn advance(&self, len: u64) -> u64 {
        match self {
            BodySink::File { inner, .. } => {
                let mut body = inner.lock().unwrap();
                let offset = body.offset;
                body.offset += len;
                offset
            }
            BodySink::Estimate(offset) => offset.fetch_add(len, Ordering::Relaxed),
        }
    }
}

pub(super) fn compress(
    opts: &Options,
    tasks: &TaskList,
    output_path: &Path,
    threads: usize,
    mode: ResolvedMode,
    progress: &crate::ProgressSink,
) -> Result<CompressResult, Error> {
    let compression = Compression::try_new(opts.level)?;
    let chunker_config = chunker::Config::from_avg_size(opts.chunk_size as usize);
    let max_chunks = match opts.chunk_store_size_mb {
        0 => 0,
        mb => max_chunks_for_budget(mb * 1024 * 1024, opts.chunk_size),
    };
    let store = ChunkStore::new(max_chunks);
    let state = RunState::new(progress);
    let metadata_list: Mutex<Vec<FileMetadata>> = Mutex::new(Vec::new());

    let temp_dir = super::simple::temp_dir_for(output_path);
    let body = if opts.dry_run {
        BodySink::Estimate(AtomicU64::new(0))
    } else {
        let file = NamedTempFile::new_in(&temp_dir).map_err(|e| Error::io(&temp_dir, e))?;
        let guard = temp::TempGuard::register(file.path());
        BodySink::File {
            inner: Mutex::new(BodyFile { file, offset: 0 }),
            _guard: guard,
        }
    };
    let dry_run = opts.dry_run;
    let processed = AtomicU64::new(0);

    let worker = |task: &FileTask| {
        (state.progress)(ProgressEvent::FileStart {
            path: task.relative_path.clone(),
            total: task.size,
        });
        match chunk_one(task, &chunker_config, &compression, &store, &body, dry_run, &state) {
            Ok(metadata) => {
                (state.progress)(ProgressEvent::FileComplete {
                    path: task.relative_path.clone(),
                    current: processed.fetch_add(1, Ordering::Relaxed) + 1,
                    total: tasks.total_files,
                    compressed_size: 0,
                });
                metadata_list.lock().unwrap().push(metadata);
            }
            Err(err) => state.record_error(&task.relative_path, err),
        }
    };
    run_workers(tasks, threads, mode, &worker);

    let metadata_list = metadata_list.into_inner().unwrap();
    let stats = store.stats();
    let total_original: u64 = metadata_list.iter().map(|m| m.original_size).sum();
    debug!(
        "chunked {} files into {} chunks ({} unique, {} deduplicated)",
        metadata_list.len(),
        stats.total_seen,
        stats.unique,
        stats.deduped
    );

    let (archive_size, total_compressed) = match body {
        BodySink::Estimate(offset) => (0, offset.into_inner()),
        BodySink::File { inner, _guard } => {
            let body = inner.into_inner().unwrap();
            let size = finalize(
                opts,
                output_path,
                &store,
                &metadata_list,
                body,
            )?;
            (size, size)
        }
    };

    Ok(CompressResult {
        files_processed: metadata_list.len() as u64,
        total_original,
        total_compressed,
        archive_size,
        stats: Some(stats),
        errors: state.into_errors(),
    })
}

/// Chunk, deduplicate and compress one file, producing its metadata record.
fn chunk_one(
    task: &FileTask,
    chunker_config: &chunker::Config,
    compression: &Compression,
    store: &ChunkStore,
    body: &BodySink,
    dry_run: bool,
    state: &RunState,
) -> Result<FileMetadata, Error> {
    let src = File::open(&task.source).map_err(|e| Error::io(&task.source, e))?;
    let mut chunk_hashes = Vec::new();
    let mut original_size: u64 = 0;

    let mut consume = |chunk: VerifiedChunk| -> Result<(), Error> {
        let chunk_size = chunk.len() as u64;
        let (info, _is_new) = store.get_or_add(*chunk.hash(), chunk_size, || {
            if dry_run {
                // Assume a 2:1 ratio; close enough for the dedup estimate.
                let estimate = (chunk_size / 2).max(1);
                return Ok((body.advance(estimate), estimate));
            }
            let frame = compression.compress(chunk.data())?;
            let offset = body.append(&frame)?;
            Ok((offset, frame.len() as u64))
        })?;
        chunk_hashes.push(info.hash);
        original_size += chunk_size;
        (state.progress)(ProgressEvent::FileProgress {
            path: task.relative_path.clone(),
            current: original_size,
            total: task.size,
        });
        Ok(())
    };

    if task.size <= chunker_config.max_chunk_size as u64 {
        // A file this small yields at most one chunk; the eager form skips
        // the incremental buffer management.
        let chunks =
            chunker::split(chunker_config, src).map_err(|e| Error::io(&task.source, e))?;
        for chunk in chunks {
            consume(chunk)?;
        }
    } else {
        // Streaming keeps peak memory at one chunk regardless of file size.
        match chunker::split_streaming(chunker_config, src, consume) {
            Ok(()) => {}
            Err(SplitError::Read(err)) => return Err(Error::io(&task.source, err)),
            Err(SplitError::Consumer(err)) => return Err(err),
        }
    }

    Ok(FileMetadata {
        relative_path: task.relative_path.clone(),
        original_size,
        chunk_hashes,
    })
}

/// Assemble the final archive: header, index, file records, body, footer.
fn finalize(
    opts: &Options,
    output_path: &Path,
    store: &ChunkStore,
    metadata_list: &[FileMetadata],
    mut body: BodyFile,
) -> Result<u64, Error> {
    let chunks = store.snapshot_all();
    let mut out = File::create(output_path).map_err(|e| Error::io(output_path, e))?;
    format::write_chunked_header(
        &mut out,
        &ChunkedHeader {
            avg_chunk_size: opts.chunk_size,
            file_count: metadata_list.len() as u32,
            unique_chunk_count: chunks.len() as u32,
        },
    )
    .map_err(|e| Error::io(output_path, e))?;
    format::write_chunk_index(&mut out, &chunks).map_err(|e| Error::io(output_path, e))?;
    for metadata in metadata_list {
        format::write_file_metadata(&mut out, metadata)?;
    }
    body.file
        .as_file_mut()
        .flush()
        .map_err(|e| Error::io(body.file.path(), e))?;
    body.file
        .as_file_mut()
        .seek(SeekFrom::Start(0))
        .map_err(|e| Error::io(body.file.path(), e))?;
    std::io::copy(body.file.as_file_mut(), &mut out).map_err(|e| Error::io(output_path, e))?;
    wire::write_token(&mut out, format::FOOTER_CHUNKED).map_err(|e| Error::io(output_path, e))?;
    out.flush().map_err(|e| Error::io(output_path, e))?;
    drop(out);
    drop(body);

    Ok(std::fs::metadata(output_path)
        .map_err(|e| Error::io(output_path, e))?
        .len())
}
