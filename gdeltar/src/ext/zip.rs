//! ZIP collaborator output.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions as FileOptions;
use zip::CompressionMethod;

use crate::compress::{CompressResult, FileTask, Options, TaskList};
use crate::decompress::{ExtractOptions, ExtractResult};
use crate::{Error, ProgressEvent, ProgressSink};

use super::{discover_parts, part_path, partition_folders};

const COPY_BUF_SIZE: usize = 32 * 1024;

pub(crate) fn compress(
    opts: &Options,
    tasks: &TaskList,
    output_path: &Path,
    threads: usize,
    progress: &ProgressSink,
) -> Result<CompressResult, Error> {
    let buckets = partition_folders(tasks, threads);
    let state = crate::compress::RunState::new(progress);

    let mut part_sizes: Vec<Result<(u64, u64), Error>> = Vec::new();
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for (index, bucket) in buckets.iter().enumerate() {
            let path = part_path(output_path, index as u32 + 1);
            let state = &state;
            handles.push(scope.spawn(move || write_part(&path, bucket, opts.level, state)));
        }
        part_sizes = handles.into_iter().map(|h| h.join().unwrap()).collect();
    });

    let mut total_original = 0;
    let mut archive_size = 0;
    for part in part_sizes {
        let (original, compressed) = part?;
        total_original += original;
        archive_size += compressed;
    }
    let files_processed = tasks.total_files - state.errors.lock().unwrap().len() as u64;

    Ok(CompressResult {
        files_processed,
        total_original,
        total_compressed: archive_size,
        archive_size,
        stats: None,
        errors: state.into_errors(),
    })
}

/// Write one independent `<base>_NN.zip`.
fn write_part(
    path: &Path,
    files: &[&FileTask],
    level: u32,
    state: &crate::compress::RunState,
) -> Result<(u64, u64), Error> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = zip::ZipWriter::new(file);
    // Level 1 means stored, everything above deflates.
    let method = if level <= 1 {
        FileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level as i64))
    };
    let options = method.unix_permissions(0o644).large_file(true);

    let mut total_original = 0;
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    for task in files {
        (state.progress)(ProgressEvent::FileStart {
            path: task.relative_path.clone(),
            total: task.size,
        });
        match append_file(&mut writer, options, task, &mut buf, state) {
            Ok(written) => total_original += written,
            Err(err) => {
                let _ = writer.abort_file();
                state.record_error(&task.relative_path, err);
            }
        }
    }
    writer
        .finish()
        .map_err(|e| Error::Codec(e.to_string()))?
        .flush()
        .map_err(|e| Error::io(path, e))?;

    let compressed = std::fs::metadata(path)
        .map_err(|e| Error::io(path, e))?
        .len();
    Ok((total_original, compressed))
}

fn append_file(
    writer: &mut zip::ZipWriter<File>,
    options: FileOptions,
    task: &FileTask,
    buf: &mut [u8],
    state: &crate::compress::RunState,
) -> Result<u64, Error> {
    let mut src = File::open(&task.source).map_err(|e| Error::io(&task.source, e))?;
    writer
        .start_file(task.relative_path.as_str(), options)
        .map_err(|e| Error::Codec(e.to_string()))?;
    let mut written: u64 = 0;
    loop {
        let n = match src.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::io(&task.source, err)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| Error::Codec(e.to_string()))?;
        written += n as u64;
        (state.progress)(ProgressEvent::FileProgress {
            path: task.relative_path.clone(),
            current: written,
            total: task.size,
        });
    }
    Ok(written)
}

pub(crate) fn extract(
    opts: &ExtractOptions,
    progress: &ProgressSink,
) -> Result<ExtractResult, Error> {
    let mut result = ExtractResult::default();
    for part in discover_parts(&opts.archive_path) {
        let file = File::open(&part).map_err(|e| Error::io(&part, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::Codec(e.to_string()))?;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| Error::Codec(e.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_owned();
            (progress)(ProgressEvent::FileStart {
                path: name.clone(),
                total: entry.size(),
            });
            let target = match entry.enclosed_name() {
                Some(relative) => opts.output_dir.join(relative),
                None => {
                    result.errors.push(Error::UnsafePath(name.clone()));
                    (progress)(ProgressEvent::Error { path: name });
                    continue;
                }
            };
            if let Err(err) = crate::decompress::prepare_target(&target, opts.overwrite) {
                result.errors.push(err);
                (progress)(ProgressEvent::Error { path: name });
                continue;
            }
            let mut out = File::create(&target).map_err(|e| Error::io(&target, e))?;
            match std::io::copy(&mut entry, &mut out) {
                Ok(written) => {
                    result.files_written += 1;
                    result.total_bytes += written;
                    (progress)(ProgressEvent::FileComplete {
                        path: name,
                        current: result.files_written,
                        total: 0,
                        compressed_size: entry.compressed_size(),
                    });
                }
                Err(err) => {
                    let _ = std::fs::remove_file(&target);
                    result.errors.push(Error::Codec(err.to_string()));
                    (progress)(ProgressEvent::Error { path: name });
                }
            }
        }
    }
    Ok(result)
}
