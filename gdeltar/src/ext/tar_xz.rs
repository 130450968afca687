//! tar + XZ collaborator output.

use std::fs::File;
use std::path::Path;

use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::compress::{CompressResult, FileTask, Options, TaskList};
use crate::decompress::{ExtractOptions, ExtractResult};
use crate::{Error, ProgressEvent, ProgressSink};

use super::{discover_parts, part_path, partition_folders};

/// XZ presets stop at 9; higher configured levels clamp down.
fn xz_preset(level: u32) -> u32 {
    level.min(9)
}

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
            handles.push(scope.spawn(move || write_part(&path, bucket, xz_preset(opts.level), state)));
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

/// Write one independent `<base>_NN.tar.xz`.
fn write_part(
    path: &Path,
    files: &[&FileTask],
    preset: u32,
    state: &crate::compress::RunState,
) -> Result<(u64, u64), Error> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let encoder = XzEncoder::new(file, preset);
    let mut builder = tar::Builder::new(encoder);

    let mut total_original = 0;
    for task in files {
        (state.progress)(ProgressEvent::FileStart {
            path: task.relative_path.clone(),
            total: task.size,
        });
        match append_file(&mut builder, task) {
            Ok(written) => {
                total_original += written;
                (state.progress)(ProgressEvent::FileComplete {
                    path: task.relative_path.clone(),
                    current: 0,
                    total: task.size,
                    compressed_size: 0,
                });
            }
            // A failed tar entry poisons the stream layout; the whole part
            // fails rather than silently losing files.
            Err(err) => return Err(err),
        }
    }
    builder
        .into_inner()
        .map_err(|e| Error::io(path, e))?
        .finish()
        .map_err(|e| Error::io(path, e))?;

    let compressed = std::fs::metadata(path)
        .map_err(|e| Error::io(path, e))?
        .len();
    Ok((total_original, compressed))
}

fn append_file(
    builder: &mut tar::Builder<XzEncoder<File>>,
    task: &FileTask,
) -> Result<u64, Error> {
    let src = File::open(&task.source).map_err(|e| Error::io(&task.source, e))?;
    let size = src
        .metadata()
        .map_err(|e| Error::io(&task.source, e))?
        .len();
    let mut header = tar::Header::new_gnu();
    header.set_size(size);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, &task.relative_path, src)
        .map_err(|e| Error::io(&task.source, e))?;
    Ok(size)
}

pub(crate) fn extract(
    opts: &ExtractOptions,
    progress: &ProgressSink,
) -> Result<ExtractResult, Error> {
    let mut result = ExtractResult::default();
    for part in discover_parts(&opts.archive_path) {
        let file = File::open(&part).map_err(|e| Error::io(&part, e))?;
        let mut archive = tar::Archive::new(XzDecoder::new(file));
        let entries = archive
            .entries()
            .map_err(|e| Error::Codec(e.to_string()))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| Error::Codec(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = match entry.path() {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(err) => return Err(Error::Codec(err.to_string())),
            };
            (progress)(ProgressEvent::FileStart {
                path: name.clone(),
                total: entry.header().size().unwrap_or(0),
            });
            let target = match crate::decompress::safe_output_path(&opts.output_dir, &name) {
                Ok(target) => target,
                Err(err) => {
                    result.errors.push(err);
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
                        compressed_size: 0,
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
