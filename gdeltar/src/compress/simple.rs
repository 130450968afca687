//! Sequential format producer.
//!
//! Workers stream-compress whole files into private temp files; the single
//! writer copies each temp file into the archive behind its entry header,
//! then patches the header's size and offset fields in place.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel::bounded;
use tempfile::NamedTempFile;

use crate::format::{self, SimpleEntry};
use crate::{temp, wire, Compression, Error, ProgressEvent};

use super::tasks::{FileTask, TaskList};
use super::{run_workers, CompressResult, Options, ResolvedMode, RunState};

const COPY_BUF_SIZE: usize = 32 * 1024;

/// A compressed file waiting for the writer.
struct Finished {
    relative_path: String,
    original_size: u64,
    compressed_size: u64,
    temp: NamedTempFile,
    _guard: temp::TempGuard,
}

pub(crate) fn temp_dir_for(output_path: &Path) -> PathBuf {
    match output_path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    }
}

/// Stream one source file through a zstd encoder into a temp file.
pub(crate) fn encode_to_temp(
    task: &FileTask,
    compression: &Compression,
    dictionary: Option<&[u8]>,
    temp_dir: &Path,
    state: &RunState,
) -> Result<(NamedTempFile, temp::TempGuard, u64, u64), Error> {
    let mut src = File::open(&task.source).map_err(|e| Error::io(&task.source, e))?;
    let mut temp_file =
        NamedTempFile::new_in(temp_dir).map_err(|e| Error::io(temp_dir, e))?;
    let guard = temp::TempGuard::register(temp_file.path());

    let mut encoder = match dictionary {
        Some(dictionary) if !dictionary.is_empty() => {
            compression.encoder_with_dictionary(temp_file.as_file_mut(), dictionary)?
        }
        _ => compression.encoder(temp_file.as_file_mut())?,
    };
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut original_size: u64 = 0;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::io(&task.source, err)),
        };
        encoder.write_all(&buf[..n]).map_err(Error::codec)?;
        original_size += n as u64;
        (state.progress)(ProgressEvent::FileProgress {
            path: task.relative_path.clone(),
            current: original_size,
            total: task.size,
        });
    }
    encoder.finish().map_err(Error::codec)?;
    let compressed_size = temp_file
        .as_file()
        .metadata()
        .map_err(|e| Error::io(temp_file.path(), e))?
        .len();
    Ok((temp_file, guard, original_size, compressed_size))
}

fn write_entry(out: &mut File, output_path: &Path, finished: &mut Finished) -> Result<(), Error> {
    let entry_pos = out
        .stream_position()
        .map_err(|e| Error::io(output_path, e))?;
    // Header first, with placeholder size and offset fields.
    format::write_simple_entry(
        out,
        &SimpleEntry {
            relative_path: finished.relative_path.clone(),
            original_size: finished.original_size,
            compressed_size: 0,
            data_offset: 0,
        },
    )?;
    let data_offset = out
        .stream_position()
        .map_err(|e| Error::io(output_path, e))?;
    finished
        .temp
        .as_file_mut()
        .seek(SeekFrom::Start(0))
        .map_err(|e| Error::io(finished.temp.path(), e))?;
    let copied = std::io::copy(finished.temp.as_file_mut(), out)
        .map_err(|e| Error::io(output_path, e))?;
    if copied != finished.compressed_size {
        return Err(Error::SizeMismatch {
            path: finished.relative_path.clone(),
            expected: finished.compressed_size,
            actual: copied,
        });
    }
    let end_pos = out
        .stream_position()
        .map_err(|e| Error::io(output_path, e))?;
    // Patch the two trailing header fields, which sit back to back.
    let patch_pos = entry_pos + 2 + finished.relative_path.len() as u64 + 8;
    out.seek(SeekFrom::Start(patch_pos))
        .map_err(|e| Error::io(output_path, e))?;
    wire::write_u64_le(out, copied).map_err(|e| Error::io(output_path, e))?;
    wire::write_u64_le(out, data_offset).map_err(|e| Error::io(output_path, e))?;
    out.seek(SeekFrom::Start(end_pos))
        .map_err(|e| Error::io(output_path, e))?;
    Ok(())
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
    let temp_dir = temp_dir_for(output_path);
    let state = RunState::new(progress);

    let mut out = File::create(output_path).map_err(|e| Error::io(output_path, e))?;
    format::write_simple_header(&mut out, 0).map_err(|e| Error::io(output_path, e))?;

    let mut files_written: u32 = 0;
    let mut total_original: u64 = 0;
    let mut total_compressed: u64 = 0;
    let mut writer_result: Result<(), Error> = Ok(());

    std::thread::scope(|scope| {
        let (result_tx, result_rx) = bounded::<Finished>(threads * 2);
        {
            let state = &state;
            let compression = &compression;
            let temp_dir = &temp_dir;
            scope.spawn(move || {
                let worker = |task: &FileTask| {
                    (state.progress)(ProgressEvent::FileStart {
                        path: task.relative_path.clone(),
                        total: task.size,
                    });
                    match encode_to_temp(task, compression, None, temp_dir, state) {
                        Ok((temp, guard, original_size, compressed_size)) => {
                            let _ = result_tx.send(Finished {
                                relative_path: task.relative_path.clone(),
                                original_size,
                                compressed_size,
                                temp,
                                _guard: guard,
                            });
                        }
                        Err(err) => state.record_error(&task.relative_path, err),
                    }
                };
                run_workers(tasks, threads, mode, &worker);
            });
        }
        // Single writer: drain even after a fatal error so workers never
        // block on a full channel.
        for mut finished in result_rx {
            if writer_result.is_err() {
                continue;
            }
            match write_entry(&mut out, output_path, &mut finished) {
                Ok(()) => {
                    files_written += 1;
                    total_original += finished.original_size;
                    total_compressed += finished.compressed_size;
                    (state.progress)(ProgressEvent::FileComplete {
                        path: finished.relative_path.clone(),
                        current: u64::from(files_written),
                        total: tasks.total_files,
                        compressed_size: finished.compressed_size,
                    });
                }
                Err(err) => writer_result = Err(err),
            }
        }
    });
    writer_result?;

    wire::write_token(&mut out, format::FOOTER_SIMPLE).map_err(|e| Error::io(output_path, e))?;
    // Patch the file count now that per-file failures are known.
    out.seek(SeekFrom::Start(8))
        .map_err(|e| Error::io(output_path, e))?;
    wire::write_u32_le(&mut out, files_written).map_err(|e| Error::io(output_path, e))?;
    out.flush().map_err(|e| Error::io(output_path, e))?;
    drop(out);

    let archive_size = std::fs::metadata(output_path)
        .map_err(|e| Error::io(output_path, e))?
        .len();
    Ok(CompressResult {
        files_processed: u64::from(files_written),
        total_original,
        total_compressed,
        archive_size,
        stats: None,
        errors: state.into_errors(),
    })
}
