//! Dictionary format producer.
//!
//! Three phases: train a shared dictionary over the input, write it behind
//! the header, then compress every file as an independent frame encoded
//! against the dictionary. Workers hand temp files to the single writer
//! like the sequential format, but entry headers carry their final sizes
//! up front.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crossbeam_channel::bounded;
use tempfile::NamedTempFile;

use crate::format::{self, DictionaryEntry, DictionaryHeader};
use crate::{temp, wire, Compression, Error, ProgressEvent};

use super::tasks::{FileTask, TaskList};
use super::{run_workers, trainer, CompressResult, Options, ResolvedMode, RunState};

struct Finished {
    relative_path: String,
    original_size: u64,
    compressed_size: u64,
    temp: NamedTempFile,
    _guard: temp::TempGuard,
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
    let temp_dir = super::simple::temp_dir_for(output_path);
    let state = RunState::new(progress);

    let dictionary = trainer::train(tasks);

    let mut out = File::create(output_path).map_err(|e| Error::io(output_path, e))?;
    format::write_dictionary_header(
        &mut out,
        &DictionaryHeader {
            dict_size: dictionary.len() as u32,
            file_count: 0,
        },
    )
    .map_err(|e| Error::io(output_path, e))?;
    wire::write_bytes(&mut out, &dictionary).map_err(|e| Error::io(output_path, e))?;

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
            let dictionary = &dictionary;
            scope.spawn(move || {
                let worker = |task: &FileTask| {
                    (state.progress)(ProgressEvent::FileStart {
                        path: task.relative_path.clone(),
                        total: task.size,
                    });
                    match super::simple::encode_to_temp(
                        task,
                        compression,
                        Some(dictionary.as_slice()),
                        temp_dir,
                        state,
                    ) {
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

    wire::write_token(&mut out, format::FOOTER_DICTIONARY)
        .map_err(|e| Error::io(output_path, e))?;
    out.seek(SeekFrom::Start(format::FILE_COUNT_FIELD_OFFSET))
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

fn write_entry(out: &mut File, output_path: &Path, finished: &mut Finished) -> Result<(), Error> {
    format::write_dictionary_entry(
        out,
        &DictionaryEntry {
            relative_path: finished.relative_path.clone(),
            original_size: finished.original_size,
            compressed_size: finished.compressed_size,
        },
    )?;
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
    Ok(())
}
