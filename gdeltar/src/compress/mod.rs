//! Parallel compression pipeline.
//!
//! Enumerates the input into folder-grouped tasks, picks a scheduling
//! strategy, runs a fixed worker pool and assembles the final archive
//! through a single writer. Workers never touch the output file directly;
//! they hand results over through temp files (sequential and dictionary
//! formats) or the shared chunk body file (chunked format).
mod chunked;
mod dictionary;
mod simple;
pub mod tasks;
pub mod trainer;

pub use tasks::{enumerate, FileTask, FolderTask, TaskList};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;

use crossbeam_channel::bounded;
use log::{debug, info, warn};

use crate::{memory, Compression, Error, ProgressEvent, ProgressSink, StoreStats};

/// Smallest accepted average chunk size.
pub const MIN_CHUNK_SIZE: u64 = 4 * 1024;
/// Largest accepted average chunk size.
pub const MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Extra per-worker memory assumed on top of the input share.
const THREAD_MEMORY_HEADROOM: u64 = 50 * 1024 * 1024;

/// Worker scheduling strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// Pick folder mode when there are many folders relative to the worker
    /// count, file mode otherwise.
    #[default]
    Auto,
    /// One shared queue of folders; a worker owns a whole folder at a time.
    Folder,
    /// Per-worker queues; files are routed so a folder's files share a
    /// worker.
    File,
}

/// Compression run configuration.
#[derive(Clone, Debug)]
pub struct Options {
    /// Root of the tree to enumerate. Used when `files` is empty.
    pub input_path: PathBuf,
    /// Explicit mix of files and directories, bypassing `input_path`.
    pub files: Vec<PathBuf>,
    /// Destination archive path. A known extension is appended if missing.
    pub output_path: PathBuf,
    /// Worker count. 0 means one per logical CPU.
    pub max_threads: usize,
    /// Compression level. 1..=22 for zstd output, 1..=9 for zip.
    pub level: u32,
    /// Average chunk size for the deduplicating format. 0 disables chunking.
    pub chunk_size: u64,
    /// Chunk cache bound in MiB. 0 means unlimited.
    pub chunk_store_size_mb: u64,
    /// Per-worker memory budget in bytes. 0 derives one from the input
    /// size. Advisory only; exceeding system RAM logs a warning.
    pub max_thread_memory: u64,
    pub parallelism: Parallelism,
    /// Write independent per-worker ZIP archives instead.
    pub use_zip: bool,
    /// Write independent per-worker tar.xz archives instead.
    pub use_xz: bool,
    /// Train a shared dictionary and write the dictionary format.
    pub use_dictionary: bool,
    /// Honor `.gitignore` files while enumerating.
    pub use_gitignore: bool,
    /// Compute statistics without producing archive bytes.
    pub dry_run: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            files: Vec::new(),
            output_path: PathBuf::new(),
            max_threads: 0,
            level: 5,
            chunk_size: 0,
            chunk_store_size_mb: 0,
            max_thread_memory: 0,
            parallelism: Parallelism::Auto,
            use_zip: false,
            use_xz: false,
            use_dictionary: false,
            use_gitignore: false,
            dry_run: false,
            verbose: false,
            quiet: false,
        }
    }
}

/// Outcome of one compression run.
#[derive(Debug, Default)]
pub struct CompressResult {
    pub files_processed: u64,
    pub total_original: u64,
    pub total_compressed: u64,
    /// Final archive size on disk. 0 for dry runs.
    pub archive_size: u64,
    /// Deduplication counters, present for the chunked format.
    pub stats: Option<StoreStats>,
    /// Per-file errors; the run continued past them.
    pub errors: Vec<Error>,
}

fn validate(opts: &Options) -> Result<(), Error> {
    if opts.use_zip && opts.chunk_size > 0 {
        return Err(Error::InvalidInput("zip output cannot be chunked".into()));
    }
    if opts.use_xz && opts.chunk_size > 0 {
        return Err(Error::InvalidInput("xz output cannot be chunked".into()));
    }
    if opts.use_dictionary && opts.chunk_size > 0 {
        return Err(Error::InvalidInput(
            "dictionary output cannot be chunked".into(),
        ));
    }
    if opts.use_dictionary && (opts.use_zip || opts.use_xz) {
        return Err(Error::InvalidInput(
            "dictionary output cannot be combined with zip or xz".into(),
        ));
    }
    if opts.use_zip && opts.use_xz {
        return Err(Error::InvalidInput(
            "zip and xz outputs are mutually exclusive".into(),
        ));
    }
    if opts.use_zip {
        if !(1..=9).contains(&opts.level) {
            return Err(Error::InvalidInput(format!(
                "zip level {} not within 1..=9",
                opts.level
            )));
        }
    } else {
        // Validates the zstd range and warns on slow levels.
        Compression::try_new(opts.level)?;
    }
    if opts.chunk_size > 0 && !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&opts.chunk_size) {
        return Err(Error::InvalidInput(format!(
            "chunk size {} not within {}..{}",
            opts.chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
        )));
    }
    Ok(())
}

/// Append the extension matching the output format unless it is already
/// there.
fn resolve_output_path(opts: &Options) -> PathBuf {
    let name = opts
        .output_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let extension = if opts.use_zip {
        "zip"
    } else if opts.use_xz {
        "tar.xz"
    } else {
        "gda"
    };
    if name.ends_with(&format!(".{}", extension)) {
        return opts.output_path.clone();
    }
    let mut name = name.to_owned();
    name.push('.');
    name.push_str(extension);
    opts.output_path.with_file_name(name)
}

fn resolve_threads(opts: &Options) -> usize {
    match opts.max_threads {
        0 => num_cpus::get().max(1),
        n => n,
    }
}

/// Warn when the derived per-worker budget cannot fit in RAM.
fn check_memory_budget(opts: &Options, tasks: &TaskList, threads: usize) {
    let per_thread = match opts.max_thread_memory {
        0 => tasks.total_bytes / threads as u64 + THREAD_MEMORY_HEADROOM,
        explicit => explicit,
    };
    if let Some(total) = memory::total_memory_bytes() {
        if per_thread.saturating_mul(threads as u64) > total {
            warn!(
                "estimated worker memory {} bytes across {} threads exceeds system RAM {} bytes",
                per_thread, threads, total
            );
        }
    }
}

/// Scheduling strategy after resolving `Auto`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResolvedMode {
    Folder,
    File,
}

pub(crate) fn resolve_mode(opts: &Options, tasks: &TaskList, threads: usize) -> ResolvedMode {
    match opts.parallelism {
        Parallelism::Folder => ResolvedMode::Folder,
        Parallelism::File => ResolvedMode::File,
        Parallelism::Auto => {
            if tasks.top_level_folders >= 2 * threads {
                ResolvedMode::Folder
            } else {
                ResolvedMode::File
            }
        }
    }
}

fn folder_affinity(folder: &str, threads: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    folder.hash(&mut hasher);
    (hasher.finish() % threads as u64) as usize
}

/// Run `worker` over every file task using the chosen strategy.
///
/// Folder mode drains a single shared queue of folders. File mode gives
/// each worker its own queue and routes a folder's files to the same
/// worker, so related files keep their code-path and buffer locality.
/// Blocks until all workers are done.
pub(crate) fn run_workers<W>(tasks: &TaskList, threads: usize, mode: ResolvedMode, worker: &W)
where
    W: Fn(&FileTask) + Send + Sync,
{
    std::thread::scope(|scope| match mode {
        ResolvedMode::Folder => {
            let (task_tx, task_rx) = bounded::<&FolderTask>(threads * 2);
            for _ in 0..threads {
                let task_rx = task_rx.clone();
                scope.spawn(move || {
                    for folder in task_rx {
                        for file in &folder.files {
                            worker(file);
                        }
                    }
                });
            }
            drop(task_rx);
            for folder in &tasks.folders {
                if task_tx.send(folder).is_err() {
                    break;
                }
            }
            drop(task_tx);
        }
        ResolvedMode::File => {
            let mut senders = Vec::with_capacity(threads);
            for _ in 0..threads {
                let (file_tx, file_rx) = bounded::<&FileTask>(threads * 4);
                senders.push(file_tx);
                scope.spawn(move || {
                    for file in file_rx {
                        worker(file);
                    }
                });
            }
            for folder in &tasks.folders {
                let target = folder_affinity(&folder.folder, threads);
                for file in &folder.files {
                    if senders[target].send(file).is_err() {
                        break;
                    }
                }
            }
            drop(senders);
        }
    });
}

/// Shared per-run mutable state for collecting worker outcomes.
pub(crate) struct RunState {
    pub errors: Mutex<Vec<Error>>,
    pub progress: ProgressSink,
}

impl RunState {
    pub fn new(progress: &ProgressSink) -> Self {
        Self {
            errors: Mutex::new(Vec::new()),
            progress: progress.clone(),
        }
    }
    pub fn record_error(&self, path: &str, error: Error) {
        debug!("failed to process {}: {}", path, error);
        (self.progress)(ProgressEvent::Error {
            path: path.to_owned(),
        });
        self.errors.lock().unwrap().push(error);
    }
    pub fn into_errors(self) -> Vec<Error> {
        self.errors.into_inner().unwrap()
    }
}

/// Compress the configured input into an archive.
pub fn compress(opts: &Options, progress: &ProgressSink) -> Result<CompressResult, Error> {
    validate(opts)?;
    let tasks = enumerate(opts)?;
    let threads = resolve_threads(opts);
    let mode = resolve_mode(opts, &tasks, threads);
    check_memory_budget(opts, &tasks, threads);

    if !opts.quiet {
        info!(
            "compressing {} files ({} bytes) with {} workers in {:?} mode",
            tasks.total_files, tasks.total_bytes, threads, mode
        );
    }
    (progress)(ProgressEvent::Start {
        total_files: tasks.total_files,
        total_bytes: tasks.total_bytes,
    });

    let output_path = resolve_output_path(opts);
    let result = if opts.use_zip {
        if opts.dry_run {
            Ok(dry_run_estimate(&tasks))
        } else {
            crate::ext::zip::compress(opts, &tasks, &output_path, threads, progress)
        }
    } else if opts.use_xz {
        if opts.dry_run {
            Ok(dry_run_estimate(&tasks))
        } else {
            crate::ext::tar_xz::compress(opts, &tasks, &output_path, threads, progress)
        }
    } else if opts.use_dictionary {
        if opts.dry_run {
            Ok(dry_run_estimate(&tasks))
        } else {
            dictionary::compress(opts, &tasks, &output_path, threads, mode, progress)
        }
    } else if opts.chunk_size > 0 {
        chunked::compress(opts, &tasks, &output_path, threads, mode, progress)
    } else if opts.dry_run {
        Ok(dry_run_estimate(&tasks))
    } else {
        simple::compress(opts, &tasks, &output_path, threads, mode, progress)
    }?;

    (progress)(ProgressEvent::Complete {
        current: result.files_processed,
        total: tasks.total_files,
        total_bytes: result.total_original,
        compressed_size: result.total_compressed,
    });
    Ok(result)
}

/// Stats-only estimate for formats without a chunk pipeline: assume a 2:1
/// ratio, the same guess the chunked dry run uses per chunk.
fn dry_run_estimate(tasks: &TaskList) -> CompressResult {
    CompressResult {
        files_processed: tasks.total_files,
        total_original: tasks.total_bytes,
        total_compressed: tasks.total_bytes / 2,
        archive_size: 0,
        stats: None,
        errors: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_options_rejected() {
        let base = Options {
            input_path: ".".into(),
            output_path: "out.gda".into(),
            ..Options::default()
        };
        for bad in [
            Options {
                use_zip: true,
                chunk_size: 65536,
                level: 5,
                ..base.clone()
            },
            Options {
                use_xz: true,
                chunk_size: 65536,
                ..base.clone()
            },
            Options {
                use_dictionary: true,
                chunk_size: 65536,
                ..base.clone()
            },
            Options {
                use_dictionary: true,
                use_zip: true,
                level: 5,
                ..base.clone()
            },
            Options {
                chunk_size: 1024,
                ..base.clone()
            },
            Options {
                chunk_size: 128 * 1024 * 1024,
                ..base.clone()
            },
            Options {
                level: 0,
                ..base.clone()
            },
            Options {
                level: 23,
                ..base.clone()
            },
            Options {
                use_zip: true,
                level: 10,
                ..base.clone()
            },
        ] {
            assert!(validate(&bad).is_err(), "{:?}", bad);
        }
        assert!(validate(&base).is_ok());
    }

    #[test]
    fn output_extension_appended() {
        let opts = Options {
            output_path: "backup".into(),
            ..Options::default()
        };
        assert_eq!(resolve_output_path(&opts), PathBuf::from("backup.gda"));

        let opts = Options {
            output_path: "backup".into(),
            use_zip: true,
            ..Options::default()
        };
        assert_eq!(resolve_output_path(&opts), PathBuf::from("backup.zip"));

        let opts = Options {
            output_path: "backup.gda".into(),
            ..Options::default()
        };
        assert_eq!(resolve_output_path(&opts), PathBuf::from("backup.gda"));
    }

    #[test]
    fn auto_mode_follows_folder_count() {
        let mut tasks = TaskList::default();
        tasks.top_level_folders = 8;
        let opts = Options::default();
        assert_eq!(resolve_mode(&opts, &tasks, 4), ResolvedMode::Folder);
        assert_eq!(resolve_mode(&opts, &tasks, 5), ResolvedMode::File);
    }

    #[test]
    fn affinity_is_stable_and_bounded() {
        for threads in 1..8 {
            let a = folder_affinity("some/folder", threads);
            assert_eq!(a, folder_affinity("some/folder", threads));
            assert!(a < threads);
        }
    }

    #[test]
    fn workers_visit_every_file_once() {
        use std::sync::atomic::{AtomicU64, Ordering};
        let folders: Vec<FolderTask> = (0..13)
            .map(|f| FolderTask {
                folder: format!("f{}", f),
                files: (0..7)
                    .map(|i| FileTask {
                        source: PathBuf::new(),
                        relative_path: format!("f{}/{}", f, i),
                        size: 1,
                    })
                    .collect(),
            })
            .collect();
        let tasks = TaskList {
            folders,
            total_files: 13 * 7,
            total_bytes: 13 * 7,
            top_level_folders: 13,
        };
        for mode in [ResolvedMode::Folder, ResolvedMode::File] {
            let visited = AtomicU64::new(0);
            let worker = |_file: &FileTask| {
                visited.fetch_add(1, Ordering::Relaxed);
            };
            run_workers(&tasks, 4, mode, &worker);
            assert_eq!(visited.load(Ordering::Relaxed), 13 * 7);
        }
    }
}
