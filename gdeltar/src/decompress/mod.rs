//! Format-dispatched extraction.
//!
//! Single-threaded per archive: the sequential formats are consumed front
//! to back and the chunked format seeks within one open file handle, so
//! extra threads would only fight over the same descriptor. Callers that
//! want parallelism run one extraction per archive.
mod chunked;
mod dictionary;
mod simple;

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use log::info;

use crate::format::{self, Format};
use crate::{Error, ProgressSink};

/// Extraction configuration.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub archive_path: PathBuf,
    pub output_dir: PathBuf,
    /// Replace existing files instead of recording a `FileExists` error.
    pub overwrite: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            archive_path: PathBuf::new(),
            output_dir: PathBuf::new(),
            overwrite: false,
            verbose: false,
            quiet: false,
        }
    }
}

/// Outcome of one extraction run.
#[derive(Debug, Default)]
pub struct ExtractResult {
    pub files_written: u64,
    pub total_bytes: u64,
    /// Per-file errors; the run continued past them.
    pub errors: Vec<Error>,
}

/// Extract an archive into the output directory.
pub fn decompress(opts: &ExtractOptions, progress: &ProgressSink) -> Result<ExtractResult, Error> {
    let mut file = File::open(&opts.archive_path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::MissingInput(opts.archive_path.clone())
        } else {
            Error::io(&opts.archive_path, err)
        }
    })?;
    let detected = format::detect(&opts.archive_path, &mut file)?;
    if !opts.quiet {
        info!(
            "extracting {} ({} format) into {}",
            opts.archive_path.display(),
            detected,
            opts.output_dir.display()
        );
    }
    match detected {
        Format::Simple => simple::extract(opts, file, progress),
        Format::Chunked => chunked::extract(opts, file, progress),
        Format::Dictionary => dictionary::extract(opts, file, progress),
        Format::Zip => crate::ext::zip::extract(opts, progress),
        Format::TarXz => crate::ext::tar_xz::extract(opts, progress),
    }
}

/// Resolve a stored path against the output directory, rejecting anything
/// that could escape it: absolute paths, parent traversal, backslashes and
/// drive-letter prefixes.
pub(crate) fn safe_output_path(output_dir: &Path, relative: &str) -> Result<PathBuf, Error> {
    if relative.is_empty()
        || relative.starts_with('/')
        || relative.contains('\\')
        || relative.as_bytes().get(1) == Some(&b':')
    {
        return Err(Error::UnsafePath(relative.to_owned()));
    }
    let candidate = Path::new(relative);
    for component in candidate.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            _ => return Err(Error::UnsafePath(relative.to_owned())),
        }
    }
    Ok(output_dir.join(candidate))
}

/// Check overwrite policy and create parent directories for a target.
pub(crate) fn prepare_target(path: &Path, overwrite: bool) -> Result<(), Error> {
    if path.exists() && !overwrite {
        return Err(Error::FileExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
    }
    Ok(())
}
