//! Input enumeration and the folder/file task graph.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::Error;

use super::Options;

/// One regular file to compress.
#[derive(Clone, Debug)]
pub struct FileTask {
    /// Where to read the bytes from.
    pub source: PathBuf,
    /// Path stored in the archive, forward-slash separated.
    pub relative_path: String,
    /// Size at enumeration time.
    pub size: u64,
}

/// All files sharing one immediate parent path.
#[derive(Clone, Debug)]
pub struct FolderTask {
    /// Immediate parent of the contained relative paths. Empty for files at
    /// the archive root.
    pub folder: String,
    pub files: Vec<FileTask>,
}

/// The full enumerated input. Folder tasks partition the file set.
#[derive(Clone, Debug, Default)]
pub struct TaskList {
    pub folders: Vec<FolderTask>,
    pub total_files: u64,
    pub total_bytes: u64,
    /// Distinct top-level directories among the relative paths; drives the
    /// automatic parallelism choice.
    pub top_level_folders: usize,
}

impl TaskList {
    pub fn files(&self) -> impl Iterator<Item = &FileTask> {
        self.folders.iter().flat_map(|folder| folder.files.iter())
    }
}

/// Join path components relative to `root` with forward slashes.
fn relative_to(root: &Path, path: &Path) -> Result<String, Error> {
    let stripped = path
        .strip_prefix(root)
        .map_err(|_| Error::InvalidInput(format!("{} not under {}", path.display(), root.display())))?;
    let mut parts = Vec::new();
    for component in stripped.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("non UTF-8 path: {}", path.display())))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn file_name_of(path: &Path) -> Result<String, Error> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidInput(format!("unusable input path: {}", path.display())))
}

/// Walk all regular files under `root`, optionally honoring `.gitignore`.
fn walk_files<F>(root: &Path, use_gitignore: bool, mut visit: F) -> Result<(), Error>
where
    F: FnMut(PathBuf, u64) -> Result<(), Error>,
{
    if use_gitignore {
        for entry in ignore::WalkBuilder::new(root).build() {
            let entry = entry
                .map_err(|err| Error::InvalidInput(format!("walking {}: {}", root.display(), err)))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                let size = entry
                    .metadata()
                    .map(|meta| meta.len())
                    .map_err(|err| Error::InvalidInput(format!("{}: {}", entry.path().display(), err)))?;
                visit(entry.into_path(), size)?;
            }
        }
    } else {
        for entry in walkdir::WalkDir::new(root) {
            let entry =
                entry.map_err(|err| Error::InvalidInput(format!("walking {}: {}", root.display(), err)))?;
            if entry.file_type().is_file() {
                let size = entry
                    .metadata()
                    .map(|meta| meta.len())
                    .map_err(|err| Error::InvalidInput(format!("{}: {}", entry.path().display(), err)))?;
                visit(entry.into_path(), size)?;
            }
        }
    }
    Ok(())
}

/// Enumerate the input into folder-grouped tasks.
///
/// Every enumerated file appears in exactly one folder task. Two sources
/// mapping to the same relative path fail the whole run.
pub fn enumerate(opts: &Options) -> Result<TaskList, Error> {
    let mut tasks: Vec<FileTask> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut add = |tasks: &mut Vec<FileTask>, source: PathBuf, relative_path: String, size: u64| {
        if !seen.insert(relative_path.clone()) {
            return Err(Error::PathOverlap(relative_path));
        }
        tasks.push(FileTask {
            source,
            relative_path,
            size,
        });
        Ok(())
    };

    if !opts.files.is_empty() {
        for input in &opts.files {
            let meta = std::fs::metadata(input).map_err(|_| Error::MissingInput(input.clone()))?;
            if meta.is_file() {
                let relative_path = file_name_of(input)?;
                add(&mut tasks, input.clone(), relative_path, meta.len())?;
            } else if meta.is_dir() {
                let base = file_name_of(input)?;
                walk_files(input, opts.use_gitignore, |path, size| {
                    let rel = relative_to(input, &path)?;
                    add(&mut tasks, path, format!("{}/{}", base, rel), size)
                })?;
            }
        }
    } else {
        let root = &opts.input_path;
        let meta = std::fs::metadata(root).map_err(|_| Error::MissingInput(root.clone()))?;
        if meta.is_file() {
            let relative_path = file_name_of(root)?;
            add(&mut tasks, root.clone(), relative_path, meta.len())?;
        } else {
            walk_files(root, opts.use_gitignore, |path, size| {
                let rel = relative_to(root, &path)?;
                add(&mut tasks, path, rel, size)
            })?;
        }
    }

    if tasks.is_empty() {
        return Err(Error::InvalidInput("no files to compress".into()));
    }

    // Group by immediate parent. A BTreeMap keeps folder order stable
    // between runs.
    let mut groups: BTreeMap<String, Vec<FileTask>> = BTreeMap::new();
    let mut top_level: HashSet<String> = HashSet::new();
    let mut total_bytes = 0;
    let mut total_files = 0;
    for task in tasks {
        total_bytes += task.size;
        total_files += 1;
        let parent = match task.relative_path.rsplit_once('/') {
            Some((parent, _name)) => parent.to_owned(),
            None => String::new(),
        };
        match task.relative_path.split_once('/') {
            Some((first, _rest)) => top_level.insert(first.to_owned()),
            None => top_level.insert(String::new()),
        };
        groups.entry(parent).or_default().push(task);
    }

    Ok(TaskList {
        folders: groups
            .into_iter()
            .map(|(folder, files)| FolderTask { folder, files })
            .collect(),
        total_files,
        total_bytes,
        top_level_folders: top_level.len(),
    })
}
