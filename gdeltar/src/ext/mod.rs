//! Thin adapters over the ecosystem archive formats.
//!
//! These exist for compatibility only: no chunking, no deduplication. Each
//! worker writes an independent part following the `<base>_NN.<ext>`
//! convention, so there is no cross-worker synchronization at all.
pub mod tar_xz;
pub mod zip;

use std::path::{Path, PathBuf};

/// Name of part `part` (1-based) for the given output path.
pub(crate) fn part_path(output: &Path, part: u32) -> PathBuf {
    let name = output
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let (base, extension) = split_known_extension(name);
    output.with_file_name(format!("{}_{:02}.{}", base, part, extension))
}

fn split_known_extension(name: &str) -> (&str, &str) {
    // `.tar.xz` is a double extension; `Path::extension` would split it
    // wrong.
    if let Some(base) = name.strip_suffix(".tar.xz") {
        return (base, "tar.xz");
    }
    if let Some(base) = name.strip_suffix(".zip") {
        return (base, "zip");
    }
    match name.rsplit_once('.') {
        Some((base, extension)) => (base, extension),
        None => (name, ""),
    }
}

/// All parts of a multi-part archive, starting from any one of them.
///
/// A name matching `<base>_NN.<ext>` expands to the contiguous run of
/// existing parts beginning at `_01`; anything else is a single-file
/// archive.
pub(crate) fn discover_parts(first: &Path) -> Vec<PathBuf> {
    let name = match first.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return vec![first.to_path_buf()],
    };
    let (stem, extension) = split_known_extension(name);
    let base = match stem
        .rsplit_once('_')
        .filter(|(_, nn)| nn.len() == 2 && nn.chars().all(|c| c.is_ascii_digit()))
    {
        Some((base, _nn)) => base,
        None => return vec![first.to_path_buf()],
    };

    let mut parts = Vec::new();
    for part in 1..=99u32 {
        let candidate = first.with_file_name(format!("{}_{:02}.{}", base, part, extension));
        if candidate.is_file() {
            parts.push(candidate);
        } else {
            break;
        }
    }
    if parts.is_empty() {
        vec![first.to_path_buf()]
    } else {
        parts
    }
}

/// Spread folder tasks over up to `threads` part writers, keeping folder
/// affinity. Only non-empty parts are returned so part numbers stay
/// contiguous.
pub(crate) fn partition_folders<'t>(
    tasks: &'t crate::compress::TaskList,
    threads: usize,
) -> Vec<Vec<&'t crate::compress::FileTask>> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut buckets: Vec<Vec<&crate::compress::FileTask>> = vec![Vec::new(); threads.max(1)];
    for folder in &tasks.folders {
        let mut hasher = DefaultHasher::new();
        folder.folder.hash(&mut hasher);
        let target = (hasher.finish() % buckets.len() as u64) as usize;
        buckets[target].extend(folder.files.iter());
    }
    buckets.retain(|bucket| !bucket.is_empty());
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_naming() {
        assert_eq!(
            part_path(Path::new("dir/backup.zip"), 1),
            PathBuf::from("dir/backup_01.zip")
        );
        assert_eq!(
            part_path(Path::new("backup.tar.xz"), 12),
            PathBuf::from("backup_12.tar.xz")
        );
    }

    #[test]
    fn discover_single_file() {
        let parts = discover_parts(Path::new("/no/such/plain.zip"));
        assert_eq!(parts, vec![PathBuf::from("/no/such/plain.zip")]);
    }

    #[test]
    fn discover_contiguous_parts() {
        let dir = tempfile::tempdir().unwrap();
        for part in 1..=3 {
            std::fs::write(dir.path().join(format!("backup_{:02}.zip", part)), b"pk").unwrap();
        }
        // Part 5 exists but the sequence stops at the gap.
        std::fs::write(dir.path().join("backup_05.zip"), b"pk").unwrap();

        let parts = discover_parts(&dir.path().join("backup_01.zip"));
        assert_eq!(parts.len(), 3);
        assert!(parts[2].ends_with("backup_03.zip"));
    }
}
