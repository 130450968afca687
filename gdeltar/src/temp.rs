//! Registry of live temporary files.
//!
//! Every intermediate file created during compression is registered here for
//! as long as it exists, so a signal handler can delete them all before the
//! process dies. Normal completion unregisters through the guard's drop.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;

fn registry() -> &'static Mutex<HashSet<PathBuf>> {
    static REGISTRY: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Keeps a temp path registered until dropped.
pub struct TempGuard {
    path: PathBuf,
}

impl TempGuard {
    pub fn register(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        registry().lock().unwrap().insert(path.clone());
        Self { path }
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        registry().lock().unwrap().remove(&self.path);
    }
}

/// Delete every registered temp file. Intended for signal handlers; errors
/// are ignored since the process is on its way out.
pub fn cleanup_all() {
    let paths: Vec<PathBuf> = registry().lock().unwrap().drain().collect();
    for path in paths {
        let _ = std::fs::remove_file(&path);
    }
}

/// Number of currently registered temp files.
pub fn registered_count() -> usize {
    registry().lock().unwrap().len()
}
