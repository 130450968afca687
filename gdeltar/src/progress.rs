use std::sync::Arc;

/// Progress reported while compressing, extracting or verifying.
///
/// Events are delivered from worker threads; a sink must either be
/// thread-safe itself or forward into something that is.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Work has been enumerated.
    Start { total_files: u64, total_bytes: u64 },
    /// A file is about to be processed.
    FileStart { path: String, total: u64 },
    /// Bytes of one file have been consumed.
    FileProgress { path: String, current: u64, total: u64 },
    /// One file finished.
    FileComplete {
        path: String,
        current: u64,
        total: u64,
        compressed_size: u64,
    },
    /// A file failed; the run continues.
    Error { path: String },
    /// The whole run finished.
    Complete {
        current: u64,
        total: u64,
        total_bytes: u64,
        compressed_size: u64,
    },
}

/// Thread-safe progress callback.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// A sink that drops every event.
pub fn null_progress() -> ProgressSink {
    Arc::new(|_event| {})
}

/// A sink that forwards events to the debug log.
pub fn log_progress() -> ProgressSink {
    Arc::new(|event| log::debug!("{:?}", event))
}
