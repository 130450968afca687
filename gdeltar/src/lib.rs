//! gdelta archive engine.
//!
//! A parallel archival compressor with content-defined chunking and
//! chunk-level deduplication. Three binary formats share one family:
//! sequential per-file frames, chunked-and-deduplicated, and
//! dictionary-compressed. ZIP and tar+xz outputs exist as thin
//! compatibility shims.
mod archive;
mod chunk;
mod chunk_store;
pub mod chunker;
pub mod compress;
mod compression;
pub mod decompress;
mod error;
pub mod ext;
pub mod format;
mod hashsum;
mod memory;
mod progress;
pub mod rolling_hash;
pub mod temp;
pub mod verify;
pub mod wire;

pub use archive::{ChunkInfo, FileMetadata};
pub use chunk::{Chunk, VerifiedChunk};
pub use chunk_store::{max_chunks_for_budget, ChunkStore, StoreStats, CHUNK_ENTRY_OVERHEAD};
pub use compress::{compress, CompressResult, Options, Parallelism};
pub use compression::{decompress_frame, Compression, MAX_LEVEL, MIN_LEVEL, SLOW_LEVEL};
pub use decompress::{decompress, ExtractOptions, ExtractResult};
pub use error::Error;
pub use hashsum::{HashSum, HASH_SIZE};
pub use memory::total_memory_bytes;
pub use progress::{log_progress, null_progress, ProgressEvent, ProgressSink};
pub use verify::{verify, VerifyOptions, VerifyReport};
