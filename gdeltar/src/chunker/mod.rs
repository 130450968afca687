//! Content-defined chunking.
//!
//! Boundaries are picked by a rolling hash over the input so that inserting
//! or deleting bytes only moves the cuts near the edit. Identical content
//! therefore produces identical chunks regardless of where it sits in a
//! file.
mod config;
mod rolling_hash;
mod streaming;

pub use config::{Config, FilterBits, WINDOW_SIZE};
pub use rolling_hash::RollingHashChunker;
pub use streaming::StreamingChunker;

use std::io::Read;

use bytes::BytesMut;

use crate::rolling_hash::RollSum;
use crate::{Chunk, VerifiedChunk};

pub trait Chunker {
    /// Scan for the next chunk in the given buffer.
    ///
    /// If None is returned the caller is expected to append more data to the buffer
    /// and call again. If a chunk is returned then that chunk has been split from
    /// buffer and next() can be called again.
    fn next(&mut self, buf: &mut BytesMut) -> Option<Chunk>;
}

/// Error raised by [`split_streaming`].
#[derive(Debug)]
pub enum SplitError<E> {
    /// Reading the source failed.
    Read(std::io::Error),
    /// The chunk consumer asked to abort.
    Consumer(E),
}

impl<E> std::fmt::Display for SplitError<E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "error reading source: {}", err),
            Self::Consumer(err) => write!(f, "{}", err),
        }
    }
}

fn new_chunker<R: Read>(config: &Config, reader: R) -> StreamingChunker<RollingHashChunker<RollSum>, R> {
    StreamingChunker::new(
        RollingHashChunker::new(RollSum::new(config.window_size), config),
        reader,
    )
}

/// Split a whole stream into hashed chunks.
///
/// Holds every chunk in memory at once; only meant for small sources. Use
/// [`split_streaming`] to bound memory to a single chunk.
pub fn split<R: Read>(config: &Config, reader: R) -> std::io::Result<Vec<VerifiedChunk>> {
    let mut chunks = Vec::new();
    for result in new_chunker(config, reader) {
        let (_offset, chunk) = result?;
        chunks.push(chunk.verify());
    }
    Ok(chunks)
}

/// Split a stream, handing each hashed chunk to `on_chunk` as it is cut.
///
/// The consumer owns each chunk's buffer and may drop it before the next one
/// is read. An error returned from the consumer aborts the split.
pub fn split_streaming<R, F, E>(config: &Config, reader: R, mut on_chunk: F) -> Result<(), SplitError<E>>
where
    R: Read,
    F: FnMut(VerifiedChunk) -> Result<(), E>,
{
    for result in new_chunker(config, reader) {
        let (_offset, chunk) = result.map_err(SplitError::Read)?;
        on_chunk(chunk.verify()).map_err(SplitError::Consumer)?;
    }
    Ok(())
}
