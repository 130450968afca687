use crate::HashSum;

/// Archive-side record for one unique chunk.
///
/// Immutable once written to the final archive. `offset` is relative to the
/// start of the chunk body region, and the offsets of all chunks, sorted,
/// partition the body region into disjoint ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Chunk content hash.
    pub hash: HashSum,
    /// Byte position within the chunk body region.
    pub offset: u64,
    /// Size of the compressed chunk frame.
    pub compressed_size: u64,
    /// Size of the chunk data in source (uncompressed).
    pub original_size: u64,
}

/// Per-file record describing how to rebuild one source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetadata {
    /// Relative path, forward-slash separated, UTF-8.
    pub relative_path: String,
    /// Uncompressed size of the source file.
    pub original_size: u64,
    /// Hashes of the file's chunks, in file-byte order. Empty for a
    /// zero-byte file.
    pub chunk_hashes: Vec<HashSum>,
}
