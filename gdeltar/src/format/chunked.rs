//! Chunked, deduplicated archive layout.
//!
//! | Region       | Contents                                                     |
//! |--------------|--------------------------------------------------------------|
//! | Header       | Magic `GDELTA02`, u64 avg chunk size, u32 files, u32 chunks  |
//! | Chunk index  | Per unique chunk: hash[32], u64 offset, u64 csize, u64 size  |
//! | File records | Per file: path, u64 size, u32 chunk count, chunk hashes      |
//! | Chunk bodies | Concatenated compressed chunk frames                         |
//! | Footer       | `ENDGDLT2`                                                   |
//!
//! Index records appear in first-insertion order; each `offset` is relative
//! to the start of the body region and equals the prefix sum of preceding
//! compressed sizes.

use std::io::{Read, Write};

use crate::wire;
use crate::{ChunkInfo, Error, FileMetadata};

use super::MAGIC_CHUNKED;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkedHeader {
    pub avg_chunk_size: u64,
    pub file_count: u32,
    pub unique_chunk_count: u32,
}

pub fn write_header<W: Write>(w: &mut W, header: &ChunkedHeader) -> std::io::Result<()> {
    wire::write_token(w, MAGIC_CHUNKED)?;
    wire::write_u64_le(w, header.avg_chunk_size)?;
    wire::write_u32_le(w, header.file_count)?;
    wire::write_u32_le(w, header.unique_chunk_count)
}

pub fn read_header<R: Read>(r: &mut R) -> Result<ChunkedHeader, Error> {
    wire::expect_token(r, MAGIC_CHUNKED)?;
    let avg_chunk_size = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
    let file_count = wire::read_u32_le(r).map_err(|_| Error::Truncated)?;
    let unique_chunk_count = wire::read_u32_le(r).map_err(|_| Error::Truncated)?;
    Ok(ChunkedHeader {
        avg_chunk_size,
        file_count,
        unique_chunk_count,
    })
}

/// Write the chunk index in the given (insertion) order.
pub fn write_chunk_index<W: Write>(w: &mut W, chunks: &[ChunkInfo]) -> std::io::Result<()> {
    for info in chunks {
        wire::write_hash(w, &info.hash)?;
        wire::write_u64_le(w, info.offset)?;
        wire::write_u64_le(w, info.compressed_size)?;
        wire::write_u64_le(w, info.original_size)?;
    }
    Ok(())
}

pub fn read_chunk_index<R: Read>(r: &mut R, count: u32) -> Result<Vec<ChunkInfo>, Error> {
    let mut chunks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let hash = wire::read_hash(r).map_err(|_| Error::Truncated)?;
        let offset = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
        let compressed_size = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
        let original_size = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
        if compressed_size == 0 {
            return Err(Error::CorruptArchive(
                "chunk index records a zero-size chunk".into(),
            ));
        }
        chunks.push(ChunkInfo {
            hash,
            offset,
            compressed_size,
            original_size,
        });
    }
    Ok(chunks)
}

pub fn write_file_metadata<W: Write>(w: &mut W, metadata: &FileMetadata) -> Result<(), Error> {
    wire::write_path(w, &metadata.relative_path)?;
    wire::write_u64_le(w, metadata.original_size).map_err(Error::codec)?;
    wire::write_u32_le(w, metadata.chunk_hashes.len() as u32).map_err(Error::codec)?;
    for hash in &metadata.chunk_hashes {
        wire::write_hash(w, hash).map_err(Error::codec)?;
    }
    Ok(())
}

pub fn read_file_metadata<R: Read>(r: &mut R) -> Result<FileMetadata, Error> {
    let relative_path = wire::read_path(r)?;
    let original_size = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
    let chunk_count = wire::read_u32_le(r).map_err(|_| Error::Truncated)?;
    let mut chunk_hashes = Vec::with_capacity(chunk_count as usize);
    for _ in 0..chunk_count {
        chunk_hashes.push(wire::read_hash(r).map_err(|_| Error::Truncated)?);
    }
    Ok(FileMetadata {
        relative_path,
        original_size,
        chunk_hashes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashSum;
    use std::io::Cursor;

    #[test]
    fn header_round_trip() {
        let header = ChunkedHeader {
            avg_chunk_size: 64 * 1024,
            file_count: 3,
            unique_chunk_count: 17,
        };
        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();
        assert_eq!(read_header(&mut Cursor::new(buf)).unwrap(), header);
    }

    #[test]
    fn chunk_index_round_trip() {
        let chunks: Vec<ChunkInfo> = (0..5u8)
            .scan(0u64, |offset, tag| {
                let info = ChunkInfo {
                    hash: HashSum::digest(&[tag]),
                    offset: *offset,
                    compressed_size: 100 + u64::from(tag),
                    original_size: 200,
                };
                *offset += info.compressed_size;
                Some(info)
            })
            .collect();
        let mut buf = Vec::new();
        write_chunk_index(&mut buf, &chunks).unwrap();
        let parsed = read_chunk_index(&mut Cursor::new(buf), 5).unwrap();
        assert_eq!(parsed, chunks);
    }

    #[test]
    fn zero_size_chunk_rejected() {
        let chunk = ChunkInfo {
            hash: HashSum::digest(b"x"),
            offset: 0,
            compressed_size: 0,
            original_size: 0,
        };
        let mut buf = Vec::new();
        write_chunk_index(&mut buf, &[chunk]).unwrap();
        assert!(matches!(
            read_chunk_index(&mut Cursor::new(buf), 1),
            Err(Error::CorruptArchive(_))
        ));
    }

    #[test]
    fn file_metadata_round_trip() {
        let metadata = FileMetadata {
            relative_path: "a/b/c.txt".into(),
            original_size: 12345,
            chunk_hashes: vec![HashSum::digest(b"1"), HashSum::digest(b"2")],
        };
        let mut buf = Vec::new();
        write_file_metadata(&mut buf, &metadata).unwrap();
        assert_eq!(read_file_metadata(&mut Cursor::new(buf)).unwrap(), metadata);
    }

    #[test]
    fn empty_file_has_no_hashes() {
        let metadata = FileMetadata {
            relative_path: "empty".into(),
            original_size: 0,
            chunk_hashes: Vec::new(),
        };
        let mut buf = Vec::new();
        write_file_metadata(&mut buf, &metadata).unwrap();
        let parsed = read_file_metadata(&mut Cursor::new(buf)).unwrap();
        assert!(parsed.chunk_hashes.is_empty());
    }

    #[test]
    fn truncated_metadata() {
        let metadata = FileMetadata {
            relative_path: "a".into(),
            original_size: 1,
            chunk_hashes: vec![HashSum::digest(b"1")],
        };
        let mut buf = Vec::new();
        write_file_metadata(&mut buf, &metadata).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(matches!(
            read_file_metadata(&mut Cursor::new(buf)),
            Err(Error::Truncated)
        ));
    }
}
