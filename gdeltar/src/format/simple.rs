//! Sequential archive layout.
//!
//! | Field                   | Size                |
//! |-------------------------|---------------------|
//! | Magic `GDELTA01`        | 8                   |
//! | File count              | u32 le              |
//! | Entries…                | variable            |
//! | Footer `GDELTAEND`      | 9                   |
//!
//! Each entry is a header `{u16 path_len, path, u64 original_size,
//! u64 compressed_size, u64 data_offset}` immediately followed by its
//! compressed payload (one independent zstd frame). `data_offset` is the
//! absolute archive position where the payload starts.

use std::io::{Read, Write};

use crate::wire;
use crate::Error;

use super::MAGIC_SIMPLE;

/// One file entry header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleEntry {
    pub relative_path: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub data_offset: u64,
}

/// Size in bytes of the entry header preceding the payload.
pub fn entry_header_len(path: &str) -> u64 {
    2 + path.len() as u64 + 8 + 8 + 8
}

pub fn write_header<W: Write>(w: &mut W, file_count: u32) -> std::io::Result<()> {
    wire::write_token(w, MAGIC_SIMPLE)?;
    wire::write_u32_le(w, file_count)
}

/// Parse the header, returning the file count.
pub fn read_header<R: Read>(r: &mut R) -> Result<u32, Error> {
    wire::expect_token(r, MAGIC_SIMPLE)?;
    wire::read_u32_le(r).map_err(|_| Error::Truncated)
}

pub fn write_entry_header<W: Write>(w: &mut W, entry: &SimpleEntry) -> Result<(), Error> {
    wire::write_path(w, &entry.relative_path)?;
    wire::write_u64_le(w, entry.original_size).map_err(Error::codec)?;
    wire::write_u64_le(w, entry.compressed_size).map_err(Error::codec)?;
    wire::write_u64_le(w, entry.data_offset).map_err(Error::codec)?;
    Ok(())
}

pub fn read_entry_header<R: Read>(r: &mut R) -> Result<SimpleEntry, Error> {
    let relative_path = wire::read_path(r)?;
    let original_size = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
    let compressed_size = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
    let data_offset = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
    Ok(SimpleEntry {
        relative_path,
        original_size,
        compressed_size,
        data_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn entry_round_trip() {
        let entry = SimpleEntry {
            relative_path: "dir/a.bin".into(),
            original_size: 1000,
            compressed_size: 320,
            data_offset: 12 + entry_header_len("dir/a.bin"),
        };
        let mut buf = Vec::new();
        write_entry_header(&mut buf, &entry).unwrap();
        assert_eq!(buf.len() as u64, entry_header_len(&entry.relative_path));
        let parsed = read_entry_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn header_round_trip() {
        let mut buf = Vec::new();
        write_header(&mut buf, 42).unwrap();
        assert_eq!(read_header(&mut Cursor::new(buf)).unwrap(), 42);
    }

    #[test]
    fn truncated_header() {
        let mut buf = Vec::new();
        write_header(&mut buf, 42).unwrap();
        buf.truncate(9);
        assert!(matches!(
            read_header(&mut Cursor::new(buf)),
            Err(Error::Truncated)
        ));
    }
}
