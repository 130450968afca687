//! Dictionary-compressed archive layout.
//!
//! | Field                | Size            |
//! |----------------------|-----------------|
//! | Magic `GDELTA03`     | 8               |
//! | Version              | u8 (0x01)       |
//! | Dictionary size      | u32 le          |
//! | File count           | u32 le          |
//! | Reserved             | u32 le (0)      |
//! | Dictionary bytes     | dict_size       |
//! | Entries…             | variable        |
//! | Footer `ENDGDLT3`    | 8               |
//!
//! Each entry is `{u16 path_len, path, u64 original_size,
//! u64 compressed_size, payload}` where the payload is one zstd frame
//! encoded against the shared dictionary.

use std::io::{Read, Write};

use crate::wire;
use crate::Error;

use super::MAGIC_DICTIONARY;

pub const DICTIONARY_VERSION: u8 = 0x01;

/// Byte offset of the `file_count` header field, for patching after the
/// entry count is final.
pub const FILE_COUNT_FIELD_OFFSET: u64 = 8 + 1 + 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictionaryHeader {
    pub dict_size: u32,
    pub file_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub relative_path: String,
    pub original_size: u64,
    pub compressed_size: u64,
}

pub fn write_header<W: Write>(w: &mut W, header: &DictionaryHeader) -> std::io::Result<()> {
    wire::write_token(w, MAGIC_DICTIONARY)?;
    w.write_all(&[DICTIONARY_VERSION])?;
    wire::write_u32_le(w, header.dict_size)?;
    wire::write_u32_le(w, header.file_count)?;
    wire::write_u32_le(w, 0)
}

pub fn read_header<R: Read>(r: &mut R) -> Result<DictionaryHeader, Error> {
    wire::expect_token(r, MAGIC_DICTIONARY)?;
    let version = wire::read_bytes(r, 1).map_err(|_| Error::Truncated)?[0];
    if version != DICTIONARY_VERSION {
        return Err(Error::UnknownVersion(version));
    }
    let dict_size = wire::read_u32_le(r).map_err(|_| Error::Truncated)?;
    let file_count = wire::read_u32_le(r).map_err(|_| Error::Truncated)?;
    let _reserved = wire::read_u32_le(r).map_err(|_| Error::Truncated)?;
    Ok(DictionaryHeader {
        dict_size,
        file_count,
    })
}

pub fn write_entry_header<W: Write>(w: &mut W, entry: &DictionaryEntry) -> Result<(), Error> {
    wire::write_path(w, &entry.relative_path)?;
    wire::write_u64_le(w, entry.original_size).map_err(Error::codec)?;
    wire::write_u64_le(w, entry.compressed_size).map_err(Error::codec)?;
    Ok(())
}

pub fn read_entry_header<R: Read>(r: &mut R) -> Result<DictionaryEntry, Error> {
    let relative_path = wire::read_path(r)?;
    let original_size = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
    let compressed_size = wire::read_u64_le(r).map_err(|_| Error::Truncated)?;
    Ok(DictionaryEntry {
        relative_path,
        original_size,
        compressed_size,
    })
}
