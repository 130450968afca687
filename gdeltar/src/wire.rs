//! Typed read/write helpers for the archive wire layout.
//!
//! All integers are little-endian. Strings are length-prefixed with a u16,
//! UTF-8 encoded, never null terminated. Hashes are stored as their full
//! 32 bytes. There is no alignment padding anywhere in the formats.

use std::io::{Read, Write};

use crate::hashsum::{HashSum, HASH_SIZE};
use crate::Error;

/// Longest possible length-prefixed path, bound by the u16 prefix.
pub const MAX_PATH_LEN: usize = u16::MAX as usize;

pub fn write_u16_le<W: Write>(w: &mut W, value: u16) -> std::io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn write_u32_le<W: Write>(w: &mut W, value: u32) -> std::io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn write_u64_le<W: Write>(w: &mut W, value: u64) -> std::io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn write_bytes<W: Write>(w: &mut W, data: &[u8]) -> std::io::Result<()> {
    w.write_all(data)
}

pub fn write_hash<W: Write>(w: &mut W, hash: &HashSum) -> std::io::Result<()> {
    w.write_all(hash.as_bytes())
}

/// Write a length-prefixed path string.
pub fn write_path<W: Write>(w: &mut W, path: &str) -> Result<(), Error> {
    if path.len() > MAX_PATH_LEN {
        return Err(Error::PathTooLong(path.len()));
    }
    write_u16_le(w, path.len() as u16).map_err(|e| Error::Codec(e.to_string()))?;
    w.write_all(path.as_bytes())
        .map_err(|e| Error::Codec(e.to_string()))?;
    Ok(())
}

pub fn read_u16_le<R: Read>(r: &mut R) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32_le<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64_le<R: Read>(r: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn read_bytes<R: Read>(r: &mut R, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_hash<R: Read>(r: &mut R) -> std::io::Result<HashSum> {
    let mut buf = [0u8; HASH_SIZE];
    r.read_exact(&mut buf)?;
    Ok(HashSum::from_bytes(buf))
}

/// Read a length-prefixed path string, validating UTF-8.
pub fn read_path<R: Read>(r: &mut R) -> Result<String, Error> {
    let len = read_u16_le(r).map_err(|_| Error::Truncated)? as usize;
    let bytes = read_bytes(r, len).map_err(|_| Error::Truncated)?;
    String::from_utf8(bytes).map_err(|_| Error::CorruptArchive("path is not UTF-8".into()))
}

/// Write a fixed magic or footer token.
pub fn write_token<W: Write>(w: &mut W, token: &[u8]) -> std::io::Result<()> {
    w.write_all(token)
}

/// Read and check a fixed magic or footer token.
pub fn expect_token<R: Read>(r: &mut R, token: &[u8]) -> Result<(), Error> {
    let read = read_bytes(r, token.len()).map_err(|_| Error::Truncated)?;
    if read != token {
        return Err(Error::CorruptArchive(format!(
            "expected token {:?}",
            String::from_utf8_lossy(token)
        )));
    }
    Ok(())
}
