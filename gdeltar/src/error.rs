use std::path::PathBuf;

use crate::HashSum;

pub enum Error {
    /// Invalid option combination or value.
    InvalidInput(String),
    /// Input path does not exist or is not readable.
    MissingInput(PathBuf),
    /// Underlying OS error, with the offending path.
    Io(PathBuf, std::io::Error),
    /// First bytes do not match any known archive magic.
    FormatUnknown,
    /// Archive ended before a complete structure could be read.
    Truncated,
    /// Structurally impossible field values or a bad footer token.
    CorruptArchive(String),
    /// Archive declares a format version this build does not understand.
    UnknownVersion(u8),
    /// A file references a chunk hash missing from the chunk index.
    MissingChunk(HashSum),
    /// Two input sources map to the same archive path.
    PathOverlap(String),
    /// Stored path exceeds the 16-bit length prefix.
    PathTooLong(usize),
    /// Stored path would escape the output directory.
    UnsafePath(String),
    /// Reassembled file size does not match the recorded size.
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },
    /// Encoder or decoder rejected the data.
    Codec(String),
    /// Extraction target exists and overwrite is disabled.
    FileExists(PathBuf),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
    /// Map a read error raised while parsing archive structure. Hitting end
    /// of file mid-structure means the archive is truncated, not an I/O
    /// problem of the host.
    pub(crate) fn archive_read(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(path.into(), err)
        }
    }
    pub(crate) fn codec(err: std::io::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl std::error::Error for Error {}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "InvalidInput({})", msg),
            Error::MissingInput(path) => write!(f, "MissingInput({})", path.display()),
            Error::Io(path, e) => write!(f, "Io({}, {:?})", path.display(), e),
            Error::FormatUnknown => write!(f, "FormatUnknown"),
            Error::Truncated => write!(f, "Truncated"),
            Error::CorruptArchive(msg) => write!(f, "CorruptArchive({})", msg),
            Error::UnknownVersion(v) => write!(f, "UnknownVersion({})", v),
            Error::MissingChunk(hash) => write!(f, "MissingChunk({})", hash),
            Error::PathOverlap(path) => write!(f, "PathOverlap({})", path),
            Error::PathTooLong(len) => write!(f, "PathTooLong({})", len),
            Error::UnsafePath(path) => write!(f, "UnsafePath({})", path),
            Error::SizeMismatch {
                path,
                expected,
                actual,
            } => write!(f, "SizeMismatch({}, {} != {})", path, expected, actual),
            Error::Codec(msg) => write!(f, "Codec({})", msg),
            Error::FileExists(path) => write!(f, "FileExists({})", path.display()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::MissingInput(path) => write!(f, "no such input path: {}", path.display()),
            Error::Io(path, e) => write!(f, "i/o error on {}: {}", path.display(), e),
            Error::FormatUnknown => write!(f, "not a recognized archive format"),
            Error::Truncated => write!(f, "archive is truncated"),
            Error::CorruptArchive(msg) => write!(f, "corrupt archive: {}", msg),
            Error::UnknownVersion(v) => write!(f, "unknown archive version {}", v),
            Error::MissingChunk(hash) => write!(f, "missing chunk {}", hash),
            Error::PathOverlap(path) => {
                write!(f, "multiple inputs map to archive path {}", path)
            }
            Error::PathTooLong(len) => write!(f, "path length {} exceeds 65535 bytes", len),
            Error::UnsafePath(path) => {
                write!(f, "stored path escapes the output directory: {}", path)
            }
            Error::SizeMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "size mismatch for {}: expected {} bytes, got {}",
                path, expected, actual
            ),
            Error::Codec(msg) => write!(f, "codec error: {}", msg),
            Error::FileExists(path) => {
                write!(f, "file exists and overwrite is disabled: {}", path.display())
            }
        }
    }
}
