use std::io::Write;

use crate::Error;

/// Lowest accepted zstd level.
pub const MIN_LEVEL: u32 = 1;
/// Highest accepted zstd level.
pub const MAX_LEVEL: u32 = 22;
/// Levels at or above this are warned about as slow.
pub const SLOW_LEVEL: u32 = 15;

/// Compression helper type wrapping a validated zstd level.
#[derive(Debug, Clone, Copy)]
pub struct Compression {
    level: i32,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "zstd({})", self.level)
    }
}

impl Compression {
    pub fn try_new(level: u32) -> Result<Self, Error> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(Error::InvalidInput(format!(
                "compression level {} not within {}..={}",
                level, MIN_LEVEL, MAX_LEVEL
            )));
        }
        if level >= SLOW_LEVEL {
            log::warn!("compression level {} will be slow", level);
        }
        Ok(Self {
            level: level as i32,
        })
    }

    pub fn level(&self) -> u32 {
        self.level as u32
    }

    /// Compress a block of data into a single independent frame.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        zstd::bulk::Compressor::new(self.level)
            .and_then(|mut compressor| compressor.compress(data))
            .map_err(Error::codec)
    }

    /// Compress a block of data into a single frame encoded against a
    /// shared dictionary.
    pub fn compress_with_dictionary(&self, data: &[u8], dictionary: &[u8]) -> Result<Vec<u8>, Error> {
        zstd::bulk::Compressor::with_dictionary(self.level, dictionary)
            .and_then(|mut compressor| compressor.compress(data))
            .map_err(Error::codec)
    }

    /// Create a streaming frame encoder over the given writer.
    pub fn encoder<W: Write>(&self, writer: W) -> Result<zstd::stream::Encoder<'static, W>, Error> {
        zstd::stream::Encoder::new(writer, self.level).map_err(Error::codec)
    }

    /// Create a streaming frame encoder armed with a shared dictionary.
    /// The encoder borrows the dictionary for its whole lifetime.
    pub fn encoder_with_dictionary<'a, W: Write>(
        &self,
        writer: W,
        dictionary: &'a [u8],
    ) -> Result<zstd::stream::Encoder<'a, W>, Error> {
        zstd::stream::Encoder::with_dictionary(writer, self.level, dictionary).map_err(Error::codec)
    }
}

/// Decompress one frame, expecting at most `capacity` output bytes.
pub fn decompress_frame(data: &[u8], capacity: usize) -> Result<Vec<u8>, Error> {
    zstd::bulk::Decompressor::new()
        .and_then(|mut decompressor| decompressor.decompress(data, capacity))
        .map_err(Error::codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_range_enforced() {
        assert!(Compression::try_new(0).is_err());
        assert!(Compression::try_new(23).is_err());
        assert!(Compression::try_new(1).is_ok());
        assert!(Compression::try_new(22).is_ok());
    }

    #[test]
    fn frame_round_trip() {
        let compression = Compression::try_new(3).unwrap();
        let data = b"gdelta gdelta gdelta gdelta".repeat(100);
        let frame = compression.compress(&data).unwrap();
        assert!(frame.len() < data.len());
        assert_eq!(decompress_frame(&frame, data.len()).unwrap(), data);
    }

    #[test]
    fn dictionary_frame_round_trip() {
        let compression = Compression::try_new(3).unwrap();
        // Dictionary training wants plenty of samples relative to the
        // dictionary size.
        let samples: Vec<Vec<u8>> = (0..2000)
            .map(|i| {
                format!(
                    "sample record number {:06} with shared structure and padding padding",
                    i
                )
                .into_bytes()
            })
            .collect();
        let sizes: Vec<usize> = samples.iter().map(|s| s.len()).collect();
        let joined: Vec<u8> = samples.concat();
        let dictionary = zstd::dict::from_continuous(&joined, &sizes, 4 * 1024).unwrap();

        let data = b"sample record number 999999 with shared structure and padding padding".to_vec();
        let frame = compression
            .compress_with_dictionary(&data, &dictionary)
            .unwrap();
        let out = zstd::bulk::Decompressor::with_dictionary(&dictionary)
            .unwrap()
            .decompress(&frame, data.len())
            .unwrap();
        assert_eq!(out, data);
    }
}
