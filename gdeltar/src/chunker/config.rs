/// Helper type for creating a bit mask to use while scanning for chunk boundaries.
///
/// The bit mask given from the filter is used to match against the rolling hash sum.
/// When `sum | filter_mask == sum` then we have found a chunk boundary.
/// That is, with a mask set to 0b1 a chunk will be found every 2nd byte on average.
/// With a mask set to 0b11 a chunk will be found every 4th byte on average.
#[derive(Clone, Copy, Debug)]
pub struct FilterBits(pub u32);

impl FilterBits {
    /// Create new filter mask with an average target size of the given value.
    ///
    /// The actual target size will be the given size rounded down to the closest power of 2 value.
    pub fn from_size(size: u32) -> Self {
        Self(30 - size.leading_zeros())
    }
    /// Get the bit mask value of the filter.
    pub fn mask(self) -> u32 {
        !0u32 >> (32 - self.0)
    }
    /// Get number of bits set in the filter.
    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Number of bytes kept in the rolling hash window while scanning.
pub const WINDOW_SIZE: usize = 64;

/// Boundary scan configuration, derived from a single average chunk size.
#[derive(Clone, Debug)]
pub struct Config {
    /// Bit mask filter resulting in an average chunk size.
    pub filter_bits: FilterBits,
    /// No chunks smaller than `min_chunk_size`, except the last of a stream.
    pub min_chunk_size: usize,
    /// No chunks bigger than `max_chunk_size`.
    pub max_chunk_size: usize,
    /// Rolling hash window size.
    pub window_size: usize,
    /// The average size the config was derived from.
    pub avg_chunk_size: usize,
}

impl Config {
    /// Derive a configuration from a target average chunk size.
    ///
    /// Minimum and maximum sizes are fixed at a quarter and four times the
    /// average, which keeps boundaries content-driven while bounding both
    /// the metadata overhead and a worker's peak buffer size.
    pub fn from_avg_size(avg_chunk_size: usize) -> Self {
        Self {
            filter_bits: FilterBits::from_size(avg_chunk_size as u32),
            min_chunk_size: avg_chunk_size / 4,
            max_chunk_size: avg_chunk_size * 4,
            window_size: WINDOW_SIZE,
            avg_chunk_size,
        }
    }
}
