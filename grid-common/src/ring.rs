use std::fmt;

use thiserror::Error;

use crate::identity::GeneratorId;

/// Width of the space generator identities are drawn from.
pub const GENERATOR_ID_WIDTH: u32 = GeneratorId::BITS;

/// Widest identity space the ring can partition. Generator identities are 32 bits wide.
pub const MAX_WIDTH: u32 = 64;

/// Upper bound on the number of buckets, which keeps breakpoint arithmetic inside i128.
pub const MAX_BUCKETS: usize = u32::MAX as usize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("number of buckets must be between 1 and the size of the identity space, got {0}")]
    InvalidBucketCount(usize),
    #[error("hash width must be between 1 and {MAX_WIDTH} bits, got {0}")]
    InvalidWidth(u32),
    #[error("hash width {width} does not match the {expected}-bit generator identities")]
    WidthMismatch { width: u32, expected: u32 },
    #[error("value {value} falls outside the identity space [{lower}, {upper})")]
    OutOfRange { value: i128, lower: i128, upper: i128 },
}

/// A contiguous half-open interval `[lower, upper)` of the signed identity space, owned by one
/// bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRange {
    pub bucket: usize,
    pub lower: i128,
    pub upper: i128,
}

impl BucketRange {
    pub fn contains(&self, value: i64) -> bool {
        let value = i128::from(value);
        self.lower <= value && value < self.upper
    }
}

impl fmt::Display for BucketRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}

/// Partitions the signed space `[-2^(w-1), 2^(w-1))` into `num_buckets` contiguous ranges of
/// (nearly) equal width, ordered by bucket index.
///
/// Breakpoints are a pure function of `(num_buckets, width)`: the bootstrap coordinator and a
/// tracker shard computing its own range independently always agree on ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRing {
    width: u32,
    breakpoints: Vec<i128>,
}

impl HashRing {
    pub fn new(num_buckets: usize, width: u32) -> Result<Self, RingError> {
        if !(1..=MAX_WIDTH).contains(&width) {
            return Err(RingError::InvalidWidth(width));
        }

        let lower = -(1i128 << (width - 1));
        let span = 1i128 << width;

        if num_buckets == 0 || num_buckets > MAX_BUCKETS || num_buckets as i128 > span {
            return Err(RingError::InvalidBucketCount(num_buckets));
        }

        let n = num_buckets as i128;
        let breakpoints = (0..=n)
            .map(|i| lower + div_round(i * span, n))
            .collect();

        Ok(Self { width, breakpoints })
    }

    /// A ring over the generator identity space. `width` comes from configuration and must
    /// equal [`GENERATOR_ID_WIDTH`], otherwise identities fall outside the ring or crowd its
    /// middle buckets.
    pub fn for_generators(num_buckets: usize, width: u32) -> Result<Self, RingError> {
        if width != GENERATOR_ID_WIDTH {
            return Err(RingError::WidthMismatch {
                width,
                expected: GENERATOR_ID_WIDTH,
            });
        }
        Self::new(num_buckets, width)
    }

    pub fn num_buckets(&self) -> usize {
        self.breakpoints.len() - 1
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn breakpoints(&self) -> &[i128] {
        &self.breakpoints
    }

    /// Returns the bucket `i` such that `breakpoints[i] <= value < breakpoints[i + 1]`.
    pub fn assign(&self, value: i64) -> Result<usize, RingError> {
        let value = i128::from(value);
        let lower = self.breakpoints[0];
        let upper = self.breakpoints[self.num_buckets()];

        if value < lower || value >= upper {
            return Err(RingError::OutOfRange {
                value,
                lower,
                upper,
            });
        }

        Ok(self.breakpoints.partition_point(|bp| *bp <= value) - 1)
    }

    pub fn range(&self, bucket: usize) -> Option<BucketRange> {
        if bucket >= self.num_buckets() {
            return None;
        }

        Some(BucketRange {
            bucket,
            lower: self.breakpoints[bucket],
            upper: self.breakpoints[bucket + 1],
        })
    }

    pub fn ranges(&self) -> impl Iterator<Item = BucketRange> + '_ {
        self.breakpoints
            .windows(2)
            .enumerate()
            .map(|(bucket, pair)| BucketRange {
                bucket,
                lower: pair[0],
                upper: pair[1],
            })
    }
}

/// One-shot form of [`HashRing::assign`] for callers that do not keep a ring around.
pub fn assign_bucket(value: i64, num_buckets: usize, width: u32) -> Result<usize, RingError> {
    HashRing::new(num_buckets, width)?.assign(value)
}

// Rounds half up; numerator is never negative here.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    (2 * numerator + denominator) / (2 * denominator)
}
