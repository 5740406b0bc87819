//! Integer quantization ranges
//!
//! Pure lookup from (bit-width, signedness) to the representable integer
//! levels. Only combinations registered in [`RANGE_TABLE`] are accepted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Representable integer range `[quant_min, quant_max]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeSpec {
    /// Smallest integer level
    pub quant_min: i32,
    /// Largest integer level
    pub quant_max: i32,
}

impl RangeSpec {
    /// Number of integer levels in the range
    pub fn levels(&self) -> u32 {
        (self.quant_max - self.quant_min + 1) as u32
    }

    /// Whether the range includes negative levels
    pub fn is_signed(&self) -> bool {
        self.quant_min < 0
    }

    /// Bit-width implied by the level count
    pub fn bits(&self) -> u8 {
        self.levels().next_power_of_two().trailing_zeros() as u8
    }

    /// Check `quant_min < quant_max`
    pub fn is_valid(&self) -> bool {
        self.quant_min < self.quant_max
    }

    /// Center of the range used as the symmetric zero-point
    ///
    /// `(qmin + qmax + 1) / 2`: 0 for signed ranges, 128 for `[0, 255]`.
    pub fn center(&self) -> i32 {
        (self.quant_min + self.quant_max + 1).div_euclid(2)
    }
}

impl std::fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.quant_min, self.quant_max)
    }
}

/// Registered `(bits, signed) -> range` entries
pub const RANGE_TABLE: &[(u8, bool, RangeSpec)] = &[
    (8, false, RangeSpec { quant_min: 0, quant_max: 255 }),
    (8, true, RangeSpec { quant_min: -128, quant_max: 127 }),
    (4, false, RangeSpec { quant_min: 0, quant_max: 15 }),
    (4, true, RangeSpec { quant_min: -8, quant_max: 7 }),
];

/// Look up the integer range for a bit-width and signedness
///
/// # Errors
/// Returns [`Error::UnsupportedRange`] for combinations missing from
/// [`RANGE_TABLE`].
pub fn range_for(bits: u8, signed: bool) -> Result<RangeSpec> {
    RANGE_TABLE
        .iter()
        .find(|(b, s, _)| *b == bits && *s == signed)
        .map(|(_, _, range)| *range)
        .ok_or(Error::UnsupportedRange { bits, signed })
}
