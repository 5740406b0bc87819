//! Policy catalog
//!
//! The closed set of quantization policies. Each identifier names a
//! weight/activation bit-width pair and a scheme:
//!
//! | Code | Weight | Activation | Scheme |
//! |------|--------|------------|--------|
//! | `DEFAULT` | 8-bit per-tensor | 8-bit | affine |
//! | `W8T_A8T` | 8-bit per-tensor | 8-bit | affine |
//! | `W8C_A8T` | 8-bit per-channel | 8-bit | affine |
//! | `W8T_A8T_SYM_P2` | 8-bit per-tensor | 8-bit | symmetric, power-of-two |
//! | `W8C_A8T_SYM_P2` | 8-bit per-channel | 8-bit | symmetric, power-of-two |
//! | `W4C_A8T` | 4-bit per-channel | 8-bit | affine |
//! | `W4C_A4T` | 4-bit per-channel | 4-bit | affine |
//! | `W4C_A4T_FR` | 4-bit per-channel | 4-bit | fixed range |
//! | `W4C_A4T_FR_NOQ` | 4-bit per-channel | 4-bit | fixed range, no quantize |

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quantization policy identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum PolicyId {
    /// Same as `W8T_A8T`
    #[default]
    #[serde(rename = "DEFAULT")]
    Default,
    #[serde(rename = "W8T_A8T")]
    W8tA8t,
    #[serde(rename = "W8C_A8T")]
    W8cA8t,
    #[serde(rename = "W8T_A8T_SYM_P2")]
    W8tA8tSymP2,
    #[serde(rename = "W8C_A8T_SYM_P2")]
    W8cA8tSymP2,
    #[serde(rename = "W4C_A8T")]
    W4cA8t,
    #[serde(rename = "W4C_A4T")]
    W4cA4t,
    #[serde(rename = "W4C_A4T_FR")]
    W4cA4tFixedRange,
    #[serde(rename = "W4C_A4T_FR_NOQ")]
    W4cA4tFixedRangeNoQuantize,
}

const ALL: [PolicyId; 9] = [
    PolicyId::Default,
    PolicyId::W8tA8t,
    PolicyId::W8cA8t,
    PolicyId::W8tA8tSymP2,
    PolicyId::W8cA8tSymP2,
    PolicyId::W4cA8t,
    PolicyId::W4cA4t,
    PolicyId::W4cA4tFixedRange,
    PolicyId::W4cA4tFixedRangeNoQuantize,
];

impl PolicyId {
    /// Every policy in catalog order
    pub fn list_all() -> &'static [PolicyId] {
        &ALL
    }

    /// Canonical codes in catalog order (for `--choices` style validation)
    pub fn choices() -> Vec<&'static str> {
        ALL.iter().map(PolicyId::as_str).collect()
    }

    /// Canonical short code
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyId::Default => "DEFAULT",
            PolicyId::W8tA8t => "W8T_A8T",
            PolicyId::W8cA8t => "W8C_A8T",
            PolicyId::W8tA8tSymP2 => "W8T_A8T_SYM_P2",
            PolicyId::W8cA8tSymP2 => "W8C_A8T_SYM_P2",
            PolicyId::W4cA8t => "W4C_A8T",
            PolicyId::W4cA4t => "W4C_A4T",
            PolicyId::W4cA4tFixedRange => "W4C_A4T_FR",
            PolicyId::W4cA4tFixedRangeNoQuantize => "W4C_A4T_FR_NOQ",
        }
    }

    /// Descriptive alias accepted by [`FromStr`]
    pub fn alias(&self) -> &'static str {
        match self {
            PolicyId::Default => "default",
            PolicyId::W8tA8t => "8-bit-per-tensor-affine",
            PolicyId::W8cA8t => "8-bit-per-channel-affine",
            PolicyId::W8tA8tSymP2 => "8-bit-symmetric-power-of-two",
            PolicyId::W8cA8tSymP2 => "8-bit-per-channel-symmetric-power-of-two",
            PolicyId::W4cA8t => "4-bit-weight-8-bit-activation",
            PolicyId::W4cA4t => "4-bit-weight-4-bit-activation",
            PolicyId::W4cA4tFixedRange => "4-bit-fixed-range",
            PolicyId::W4cA4tFixedRangeNoQuantize => "4-bit-fixed-range-no-quantize",
        }
    }

    /// One-line human description
    pub fn description(&self) -> &'static str {
        match self {
            PolicyId::Default => "8-bit per-tensor affine (alias of W8T_A8T)",
            PolicyId::W8tA8t => "8-bit per-tensor weight, 8-bit activation, affine",
            PolicyId::W8cA8t => "8-bit per-channel weight, 8-bit activation, affine",
            PolicyId::W8tA8tSymP2 => {
                "8-bit per-tensor weight, 8-bit activation, symmetric, power-of-two scale"
            }
            PolicyId::W8cA8tSymP2 => {
                "8-bit per-channel weight, 8-bit activation, symmetric, power-of-two scale"
            }
            PolicyId::W4cA8t => "4-bit per-channel weight, 8-bit activation, affine",
            PolicyId::W4cA4t => "4-bit per-channel weight, 4-bit activation, data-driven range",
            PolicyId::W4cA4tFixedRange => {
                "4-bit per-channel weight, 4-bit activation, fixed declared range"
            }
            PolicyId::W4cA4tFixedRangeNoQuantize => {
                "4-bit fixed range with fake-quantize bypassed (clipping cost only)"
            }
        }
    }
}

impl FromStr for PolicyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ALL.iter()
            .copied()
            .find(|p| {
                p.as_str().eq_ignore_ascii_case(needle) || p.alias().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "Unknown quantization policy: {s}. Valid policies: {}",
                    PolicyId::choices().join(", ")
                ))
            })
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
