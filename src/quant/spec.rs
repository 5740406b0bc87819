//! Resolved quantization specs
//!
//! The vocabulary a resolved policy is written in:
//! - **Granularity**: per-tensor vs per-channel (weights only)
//! - **Symmetry**: affine (free zero-point) vs symmetric (fixed zero-point)
//! - **Scale quantization**: continuous vs power-of-two
//! - **Observer kind**: how the dynamic range is estimated
//!
//! [`QuantizationConfig`] is immutable once built and is shared by `Arc`
//! across every operator that adopts it.

use super::policy::PolicyId;
use super::range::RangeSpec;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weight quantization granularity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// Single scale/zero-point for the whole tensor
    #[default]
    PerTensor,
    /// Independent scale/zero-point per output channel (axis 0)
    PerChannel,
}

/// Zero-point handling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Symmetry {
    /// Scale and zero-point estimated independently
    #[default]
    Affine,
    /// Zero-point fixed by the range, only a scale is estimated
    Symmetric,
}

impl Symmetry {
    /// Whether the zero-point is an independently estimated parameter
    pub fn has_zero_point(&self) -> bool {
        matches!(self, Symmetry::Affine)
    }
}

/// Constraint on the estimated scale
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleQuantization {
    /// Any positive real scale
    #[default]
    Continuous,
    /// Scale snapped to a power of two (shift-based dequantization)
    PowerOfTwo,
}

/// Range estimation algorithm
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ObserverKind {
    /// Exponential moving average of min/max (or peak magnitude)
    #[default]
    MovingAverageMinMax,
    /// Declared constant range, statistics never update
    FixedRange,
    /// No estimation at all
    NoObservation,
}

/// Training mode a config was resolved for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMode {
    /// Quantization-aware training
    #[default]
    Qat,
    /// Post-training quantization
    Ptq,
}

impl TrainingMode {
    pub fn from_training_aware(is_training_aware: bool) -> Self {
        if is_training_aware {
            TrainingMode::Qat
        } else {
            TrainingMode::Ptq
        }
    }
}

/// Target hardware backend recorded with a resolved config
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Generic,
    Fbgemm,
    Qnnpack,
    X86,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Generic => "generic",
            Backend::Fbgemm => "fbgemm",
            Backend::Qnnpack => "qnnpack",
            Backend::X86 => "x86",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generic" => Ok(Backend::Generic),
            "fbgemm" => Ok(Backend::Fbgemm),
            "qnnpack" => Ok(Backend::Qnnpack),
            "x86" => Ok(Backend::X86),
            _ => Err(Error::Configuration(format!(
                "Unknown backend: {s}. Valid backends: generic, fbgemm, qnnpack, x86"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activation quantization spec
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationSpec {
    pub range: RangeSpec,
    #[serde(default)]
    pub symmetry: Symmetry,
    #[serde(default)]
    pub scale_quantization: ScaleQuantization,
    #[serde(default)]
    pub observer: ObserverKind,
    /// Fake-quantize step is identity; metadata is still carried
    #[serde(default)]
    pub bypass: bool,
}

/// Weight quantization spec
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightSpec {
    pub range: RangeSpec,
    #[serde(default)]
    pub symmetry: Symmetry,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub scale_quantization: ScaleQuantization,
    #[serde(default)]
    pub observer: ObserverKind,
    /// Fake-quantize step is identity; metadata is still carried
    #[serde(default)]
    pub bypass: bool,
}

/// Resolved activation + weight configuration for one policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantizationConfig {
    /// Policy the config was resolved from
    pub policy: PolicyId,
    /// Training mode the config was built for
    pub mode: TrainingMode,
    /// Backend the config was built for
    pub backend: Backend,
    pub activation: ActivationSpec,
    pub weight: WeightSpec,
}

impl QuantizationConfig {
    /// Whether both fake-quantize steps are identity
    pub fn is_bypass(&self) -> bool {
        self.activation.bypass && self.weight.bypass
    }

    /// Check range invariants on both specs
    pub fn has_valid_ranges(&self) -> bool {
        self.activation.range.is_valid() && self.weight.range.is_valid()
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Granularity::PerTensor => "per-tensor",
            Granularity::PerChannel => "per-channel",
        })
    }
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Symmetry::Affine => "affine",
            Symmetry::Symmetric => "symmetric",
        })
    }
}

impl fmt::Display for ScaleQuantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScaleQuantization::Continuous => "continuous",
            ScaleQuantization::PowerOfTwo => "power-of-two",
        })
    }
}

impl fmt::Display for ObserverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObserverKind::MovingAverageMinMax => "moving-average-min-max",
            ObserverKind::FixedRange => "fixed-range",
            ObserverKind::NoObservation => "no-observation",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetry_zero_point() {
        assert!(Symmetry::Affine.has_zero_point());
        assert!(!Symmetry::Symmetric.has_zero_point());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("generic".parse::<Backend>().unwrap(), Backend::Generic);
        assert_eq!("FBGEMM".parse::<Backend>().unwrap(), Backend::Fbgemm);
        assert_eq!("x86".parse::<Backend>().unwrap(), Backend::X86);
        assert!(matches!(
            "tpu".parse::<Backend>(),
            Err(Error::Configuration(msg)) if msg.contains("tpu")
        ));
    }

    #[test]
    fn test_training_mode() {
        assert_eq!(TrainingMode::from_training_aware(true), TrainingMode::Qat);
        assert_eq!(TrainingMode::from_training_aware(false), TrainingMode::Ptq);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ObserverKind::MovingAverageMinMax).unwrap();
        assert_eq!(json, "\"moving-average-min-max\"");
        let json = serde_json::to_string(&ScaleQuantization::PowerOfTwo).unwrap();
        assert_eq!(json, "\"power-of-two\"");
        let json = serde_json::to_string(&Granularity::PerChannel).unwrap();
        assert_eq!(json, "\"per-channel\"");
        let mode: TrainingMode = serde_json::from_str("\"ptq\"").unwrap();
        assert_eq!(mode, TrainingMode::Ptq);
    }

    #[test]
    fn test_display_matches_serde() {
        for kind in [
            ObserverKind::MovingAverageMinMax,
            ObserverKind::FixedRange,
            ObserverKind::NoObservation,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json.trim_matches('"'), kind.to_string());
        }
    }
}
