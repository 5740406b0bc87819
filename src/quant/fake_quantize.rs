//! Fake quantization
//!
//! Fake quantization simulates integer deployment while staying in floating
//! point:
//! - Forward: quantize → clamp → dequantize (adds rounding/clipping noise)
//! - Bypass: identity, used to measure range clipping on its own
//!
//! The policy only decides *whether* the step is applied. Scales and zero
//! points come from an [`Observer`](super::observer::Observer).

use super::observer::QParams;
use super::policy::PolicyId;
use super::range::RangeSpec;
use super::spec::{ActivationSpec, WeightSpec};
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Forward-pass behavior of a fake-quantize step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FakeQuantBehavior {
    /// Apply quantization noise
    #[default]
    Apply,
    /// Identity
    Bypass,
}

impl FakeQuantBehavior {
    pub fn is_bypass(&self) -> bool {
        matches!(self, FakeQuantBehavior::Bypass)
    }

    pub fn from_bypass(bypass: bool) -> Self {
        if bypass {
            FakeQuantBehavior::Bypass
        } else {
            FakeQuantBehavior::Apply
        }
    }
}

/// Select `(activation, weight)` fake-quantize behaviors for a policy
pub fn select_fake_quantize(policy: PolicyId) -> (FakeQuantBehavior, FakeQuantBehavior) {
    use FakeQuantBehavior::{Apply, Bypass};

    match policy {
        PolicyId::W4cA4tFixedRangeNoQuantize => (Bypass, Bypass),
        PolicyId::Default
        | PolicyId::W8tA8t
        | PolicyId::W8cA8t
        | PolicyId::W8tA8tSymP2
        | PolicyId::W8cA8tSymP2
        | PolicyId::W4cA8t
        | PolicyId::W4cA4t
        | PolicyId::W4cA4tFixedRange => (Apply, Apply),
    }
}

/// Fake quantization step bound to concrete parameters
#[derive(Clone, Debug)]
pub struct FakeQuantize {
    behavior: FakeQuantBehavior,
    range: RangeSpec,
    qparams: QParams,
}

impl FakeQuantize {
    /// Create a fake-quantize step
    pub fn new(behavior: FakeQuantBehavior, range: RangeSpec, qparams: QParams) -> Self {
        Self {
            behavior,
            range,
            qparams,
        }
    }

    /// Fake-quantize step for an activation spec
    pub fn activation(spec: &ActivationSpec, qparams: QParams) -> Self {
        Self::new(FakeQuantBehavior::from_bypass(spec.bypass), spec.range, qparams)
    }

    /// Fake-quantize step for a weight spec
    pub fn weight(spec: &WeightSpec, qparams: QParams) -> Self {
        Self::new(FakeQuantBehavior::from_bypass(spec.bypass), spec.range, qparams)
    }

    pub fn behavior(&self) -> FakeQuantBehavior {
        self.behavior
    }

    pub fn qparams(&self) -> &QParams {
        &self.qparams
    }

    /// Forward pass over a flat tensor using group 0 parameters
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        if self.behavior.is_bypass() {
            return input.to_vec();
        }
        let (scale, zero_point) = self.qparams.group(0);
        input
            .iter()
            .map(|&x| self.fake_quantize_value(x, scale, zero_point))
            .collect()
    }

    /// Forward pass over `[channels, features]` data
    ///
    /// Row `c` uses group `c` of per-channel parameters.
    pub fn forward_channels(&self, input: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let groups = self.qparams.num_groups();
        if groups > 1 && groups != input.nrows() {
            return Err(Error::ChannelMismatch {
                expected: groups,
                got: input.nrows(),
            });
        }
        if self.behavior.is_bypass() {
            return Ok(input.to_owned());
        }

        let mut output = input.to_owned();
        for (c, mut row) in output.rows_mut().into_iter().enumerate() {
            let (scale, zero_point) = self.qparams.group(c);
            row.mapv_inplace(|x| self.fake_quantize_value(x, scale, zero_point));
        }
        Ok(output)
    }

    /// Quantize then dequantize one value
    fn fake_quantize_value(&self, x: f32, scale: f32, zero_point: i32) -> f32 {
        let q = ((x / scale).round() + zero_point as f32)
            .clamp(self.range.quant_min as f32, self.range.quant_max as f32);
        (q - zero_point as f32) * scale
    }

    /// Number of quantization levels
    pub fn num_levels(&self) -> u32 {
        self.range.levels()
    }
}
