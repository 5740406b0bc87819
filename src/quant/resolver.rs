//! Policy resolution
//!
//! Turns a [`PolicyId`] into one immutable [`QuantizationConfig`] by
//! combining the range table, the observer selector and the fake-quantize
//! selector. Resolution is pure and deterministic: the same inputs always
//! produce an identical config.
//!
//! # Example
//!
//! ```
//! use qpolicy::quant::{resolve, Backend, PolicyId, ScaleQuantization};
//!
//! let config = resolve(PolicyId::W8cA8tSymP2, true, Backend::Generic)?;
//! assert_eq!(config.weight.range.quant_min, -128);
//! assert_eq!(config.activation.scale_quantization, ScaleQuantization::PowerOfTwo);
//! # Ok::<(), qpolicy::Error>(())
//! ```

use super::fake_quantize::select_fake_quantize;
use super::observer::select_observers;
use super::policy::PolicyId;
use super::range::range_for;
use super::spec::{
    ActivationSpec, Backend, Granularity, QuantizationConfig, ScaleQuantization, Symmetry,
    TrainingMode, WeightSpec,
};
use crate::error::Result;

/// Static layout of one policy row (ranges, symmetry, granularity, scale mode)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PolicyLayout {
    activation_bits: u8,
    weight_bits: u8,
    symmetry: Symmetry,
    weight_granularity: Granularity,
    scale_quantization: ScaleQuantization,
}

fn layout(policy: PolicyId) -> PolicyLayout {
    use Granularity::{PerChannel, PerTensor};
    use ScaleQuantization::{Continuous, PowerOfTwo};
    use Symmetry::{Affine, Symmetric};

    let row = |activation_bits: u8,
               weight_bits: u8,
               symmetry: Symmetry,
               weight_granularity: Granularity,
               scale_quantization: ScaleQuantization| {
        PolicyLayout {
            activation_bits,
            weight_bits,
            symmetry,
            weight_granularity,
            scale_quantization,
        }
    };

    match policy {
        PolicyId::Default | PolicyId::W8tA8t => row(8, 8, Affine, PerTensor, Continuous),
        PolicyId::W8cA8t => row(8, 8, Affine, PerChannel, Continuous),
        PolicyId::W8tA8tSymP2 => row(8, 8, Symmetric, PerTensor, PowerOfTwo),
        PolicyId::W8cA8tSymP2 => row(8, 8, Symmetric, PerChannel, PowerOfTwo),
        PolicyId::W4cA8t => row(8, 4, Affine, PerChannel, Continuous),
        PolicyId::W4cA4t => row(4, 4, Affine, PerChannel, Continuous),
        PolicyId::W4cA4tFixedRange => row(4, 4, Affine, PerChannel, Continuous),
        PolicyId::W4cA4tFixedRangeNoQuantize => row(4, 4, Affine, PerChannel, Continuous),
    }
}

/// Resolve a policy into a quantization config
///
/// Activations use unsigned ranges, weights use signed ranges. PTQ
/// (`is_training_aware = false`) reuses the QAT table; the config records
/// which mode it was built for.
///
/// # Errors
/// Returns [`Error::UnsupportedRange`](crate::Error::UnsupportedRange) if a row names a bit-width missing
/// from the range table.
pub fn resolve(
    policy: PolicyId,
    is_training_aware: bool,
    backend: Backend,
) -> Result<QuantizationConfig> {
    let layout = layout(policy);
    let (activation_observer, weight_observer) = select_observers(policy);
    let (activation_fq, weight_fq) = select_fake_quantize(policy);
    let mode = TrainingMode::from_training_aware(is_training_aware);

    let activation = ActivationSpec {
        range: range_for(layout.activation_bits, false)?,
        symmetry: layout.symmetry,
        scale_quantization: layout.scale_quantization,
        observer: activation_observer,
        bypass: activation_fq.is_bypass(),
    };

    let weight = WeightSpec {
        range: range_for(layout.weight_bits, true)?,
        symmetry: layout.symmetry,
        granularity: layout.weight_granularity,
        scale_quantization: layout.scale_quantization,
        observer: weight_observer,
        bypass: weight_fq.is_bypass(),
    };

    tracing::debug!(
        policy = %policy,
        mode = ?mode,
        backend = %backend,
        activation_range = %activation.range,
        weight_range = %weight.range,
        "resolved quantization policy"
    );

    Ok(QuantizationConfig {
        policy,
        mode,
        backend,
        activation,
        weight,
    })
}

/// Resolve from string identifiers
///
/// # Errors
/// Returns [`Error::Configuration`](crate::Error::Configuration) for an unknown policy or backend.
pub fn resolve_str(
    policy: &str,
    is_training_aware: bool,
    backend: &str,
) -> Result<QuantizationConfig> {
    let policy: PolicyId = policy.parse()?;
    let backend: Backend = backend.parse()?;
    resolve(policy, is_training_aware, backend)
}

/// Resolve every policy in the catalog
pub fn resolve_all(is_training_aware: bool, backend: Backend) -> Result<Vec<QuantizationConfig>> {
    PolicyId::list_all()
        .iter()
        .map(|&policy| resolve(policy, is_training_aware, backend))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::quant::range::RangeSpec;
    use crate::quant::spec::ObserverKind;
    use proptest::prelude::*;

    const U8: RangeSpec = RangeSpec {
        quant_min: 0,
        quant_max: 255,
    };
    const I8: RangeSpec = RangeSpec {
        quant_min: -128,
        quant_max: 127,
    };
    const U4: RangeSpec = RangeSpec {
        quant_min: 0,
        quant_max: 15,
    };
    const I4: RangeSpec = RangeSpec {
        quant_min: -8,
        quant_max: 7,
    };

    fn policy_strategy() -> impl Strategy<Value = PolicyId> {
        prop::sample::select(PolicyId::list_all().to_vec())
    }

    fn backend_strategy() -> impl Strategy<Value = Backend> {
        prop::sample::select(vec![
            Backend::Generic,
            Backend::Fbgemm,
            Backend::Qnnpack,
            Backend::X86,
        ])
    }

    proptest! {
        #[test]
        fn prop_resolve_deterministic(
            policy in policy_strategy(),
            qat in any::<bool>(),
            backend in backend_strategy(),
        ) {
            let a = resolve(policy, qat, backend).unwrap();
            let b = resolve(policy, qat, backend).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_level_counts(
            policy in policy_strategy(),
            qat in any::<bool>(),
        ) {
            let config = resolve(policy, qat, Backend::Generic).unwrap();
            for range in [config.activation.range, config.weight.range] {
                prop_assert!(range.quant_min < range.quant_max);
                let expected = if range.bits() == 8 { 256 } else { 16 };
                prop_assert_eq!(range.levels(), expected);
            }
        }
    }

    #[test]
    fn test_default_matches_w8t_a8t() {
        let default = resolve(PolicyId::Default, true, Backend::Generic).unwrap();
        let explicit = resolve(PolicyId::W8tA8t, true, Backend::Generic).unwrap();
        assert_eq!(default.activation, explicit.activation);
        assert_eq!(default.weight, explicit.weight);
        assert_eq!(default.policy, PolicyId::Default);
    }

    #[test]
    fn test_dispatch_table_ranges() {
        let expected = [
            (PolicyId::Default, U8, I8),
            (PolicyId::W8tA8t, U8, I8),
            (PolicyId::W8cA8t, U8, I8),
            (PolicyId::W8tA8tSymP2, U8, I8),
            (PolicyId::W8cA8tSymP2, U8, I8),
            (PolicyId::W4cA8t, U8, I4),
            (PolicyId::W4cA4t, U4, I4),
            (PolicyId::W4cA4tFixedRange, U4, I4),
            (PolicyId::W4cA4tFixedRangeNoQuantize, U4, I4),
        ];
        for (policy, act, wt) in expected {
            let config = resolve(policy, true, Backend::Generic).unwrap();
            assert_eq!(config.activation.range, act, "{policy}");
            assert_eq!(config.weight.range, wt, "{policy}");
        }
    }

    #[test]
    fn test_granularity_column() {
        let per_tensor = [PolicyId::Default, PolicyId::W8tA8t, PolicyId::W8tA8tSymP2];
        for policy in PolicyId::list_all() {
            let config = resolve(*policy, true, Backend::Generic).unwrap();
            let expected = if per_tensor.contains(policy) {
                Granularity::PerTensor
            } else {
                Granularity::PerChannel
            };
            assert_eq!(config.weight.granularity, expected, "{policy}");
        }
    }

    #[test]
    fn test_symmetric_power_of_two_policies() {
        for policy in [PolicyId::W8tA8tSymP2, PolicyId::W8cA8tSymP2] {
            let config = resolve(policy, true, Backend::Generic).unwrap();
            assert_eq!(config.activation.symmetry, Symmetry::Symmetric);
            assert_eq!(config.weight.symmetry, Symmetry::Symmetric);
            assert_eq!(
                config.activation.scale_quantization,
                ScaleQuantization::PowerOfTwo
            );
            assert_eq!(
                config.weight.scale_quantization,
                ScaleQuantization::PowerOfTwo
            );
        }
    }

    #[test]
    fn test_fixed_range_policies() {
        let fr = resolve(PolicyId::W4cA4tFixedRange, true, Backend::Generic).unwrap();
        assert_eq!(fr.activation.observer, ObserverKind::FixedRange);
        assert_eq!(fr.weight.observer, ObserverKind::FixedRange);
        assert!(!fr.activation.bypass);
        assert!(!fr.weight.bypass);

        let noq = resolve(PolicyId::W4cA4tFixedRangeNoQuantize, true, Backend::Generic).unwrap();
        assert!(noq.is_bypass());
        assert_eq!(noq.activation.observer, ObserverKind::FixedRange);
        assert_eq!(noq.activation.range, U4);
        assert_eq!(noq.weight.range, I4);
        assert_eq!(noq.weight.granularity, Granularity::PerChannel);
    }

    #[test]
    fn test_data_driven_4bit_uses_moving_average() {
        let config = resolve(PolicyId::W4cA4t, true, Backend::Generic).unwrap();
        assert_eq!(config.activation.observer, ObserverKind::MovingAverageMinMax);
        assert_eq!(config.weight.observer, ObserverKind::MovingAverageMinMax);
    }

    #[test]
    fn test_ptq_mode_recorded() {
        let qat = resolve(PolicyId::W8cA8t, true, Backend::Fbgemm).unwrap();
        let ptq = resolve(PolicyId::W8cA8t, false, Backend::Fbgemm).unwrap();
        assert_eq!(qat.mode, TrainingMode::Qat);
        assert_eq!(ptq.mode, TrainingMode::Ptq);
        assert_eq!(qat.activation, ptq.activation);
        assert_eq!(qat.weight, ptq.weight);
        assert_eq!(ptq.backend, Backend::Fbgemm);
    }

    #[test]
    fn test_resolve_str() {
        let config =
            resolve_str("8-bit-per-channel-symmetric-power-of-two", true, "generic").unwrap();
        assert_eq!(config.policy, PolicyId::W8cA8tSymP2);

        assert!(matches!(
            resolve_str("not-a-real-policy", true, "generic"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            resolve_str("W8T_A8T", true, "not-a-backend"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_resolve_all() {
        let configs = resolve_all(true, Backend::Generic).unwrap();
        assert_eq!(configs.len(), PolicyId::list_all().len());
        assert!(configs.iter().all(QuantizationConfig::has_valid_ranges));
    }
}
