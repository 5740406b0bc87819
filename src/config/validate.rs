//! Configuration validation

use super::schema::BuildSpec;
use crate::quant::{Backend, PolicyId};
use std::collections::HashSet;

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid policy: {0} (run `qpolicy list` for valid policies)")]
    InvalidPolicy(String),

    #[error("Invalid base default policy: {0}")]
    InvalidDefaultPolicy(String),

    #[error("Invalid backend: {0} (must be one of: generic, fbgemm, qnnpack, x86)")]
    InvalidBackend(String),

    #[error("Empty operator type name in {0}")]
    EmptyOperatorName(&'static str),

    #[error("Duplicate base operator type: {0}")]
    DuplicateOperator(String),

    #[error("Invalid range for fixed operator {op}: [{quant_min},{quant_max}] (quant_min must be < quant_max)")]
    InvalidFixedRange {
        op: String,
        quant_min: i32,
        quant_max: i32,
    },
}

/// Validate a build specification
///
/// Checks:
/// - Policy identifiers and backend are known
/// - Operator type names are non-empty and unique
/// - Fixed operator ranges satisfy `quant_min < quant_max`
pub fn validate_config(spec: &BuildSpec) -> Result<(), ValidationError> {
    if spec.policy.parse::<PolicyId>().is_err() {
        return Err(ValidationError::InvalidPolicy(spec.policy.clone()));
    }

    if spec.base.default_policy.parse::<PolicyId>().is_err() {
        return Err(ValidationError::InvalidDefaultPolicy(
            spec.base.default_policy.clone(),
        ));
    }

    if spec.backend.parse::<Backend>().is_err() {
        return Err(ValidationError::InvalidBackend(spec.backend.clone()));
    }

    let mut seen = HashSet::new();
    for op in &spec.base.operators {
        if op.trim().is_empty() {
            return Err(ValidationError::EmptyOperatorName("base.operators"));
        }
        if !seen.insert(op.as_str()) {
            return Err(ValidationError::DuplicateOperator(op.clone()));
        }
    }

    for (op, fixed) in &spec.fixed {
        if op.trim().is_empty() {
            return Err(ValidationError::EmptyOperatorName("fixed"));
        }
        let ranges = std::iter::once(fixed.activation.range).chain(fixed.weight.map(|w| w.range));
        for range in ranges {
            if !range.is_valid() {
                return Err(ValidationError::InvalidFixedRange {
                    op: op.clone(),
                    quant_min: range.quant_min,
                    quant_max: range.quant_max,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BaseSpec, FixedOpSpec};
    use crate::quant::{ActivationSpec, ObserverKind, RangeSpec, ScaleQuantization, Symmetry};
    use std::collections::BTreeMap;

    fn create_valid_spec() -> BuildSpec {
        BuildSpec {
            policy: "W8C_A8T".to_string(),
            qat: true,
            backend: "generic".to_string(),
            base: BaseSpec {
                default_policy: "DEFAULT".to_string(),
                operators: vec!["conv2d".to_string(), "linear".to_string()],
            },
            fixed: BTreeMap::new(),
        }
    }

    fn fixed_op(quant_min: i32, quant_max: i32) -> FixedOpSpec {
        FixedOpSpec {
            activation: ActivationSpec {
                range: RangeSpec {
                    quant_min,
                    quant_max,
                },
                symmetry: Symmetry::Affine,
                scale_quantization: ScaleQuantization::Continuous,
                observer: ObserverKind::FixedRange,
                bypass: false,
            },
            weight: None,
        }
    }

    #[test]
    fn test_valid_config() {
        let spec = create_valid_spec();
        assert!(validate_config(&spec).is_ok());
    }

    #[test]
    fn test_invalid_policy() {
        let mut spec = create_valid_spec();
        spec.policy = "W16_A16".to_string();
        assert!(matches!(
            validate_config(&spec),
            Err(ValidationError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_invalid_default_policy() {
        let mut spec = create_valid_spec();
        spec.base.default_policy = "nope".to_string();
        assert!(matches!(
            validate_config(&spec),
            Err(ValidationError::InvalidDefaultPolicy(_))
        ));
    }

    #[test]
    fn test_invalid_backend() {
        let mut spec = create_valid_spec();
        spec.backend = "tpu".to_string();
        assert!(matches!(
            validate_config(&spec),
            Err(ValidationError::InvalidBackend(_))
        ));
    }

    #[test]
    fn test_empty_operator_name() {
        let mut spec = create_valid_spec();
        spec.base.operators.push("  ".to_string());
        assert!(matches!(
            validate_config(&spec),
            Err(ValidationError::EmptyOperatorName("base.operators"))
        ));
    }

    #[test]
    fn test_duplicate_operator() {
        let mut spec = create_valid_spec();
        spec.base.operators.push("conv2d".to_string());
        assert!(matches!(
            validate_config(&spec),
            Err(ValidationError::DuplicateOperator(op)) if op == "conv2d"
        ));
    }

    #[test]
    fn test_invalid_fixed_range() {
        let mut spec = create_valid_spec();
        spec.fixed.insert("sigmoid".to_string(), fixed_op(10, 10));
        assert!(matches!(
            validate_config(&spec),
            Err(ValidationError::InvalidFixedRange { .. })
        ));
    }

    #[test]
    fn test_valid_fixed_op() {
        let mut spec = create_valid_spec();
        spec.fixed.insert("sigmoid".to_string(), fixed_op(0, 255));
        assert!(validate_config(&spec).is_ok());
    }
}
