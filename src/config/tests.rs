//! Integration tests for config module

use super::*;
use crate::quant::{Granularity, ObserverKind, OperatorType, PolicyId, ScaleQuantization};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();
    temp_file
}

#[test]
fn test_end_to_end_mapping_build() {
    let yaml = r#"
policy: W8C_A8T_SYM_P2
qat: true
backend: fbgemm

base:
  default_policy: DEFAULT
  operators: [conv2d, linear, add, relu]

fixed:
  sigmoid:
    activation:
      range: { quant_min: 0, quant_max: 255 }
      observer: fixed-range
  tanh:
    activation:
      range: { quant_min: 0, quant_max: 255 }
      symmetry: symmetric
      observer: fixed-range
"#;

    let file = write_config(yaml);
    let spec = load_config(file.path()).unwrap();
    let base = base_mapping_from_spec(&spec).unwrap();
    let mapping = build_mapping_from_spec(&spec).unwrap();

    assert_eq!(mapping.len(), 6);
    let conv = mapping.get(&"conv2d".into()).unwrap();
    assert_eq!(conv.policy, PolicyId::W8cA8tSymP2);
    assert_eq!(conv.weight.granularity, Granularity::PerChannel);
    assert_eq!(conv.weight.range.quant_min, -128);
    assert_eq!(conv.activation.scale_quantization, ScaleQuantization::PowerOfTwo);

    // All non-fixed entries share one config
    let linear = mapping.get(&"linear".into()).unwrap();
    assert!(Arc::ptr_eq(conv, linear));

    for op in ["sigmoid", "tanh"] {
        let key = OperatorType::from(op);
        assert_eq!(mapping.operators[&key], base.operators[&key]);
        assert_eq!(mapping.operators[&key].activation.observer, ObserverKind::FixedRange);
    }
}

#[test]
fn test_minimal_config() {
    let file = write_config("policy: W4C_A8T\n");
    let spec = load_config(file.path()).unwrap();
    let mapping = build_mapping_from_spec(&spec).unwrap();

    assert!(mapping.is_empty());
    let global = mapping.global.as_ref().unwrap();
    assert_eq!(global.policy, PolicyId::W4cA8t);
    assert_eq!(global.weight.range.quant_max, 7);
}

#[test]
fn test_alias_policy_in_config() {
    let yaml = r#"
policy: 4-bit-fixed-range-no-quantize
base:
  operators: [conv2d]
"#;
    let file = write_config(yaml);
    let spec = load_config(file.path()).unwrap();
    let mapping = build_mapping_from_spec(&spec).unwrap();
    let conv = mapping.get(&"conv2d".into()).unwrap();
    assert!(conv.is_bypass());
}

#[test]
fn test_invalid_configs_rejected() {
    let cases = [
        "policy: W2_A2\n",
        "policy: W8T_A8T\nbackend: tpu\n",
        "policy: W8T_A8T\nbase:\n  operators: [conv2d, conv2d]\n",
        "policy: W8T_A8T\nbase:\n  default_policy: bogus\n",
        r#"
policy: W8T_A8T
fixed:
  sigmoid:
    activation:
      range: { quant_min: 5, quant_max: 1 }
"#,
    ];
    for yaml in cases {
        let file = write_config(yaml);
        assert!(load_config(file.path()).is_err(), "{yaml}");
    }
}

#[test]
fn test_fixed_op_weight_override() {
    let yaml = r#"
policy: W8T_A8T
fixed:
  layer_norm:
    activation:
      range: { quant_min: 0, quant_max: 15 }
    weight:
      range: { quant_min: -8, quant_max: 7 }
      granularity: per-channel
"#;
    let file = write_config(yaml);
    let spec = load_config(file.path()).unwrap();
    let mapping = build_mapping_from_spec(&spec).unwrap();
    let ln = mapping.get(&"layer_norm".into()).unwrap();
    assert_eq!(ln.weight.range.quant_max, 7);
    assert_eq!(ln.weight.granularity, Granularity::PerChannel);
    assert_eq!(ln.activation.range.quant_max, 15);
}
