//! Per-operator quantization mapping
//!
//! A base mapping (supplied by the backend layer) assigns every operator
//! type a default [`QuantizationConfig`]. [`build_mapping`] overrides every
//! entry with one resolved config, except the operators whose
//! quantization parameters are fixed by their own math (for example a
//! sigmoid whose output is bounded to `[0, 1]`). Those keep their entry
//! untouched.

use super::spec::QuantizationConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Operator-type identifier supplied by the graph layer
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorType(String);

impl OperatorType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperatorType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OperatorType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator type → effective quantization config
///
/// Configs are shared by `Arc`; an override never mutates the config it
/// replaces.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorMapping {
    /// Config for operators not listed in `operators`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<Arc<QuantizationConfig>>,
    /// Per-operator-type configs
    #[serde(default)]
    pub operators: BTreeMap<OperatorType, Arc<QuantizationConfig>>,
}

impl OperatorMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config for one operator type
    pub fn set(&mut self, op: impl Into<OperatorType>, config: Arc<QuantizationConfig>) {
        self.operators.insert(op.into(), config);
    }

    /// Builder-style [`OperatorMapping::set`]
    pub fn with(mut self, op: impl Into<OperatorType>, config: Arc<QuantizationConfig>) -> Self {
        self.set(op, config);
        self
    }

    /// Config for an operator type, falling back to the global default
    pub fn get(&self, op: &OperatorType) -> Option<&Arc<QuantizationConfig>> {
        self.operators.get(op).or(self.global.as_ref())
    }

    /// Operator types in key order
    pub fn keys(&self) -> impl Iterator<Item = &OperatorType> {
        self.operators.keys()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Override every non-fixed operator in `base` with `config`
///
/// The result has exactly the key set of `base`. Entries for
/// `fixed_param_ops` are carried over unchanged (same `Arc`). Fixed ops
/// missing from `base` are ignored, never added.
pub fn build_mapping(
    base: &OperatorMapping,
    config: &Arc<QuantizationConfig>,
    fixed_param_ops: &BTreeSet<OperatorType>,
) -> OperatorMapping {
    let mut preserved = 0usize;
    let operators: BTreeMap<OperatorType, Arc<QuantizationConfig>> = base
        .operators
        .iter()
        .map(|(op, existing)| {
            if fixed_param_ops.contains(op) {
                preserved += 1;
                (op.clone(), Arc::clone(existing))
            } else {
                (op.clone(), Arc::clone(config))
            }
        })
        .collect();

    for op in fixed_param_ops
        .iter()
        .filter(|op| !base.operators.contains_key(*op))
    {
        tracing::warn!(operator = %op, "fixed-qparams operator not in base mapping, ignored");
    }

    tracing::debug!(
        policy = %config.policy,
        overridden = operators.len() - preserved,
        preserved,
        "built operator mapping"
    );

    OperatorMapping {
        global: Some(Arc::clone(config)),
        operators,
    }
}

/// Reusable builder holding the fixed-qparams operator set
#[derive(Clone, Debug, Default)]
pub struct MappingBuilder {
    fixed_param_ops: BTreeSet<OperatorType>,
}

impl MappingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator type whose quantization parameters are fixed
    pub fn fixed_op(mut self, op: impl Into<OperatorType>) -> Self {
        self.fixed_param_ops.insert(op.into());
        self
    }

    /// Register several fixed-qparams operator types
    pub fn fixed_ops<I, T>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OperatorType>,
    {
        self.fixed_param_ops.extend(ops.into_iter().map(Into::into));
        self
    }

    pub fn fixed_param_ops(&self) -> &BTreeSet<OperatorType> {
        &self.fixed_param_ops
    }

    /// Build a fresh mapping from `base` and a resolved config
    pub fn build(&self, base: &OperatorMapping, config: QuantizationConfig) -> OperatorMapping {
        build_mapping(base, &Arc::new(config), &self.fixed_param_ops)
    }
}
