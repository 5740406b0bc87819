//! YAML schema definitions for declarative mapping builds

use crate::quant::{ActivationSpec, WeightSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete mapping build specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Policy applied to every non-fixed operator (code or alias)
    pub policy: String,

    /// Quantization-aware training (false = post-training quantization)
    #[serde(default = "default_true")]
    pub qat: bool,

    /// Target backend: "generic" | "fbgemm" | "qnnpack" | "x86"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base operator mapping
    #[serde(default)]
    pub base: BaseSpec,

    /// Operators with fixed quantization parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fixed: BTreeMap<String, FixedOpSpec>,
}

/// Base mapping supplied by the backend layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseSpec {
    /// Policy resolved for every base operator type
    #[serde(default = "default_policy")]
    pub default_policy: String,

    /// Operator types present in the base mapping
    #[serde(default)]
    pub operators: Vec<String>,
}

impl Default for BaseSpec {
    fn default() -> Self {
        Self {
            default_policy: default_policy(),
            operators: Vec::new(),
        }
    }
}

/// Fixed quantization parameters for one operator type
///
/// Fields left out inherit from the base default policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedOpSpec {
    /// Output activation spec
    pub activation: ActivationSpec,

    /// Optional weight spec override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<WeightSpec>,
}

fn default_true() -> bool {
    true
}

fn default_backend() -> String {
    "generic".to_string()
}

fn default_policy() -> String {
    "DEFAULT".to_string()
}
