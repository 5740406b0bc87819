//! Mapping build driver
//!
//! Loads a YAML [`BuildSpec`], resolves the base default and the target
//! policy, and runs the mapping builder over the assembled base mapping.

use super::cli::MapArgs;
use super::schema::BuildSpec;
use super::validate::validate_config;
use crate::error::{Error, Result};
use crate::quant::{resolve, Backend, MappingBuilder, OperatorMapping, PolicyId, QuantizationConfig};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Load and validate a build specification from a YAML file
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<BuildSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::Configuration(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    let spec: BuildSpec = serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::Configuration(format!("Failed to parse YAML config: {e}")))?;

    validate_config(&spec).map_err(|e| Error::Configuration(format!("Invalid config: {e}")))?;

    Ok(spec)
}

fn parse_backend(spec: &BuildSpec) -> Result<Backend> {
    spec.backend.parse()
}

/// Assemble the base mapping a spec describes
///
/// Every listed operator gets the resolved base default. Each fixed
/// operator gets the base default with its own activation (and weight,
/// when given) swapped in.
pub fn base_mapping_from_spec(spec: &BuildSpec) -> Result<OperatorMapping> {
    let default_policy: PolicyId = spec.base.default_policy.parse()?;
    let backend = parse_backend(spec)?;
    let default = Arc::new(resolve(default_policy, spec.qat, backend)?);

    let mut mapping = OperatorMapping::new();
    for op in &spec.base.operators {
        mapping.set(op.as_str(), Arc::clone(&default));
    }

    for (op, fixed) in &spec.fixed {
        let mut config: QuantizationConfig = *default;
        config.activation = fixed.activation;
        if let Some(weight) = fixed.weight {
            config.weight = weight;
        }
        mapping.set(op.as_str(), Arc::new(config));
    }

    Ok(mapping)
}

/// Build the final operator mapping for a spec
pub fn build_mapping_from_spec(spec: &BuildSpec) -> Result<OperatorMapping> {
    let base = base_mapping_from_spec(spec)?;
    let policy: PolicyId = spec.policy.parse()?;
    let config = resolve(policy, spec.qat, parse_backend(spec)?)?;

    let builder = MappingBuilder::new().fixed_ops(spec.fixed.keys().map(String::as_str));

    tracing::info!(
        policy = %policy,
        operators = base.len(),
        fixed = builder.fixed_param_ops().len(),
        "building mapping from config"
    );

    Ok(builder.build(&base, config))
}

/// Apply command-line overrides to a BuildSpec
pub fn apply_overrides(spec: &mut BuildSpec, args: &MapArgs) {
    if let Some(policy) = &args.policy {
        spec.policy = policy.clone();
    }
    if args.ptq {
        spec.qat = false;
    }
    if let Some(backend) = &args.backend {
        spec.backend = backend.clone();
    }
}
