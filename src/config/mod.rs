//! Declarative YAML build configuration
//!
//! A build file names the target policy, the base mapping the backend
//! layer supplies, and the operators whose quantization parameters are
//! fixed.
//!
//! # Example
//!
//! ```yaml
//! policy: W8C_A8T_SYM_P2
//! qat: true
//! backend: qnnpack
//!
//! base:
//!   default_policy: DEFAULT
//!   operators: [conv2d, linear, add]
//!
//! fixed:
//!   sigmoid:
//!     activation:
//!       range: { quant_min: 0, quant_max: 255 }
//!       observer: fixed-range
//! ```

mod build;
mod cli;
mod schema;
mod validate;

#[cfg(test)]
mod tests;


pub use build::{apply_overrides, base_mapping_from_spec, build_mapping_from_spec, load_config};
pub use cli::{
    parse_args, CalibrateArgs, Cli, Command, ListArgs, MapArgs, OutputFormat, ResolveArgs,
    ValidateArgs,
};
pub use schema::{BaseSpec, BuildSpec, FixedOpSpec};
pub use validate::{validate_config, ValidationError};
