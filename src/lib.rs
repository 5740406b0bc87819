//! # qpolicy: Quantization Policy Resolution
//!
//! qpolicy turns a named quantization policy (e.g. `W8C_A8T_SYM_P2`) into a
//! concrete per-operator configuration for quantization-aware training and
//! post-training quantization.
//!
//! ## Architecture
//!
//! - **quant**: Policy catalog, range table, observer and fake-quantize
//!   selection, resolution, and operator mapping
//! - **config**: Declarative YAML build files and CLI arguments
//! - **output**: Table, JSON and YAML rendering
//! - **error**: Error types

pub mod config;
pub mod output;
pub mod quant;

pub mod error;

// Re-export commonly used types
pub use error::{Error, Result};
pub use quant::{
    build_mapping, resolve, MappingBuilder, OperatorMapping, OperatorType, PolicyId,
    QuantizationConfig,
};
