//! Quantization policies: catalog, resolution and operator mapping
//!
//! - **policy**: the closed catalog of policy identifiers
//! - **range**: (bits, signedness) → integer range
//! - **resolver**: policy → immutable activation/weight config
//! - **mapping**: resolved config applied across operator types
//! - **observer** / **fake_quantize**: the runtime pieces a resolved
//!   config selects
//! - **calibration**: observers + fake-quantize run over sample data

mod calibration;
mod fake_quantize;
mod mapping;
mod observer;
mod policy;
mod range;
mod resolver;
mod spec;

pub use calibration::{calibrate, CalibrationData, CalibrationReport};
pub use fake_quantize::{select_fake_quantize, FakeQuantBehavior, FakeQuantize};
pub use mapping::{build_mapping, MappingBuilder, OperatorMapping, OperatorType};
pub use observer::{
    select_observers, snap_power_of_two, Observer, QParams, SharedObserver,
    DEFAULT_AVERAGING_CONSTANT, FIXED_ACTIVATION_RANGE, FIXED_WEIGHT_RANGE,
};
pub use policy::PolicyId;
pub use range::{range_for, RangeSpec, RANGE_TABLE};
pub use resolver::{resolve, resolve_all, resolve_str};
pub use spec::{
    ActivationSpec, Backend, Granularity, ObserverKind, QuantizationConfig, ScaleQuantization,
    Symmetry, TrainingMode, WeightSpec,
};
