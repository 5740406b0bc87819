//! Calibration driver
//!
//! Runs representative data through the observers a resolved config
//! selects and reports the resulting quantization parameters:
//! - Activations: a sequence of flat batches, observed in order
//! - Weights: one `[channels, features]` matrix
//!
//! Also reports the fake-quantize reconstruction error of the last
//! activation batch and the weights, so a bypass policy can be compared
//! with its quantizing twin.

use super::fake_quantize::FakeQuantize;
use super::observer::{Observer, QParams};
use super::spec::QuantizationConfig;
use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Calibration samples
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CalibrationData {
    /// Activation batches
    #[serde(default)]
    pub activations: Vec<Vec<f32>>,
    /// Weight rows, one per output channel
    #[serde(default)]
    pub weights: Vec<Vec<f32>>,
}

impl CalibrationData {
    /// Load samples from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Serialization(format!("invalid calibration data: {e}")))
    }

    /// Weight rows as a `[channels, features]` matrix
    ///
    /// # Errors
    /// Rows of unequal length are rejected.
    pub fn weight_matrix(&self) -> Result<Array2<f32>> {
        let channels = self.weights.len();
        let features = self.weights.first().map_or(0, Vec::len);
        if let Some(row) = self.weights.iter().find(|row| row.len() != features) {
            return Err(Error::Configuration(format!(
                "weight rows must have equal length: expected {features}, got {}",
                row.len()
            )));
        }
        let flat: Vec<f32> = self.weights.iter().flatten().copied().collect();
        Array2::from_shape_vec((channels, features), flat)
            .map_err(|e| Error::Configuration(format!("invalid weight matrix: {e}")))
    }
}

/// Calibration result for one config
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub config: QuantizationConfig,
    pub activation: QParams,
    pub weight: QParams,
    pub activation_batches: usize,
    pub weight_channels: usize,
    /// Mean squared fake-quantize error on the last activation batch
    pub activation_mse: f32,
    /// Mean squared fake-quantize error on the weights
    pub weight_mse: f32,
}

/// Calibrate the observers selected by `config` on `data`
pub fn calibrate(config: &QuantizationConfig, data: &CalibrationData) -> Result<CalibrationReport> {
    let mut activation_observer = Observer::for_activation(&config.activation);
    for batch in &data.activations {
        activation_observer.observe(batch)?;
    }

    let weights = data.weight_matrix()?;
    let mut weight_observer = Observer::for_weight(&config.weight);
    weight_observer.observe_channels(weights.view())?;

    let activation = activation_observer.calculate_qparams();
    let weight = weight_observer.calculate_qparams();

    let activation_mse = match data.activations.last() {
        Some(batch) => {
            let fq = FakeQuantize::activation(&config.activation, activation.clone());
            mse(batch, &fq.forward(batch))
        }
        None => 0.0,
    };

    let weight_mse = if weights.is_empty() {
        0.0
    } else {
        let fq = FakeQuantize::weight(&config.weight, weight.clone());
        let reconstructed = fq.forward_channels(weights.view())?;
        let original: Vec<f32> = weights.iter().copied().collect();
        let out: Vec<f32> = reconstructed.iter().copied().collect();
        mse(&original, &out)
    };

    tracing::debug!(
        policy = %config.policy,
        batches = activation_observer.num_batches(),
        channels = weights.nrows(),
        activation_mse,
        weight_mse,
        "calibration complete"
    );

    Ok(CalibrationReport {
        config: *config,
        activation,
        weight,
        activation_batches: activation_observer.num_batches(),
        weight_channels: weights.nrows(),
        activation_mse,
        weight_mse,
    })
}

fn mse(original: &[f32], reconstructed: &[f32]) -> f32 {
    if original.is_empty() {
        return 0.0;
    }
    original
        .iter()
        .zip(reconstructed)
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        / original.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::policy::PolicyId;
    use crate::quant::resolver::resolve;
    use crate::quant::spec::{Backend, Granularity};
    use approx::assert_abs_diff_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> CalibrationData {
        CalibrationData {
            activations: vec![vec![0.0, 0.5, 1.0, 2.0], vec![0.1, 0.7, 1.9, 3.0]],
            weights: vec![vec![0.5, -0.25, 0.1], vec![-1.5, 1.0, 0.3]],
        }
    }

    #[test]
    fn test_calibrate_per_channel_policy() {
        let config = resolve(PolicyId::W8cA8t, true, Backend::Generic).unwrap();
        let report = calibrate(&config, &sample()).unwrap();

        assert_eq!(report.activation_batches, 2);
        assert_eq!(report.weight_channels, 2);
        assert_eq!(report.weight.granularity, Granularity::PerChannel);
        assert_eq!(report.weight.num_groups(), 2);
        assert_eq!(report.activation.num_groups(), 1);
        assert!(report.weight_mse < 1e-4);
    }

    #[test]
    fn test_bypass_has_zero_error() {
        let config = resolve(PolicyId::W4cA4tFixedRangeNoQuantize, true, Backend::Generic).unwrap();
        let report = calibrate(&config, &sample()).unwrap();
        assert_abs_diff_eq!(report.activation_mse, 0.0);
        assert_abs_diff_eq!(report.weight_mse, 0.0);
        assert_eq!(report.activation.range.quant_max, 15);
    }

    #[test]
    fn test_fixed_range_matches_bypass_params() {
        let fr = resolve(PolicyId::W4cA4tFixedRange, true, Backend::Generic).unwrap();
        let noq = resolve(PolicyId::W4cA4tFixedRangeNoQuantize, true, Backend::Generic).unwrap();
        let a = calibrate(&fr, &sample()).unwrap();
        let b = calibrate(&noq, &sample()).unwrap();

        assert_eq!(a.activation, b.activation);
        assert_eq!(a.weight, b.weight);
        assert!(a.activation_mse > 0.0);
    }

    #[test]
    fn test_empty_data() {
        let config = resolve(PolicyId::Default, true, Backend::Generic).unwrap();
        let report = calibrate(&config, &CalibrationData::default()).unwrap();
        assert_eq!(report.activation_batches, 0);
        assert_eq!(report.weight_channels, 0);
        assert_eq!(report.activation.scales, vec![1.0]);
    }

    #[test]
    fn test_ragged_weights_rejected() {
        let data = CalibrationData {
            activations: vec![],
            weights: vec![vec![1.0, 2.0], vec![3.0]],
        };
        assert!(matches!(data.weight_matrix(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"activations": [[0.0, 2.0]], "weights": [[1.0, -1.0]]}"#)
            .unwrap();
        let data = CalibrationData::load(file.path()).unwrap();
        assert_eq!(data.activations.len(), 1);
        assert_eq!(data.weight_matrix().unwrap().dim(), (1, 2));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = CalibrationData::load("/nonexistent/samples.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{\"activations\": [[").unwrap();
        let result = CalibrationData::load(file.path());
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_data_from_json() {
        let json = r#"{"activations": [[0.0, 1.0]], "weights": [[0.5], [-0.5]]}"#;
        let data: CalibrationData = serde_json::from_str(json).unwrap();
        assert_eq!(data.weight_matrix().unwrap().dim(), (2, 1));

        let only_acts: CalibrationData = serde_json::from_str(r#"{"activations": [[1.0]]}"#).unwrap();
        assert!(only_acts.weights.is_empty());
    }
}
