//! Range observers
//!
//! Observers estimate the dynamic range of a tensor and turn it into
//! quantization parameters (scale, zero_point):
//! - **Moving average**: exponential moving average of min/max per batch.
//!   Power-of-two specs track the peak magnitude instead and snap the
//!   resulting scale to a power of two.
//! - **Fixed range**: declared constant range, statistics never update.
//! - **No observation**: unit scale, used where no estimation is wanted.
//!
//! Observers are stateful and sequential. To calibrate across workers,
//! give each worker its own observer and [`Observer::merge`] the partial
//! statistics, or wrap one observer in a [`SharedObserver`].

use super::policy::PolicyId;
use super::range::RangeSpec;
use super::spec::{
    ActivationSpec, Granularity, ObserverKind, ScaleQuantization, Symmetry, WeightSpec,
};
use crate::error::{Error, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Default moving-average smoothing factor
pub const DEFAULT_AVERAGING_CONSTANT: f32 = 0.01;

/// Declared range for fixed-range observers on unsigned (activation) ranges
pub const FIXED_ACTIVATION_RANGE: (f32, f32) = (0.0, 4.0);

/// Declared range for fixed-range observers on signed (weight) ranges
pub const FIXED_WEIGHT_RANGE: (f32, f32) = (-2.0, 2.0);

/// Select `(activation, weight)` observer kinds for a policy
///
/// One explicit row per policy. The fixed-range variants are never
/// inferred from the identifier's spelling.
pub fn select_observers(policy: PolicyId) -> (ObserverKind, ObserverKind) {
    use ObserverKind::{FixedRange, MovingAverageMinMax};

    match policy {
        PolicyId::Default | PolicyId::W8tA8t => (MovingAverageMinMax, MovingAverageMinMax),
        PolicyId::W8cA8t => (MovingAverageMinMax, MovingAverageMinMax),
        PolicyId::W8tA8tSymP2 => (MovingAverageMinMax, MovingAverageMinMax),
        PolicyId::W8cA8tSymP2 => (MovingAverageMinMax, MovingAverageMinMax),
        PolicyId::W4cA8t => (MovingAverageMinMax, MovingAverageMinMax),
        PolicyId::W4cA4t => (MovingAverageMinMax, MovingAverageMinMax),
        PolicyId::W4cA4tFixedRange => (FixedRange, FixedRange),
        PolicyId::W4cA4tFixedRangeNoQuantize => (FixedRange, FixedRange),
    }
}

/// Quantization parameters produced by an observer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QParams {
    /// Scale per group (one for per-tensor, one per channel otherwise)
    pub scales: Vec<f32>,
    /// Zero point per group
    pub zero_points: Vec<i32>,
    pub granularity: Granularity,
    pub range: RangeSpec,
}

impl QParams {
    /// Number of scale/zero-point groups
    pub fn num_groups(&self) -> usize {
        self.scales.len()
    }

    /// Parameters for group `idx`, falling back to group 0 for per-tensor
    pub fn group(&self, idx: usize) -> (f32, i32) {
        let i = if self.scales.len() == 1 { 0 } else { idx };
        (self.scales[i], self.zero_points[i])
    }
}

/// Stateful range observer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observer {
    kind: ObserverKind,
    range: RangeSpec,
    symmetry: Symmetry,
    scale_quantization: ScaleQuantization,
    granularity: Granularity,
    averaging_constant: f32,
    fixed_range: (f32, f32),
    min_vals: Vec<f32>,
    max_vals: Vec<f32>,
    peak_vals: Vec<f32>,
    num_channels: Option<usize>,
    num_batches: usize,
}

impl Observer {
    /// Create an observer
    pub fn new(
        kind: ObserverKind,
        range: RangeSpec,
        symmetry: Symmetry,
        scale_quantization: ScaleQuantization,
        granularity: Granularity,
    ) -> Self {
        let fixed_range = if range.is_signed() {
            FIXED_WEIGHT_RANGE
        } else {
            FIXED_ACTIVATION_RANGE
        };
        Self {
            kind,
            range,
            symmetry,
            scale_quantization,
            granularity,
            averaging_constant: DEFAULT_AVERAGING_CONSTANT,
            fixed_range,
            min_vals: Vec::new(),
            max_vals: Vec::new(),
            peak_vals: Vec::new(),
            num_channels: None,
            num_batches: 0,
        }
    }

    /// Observer for an activation spec (always per-tensor)
    pub fn for_activation(spec: &ActivationSpec) -> Self {
        Self::new(
            spec.observer,
            spec.range,
            spec.symmetry,
            spec.scale_quantization,
            Granularity::PerTensor,
        )
    }

    /// Observer for a weight spec
    pub fn for_weight(spec: &WeightSpec) -> Self {
        Self::new(
            spec.observer,
            spec.range,
            spec.symmetry,
            spec.scale_quantization,
            spec.granularity,
        )
    }

    /// Override the moving-average smoothing factor (clamped to `(0, 1]`)
    pub fn with_averaging_constant(mut self, averaging_constant: f32) -> Self {
        self.averaging_constant = averaging_constant.clamp(f32::EPSILON, 1.0);
        self
    }

    /// Override the declared range of a fixed-range observer
    pub fn with_fixed_range(mut self, min: f32, max: f32) -> Self {
        self.fixed_range = (min.min(max), max.max(min));
        self
    }

    pub fn kind(&self) -> ObserverKind {
        self.kind
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Number of batches observed
    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// Check if any data-driven statistics exist
    pub fn has_data(&self) -> bool {
        !self.min_vals.is_empty()
    }

    /// Tracked `(min, max)` per group; the declared range for fixed-range observers
    pub fn observed_range(&self) -> Vec<(f32, f32)> {
        match self.kind {
            ObserverKind::FixedRange => vec![self.fixed_range; self.num_channels.unwrap_or(1)],
            _ => self
                .min_vals
                .iter()
                .zip(&self.max_vals)
                .map(|(&lo, &hi)| (lo, hi))
                .collect(),
        }
    }

    /// Observe a batch as one flat tensor
    ///
    /// # Errors
    /// Per-channel observers need channel-major data, see
    /// [`Observer::observe_channels`].
    pub fn observe(&mut self, data: &[f32]) -> Result<()> {
        if self.granularity == Granularity::PerChannel {
            return Err(Error::ObserverMismatch(
                "per-channel observer requires channel-major data".to_string(),
            ));
        }
        if data.is_empty() {
            return Ok(());
        }

        if self.kind == ObserverKind::MovingAverageMinMax {
            let stats = batch_stats(data.iter().copied());
            self.update(&[stats])?;
        }
        self.num_batches += 1;
        Ok(())
    }

    /// Observe a batch laid out as `[channels, features]`
    ///
    /// Per-channel observers keep one statistic per row, per-tensor
    /// observers fold every row together.
    pub fn observe_channels(&mut self, data: ArrayView2<'_, f32>) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let channels = data.nrows();
        if self.granularity == Granularity::PerChannel {
            if let Some(expected) = self.num_channels {
                if expected != channels {
                    return Err(Error::ChannelMismatch {
                        expected,
                        got: channels,
                    });
                }
            }
            self.num_channels = Some(channels);
        }

        if self.kind == ObserverKind::MovingAverageMinMax {
            let stats: Vec<BatchStats> = match self.granularity {
                Granularity::PerTensor => vec![batch_stats(data.iter().copied())],
                Granularity::PerChannel => data
                    .rows()
                    .into_iter()
                    .map(|row| batch_stats(row.iter().copied()))
                    .collect(),
            };
            self.update(&stats)?;
        }
        self.num_batches += 1;
        Ok(())
    }

    /// Compute scale and zero-point from the current statistics
    pub fn calculate_qparams(&self) -> QParams {
        let groups: Vec<(f32, f32, f32)> = match self.kind {
            ObserverKind::FixedRange => {
                let (lo, hi) = self.fixed_range;
                vec![(lo, hi, lo.abs().max(hi.abs())); self.num_channels.unwrap_or(1)]
            }
            ObserverKind::MovingAverageMinMax if self.has_data() => self
                .min_vals
                .iter()
                .zip(&self.max_vals)
                .zip(&self.peak_vals)
                .map(|((&lo, &hi), &peak)| (lo, hi, peak))
                .collect(),
            _ => Vec::new(),
        };

        let (scales, zero_points) = if groups.is_empty() {
            (vec![1.0], vec![self.default_zero_point()])
        } else {
            groups
                .into_iter()
                .map(|(lo, hi, peak)| self.scale_zero_point(lo, hi, peak))
                .unzip()
        };

        QParams {
            scales,
            zero_points,
            granularity: self.granularity,
            range: self.range,
        }
    }

    /// Fold another observer's partial statistics into this one
    ///
    /// Extremes are combined (min of mins, max of maxes), which is exact
    /// for single-batch partials and conservative for averaged ones.
    pub fn merge(&mut self, other: &Observer) -> Result<()> {
        if self.kind != other.kind
            || self.range != other.range
            || self.symmetry != other.symmetry
            || self.scale_quantization != other.scale_quantization
            || self.granularity != other.granularity
            || self.fixed_range != other.fixed_range
        {
            return Err(Error::ObserverMismatch(format!(
                "cannot merge {} {} observer into {} {} observer",
                other.kind, other.granularity, self.kind, self.granularity
            )));
        }

        if let (Some(a), Some(b)) = (self.num_channels, other.num_channels) {
            if a != b {
                return Err(Error::ChannelMismatch {
                    expected: a,
                    got: b,
                });
            }
        }
        self.num_channels = self.num_channels.or(other.num_channels);
        self.num_batches += other.num_batches;

        if !other.has_data() {
            return Ok(());
        }
        if !self.has_data() {
            self.min_vals = other.min_vals.clone();
            self.max_vals = other.max_vals.clone();
            self.peak_vals = other.peak_vals.clone();
            return Ok(());
        }

        for (a, b) in self.min_vals.iter_mut().zip(&other.min_vals) {
            *a = a.min(*b);
        }
        for (a, b) in self.max_vals.iter_mut().zip(&other.max_vals) {
            *a = a.max(*b);
        }
        for (a, b) in self.peak_vals.iter_mut().zip(&other.peak_vals) {
            *a = a.max(*b);
        }
        Ok(())
    }

    /// Reset statistics
    pub fn reset(&mut self) {
        self.min_vals.clear();
        self.max_vals.clear();
        self.peak_vals.clear();
        self.num_channels = None;
        self.num_batches = 0;
    }

    // Internal methods

    fn update(&mut self, stats: &[BatchStats]) -> Result<()> {
        if self.min_vals.is_empty() {
            self.min_vals = stats.iter().map(|s| s.min).collect();
            self.max_vals = stats.iter().map(|s| s.max).collect();
            self.peak_vals = stats.iter().map(|s| s.peak).collect();
        } else {
            if self.min_vals.len() != stats.len() {
                return Err(Error::ChannelMismatch {
                    expected: self.min_vals.len(),
                    got: stats.len(),
                });
            }
            let c = self.averaging_constant;
            for (i, s) in stats.iter().enumerate() {
                self.min_vals[i] += c * (s.min - self.min_vals[i]);
                self.max_vals[i] += c * (s.max - self.max_vals[i]);
                self.peak_vals[i] += c * (s.peak - self.peak_vals[i]);
            }
        }

        tracing::trace!(
            kind = %self.kind,
            groups = stats.len(),
            batches = self.num_batches + 1,
            "observer updated"
        );
        Ok(())
    }

    /// Zero-point reported before any statistics exist
    fn default_zero_point(&self) -> i32 {
        match self.symmetry {
            Symmetry::Affine => self.range.quant_min,
            Symmetry::Symmetric => self.range.center(),
        }
    }

    fn scale_zero_point(&self, min_val: f32, max_val: f32, peak: f32) -> (f32, i32) {
        let qmin = self.range.quant_min;
        let qmax = self.range.quant_max;

        let (scale, zero_point) = match self.symmetry {
            Symmetry::Affine => {
                // Zero must stay exactly representable
                let lo = min_val.min(0.0);
                let hi = max_val.max(0.0);
                let scale = ((hi - lo) / (qmax - qmin) as f32).max(f32::EPSILON);
                let zero_point = (qmin - (lo / scale).round() as i32).clamp(qmin, qmax);
                (scale, zero_point)
            }
            Symmetry::Symmetric => {
                let max_abs = match self.scale_quantization {
                    ScaleQuantization::PowerOfTwo => peak,
                    ScaleQuantization::Continuous => min_val.abs().max(max_val.abs()),
                };
                // Unsigned range with non-negative data uses every level
                if !self.range.is_signed() && min_val >= 0.0 {
                    let scale = (max_abs / (qmax - qmin) as f32).max(f32::EPSILON);
                    (scale, qmin)
                } else {
                    let half = (qmax - qmin) as f32 / 2.0;
                    let scale = (max_abs / half).max(f32::EPSILON);
                    (scale, self.range.center())
                }
            }
        };

        match self.scale_quantization {
            ScaleQuantization::Continuous => (scale, zero_point),
            ScaleQuantization::PowerOfTwo => (snap_power_of_two(scale), zero_point),
        }
    }
}

/// Snap a positive scale to the nearest power of two (in log2 space)
pub fn snap_power_of_two(scale: f32) -> f32 {
    if !scale.is_finite() || scale <= 0.0 {
        return 1.0;
    }
    2.0f32.powi(scale.log2().round() as i32)
}

#[derive(Clone, Copy, Debug)]
struct BatchStats {
    min: f32,
    max: f32,
    peak: f32,
}

fn batch_stats(values: impl Iterator<Item = f32>) -> BatchStats {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        // No finite values
        return BatchStats {
            min: 0.0,
            max: 0.0,
            peak: 0.0,
        };
    }
    BatchStats {
        min,
        max,
        peak: min.abs().max(max.abs()),
    }
}

/// Observer shared across calibration workers
///
/// Every update takes the observer's mutex, so batches are applied one at
/// a time.
#[derive(Clone, Debug)]
pub struct SharedObserver {
    inner: Arc<Mutex<Observer>>,
}

impl SharedObserver {
    pub fn new(observer: Observer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(observer)),
        }
    }

    pub fn observe(&self, data: &[f32]) -> Result<()> {
        self.inner
            .lock()
            .map_err(|_| Error::ObserverPoisoned)?
            .observe(data)
    }

    pub fn observe_channels(&self, data: ArrayView2<'_, f32>) -> Result<()> {
        self.inner
            .lock()
            .map_err(|_| Error::ObserverPoisoned)?
            .observe_channels(data)
    }

    /// Merge a worker-local observer into the shared one
    pub fn merge(&self, partial: &Observer) -> Result<()> {
        self.inner
            .lock()
            .map_err(|_| Error::ObserverPoisoned)?
            .merge(partial)
    }

    pub fn calculate_qparams(&self) -> Result<QParams> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| Error::ObserverPoisoned)?
            .calculate_qparams())
    }

    /// Copy of the current observer state
    pub fn snapshot(&self) -> Result<Observer> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| Error::ObserverPoisoned)?
            .clone())
    }

    #[cfg(test)]
    fn poison(&self) {
        let inner = Arc::clone(&self.inner);
        let _ = std::thread::spawn(move || {
            let _guard = inner.lock();
            panic!("worker failed while holding the observer lock");
        })
        .join();
    }
}
