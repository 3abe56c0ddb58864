//! Summary statistics over repeated masking measurements.

use serde::{Deserialize, Serialize};

/// Mean and spread of the measurements at one probe frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskingPoint {
    /// Probe frequency in Hz
    pub frequency: f64,
    /// Mean masked level
    pub mean: f64,
    /// Population standard deviation of the masked level
    pub std_dev: f64,
    /// Number of measurements
    pub count: usize,
}

impl MaskingPoint {
    /// Summarize the measurements taken at `frequency`
    #[must_use]
    pub fn from_samples(frequency: f64, samples: &[f64]) -> Self {
        Self {
            frequency,
            mean: compute_mean(samples),
            std_dev: compute_population_std(samples),
            count: samples.len(),
        }
    }
}

/// Compute mean of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Compute population standard deviation of samples (divides by `n`)
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_population_std(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = compute_mean(samples);
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    variance.sqrt()
}
