//! Critical-band lookup.
//!
//! A band table is an ascending list of boundary frequencies; band `i` covers
//! `[boundaries[i], boundaries[i + 1])`. The top boundary is inclusive so the
//! highest tabulated frequency still lands in the last band. Anything below
//! the first boundary, above the last one, or NaN is out of range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Zwicker's critical-band edges in Hz (24 bands between 20 Hz and 15.5 kHz,
/// plus a final band up to 20 kHz).
pub const ZWICKER_BOUNDARIES: [f64; 26] = [
    20.0, 100.0, 200.0, 300.0, 400.0, 510.0, 630.0, 770.0, 920.0, 1080.0, 1270.0, 1480.0, 1720.0,
    2000.0, 2320.0, 2700.0, 3150.0, 3700.0, 4400.0, 5300.0, 6400.0, 7700.0, 9500.0, 12000.0,
    15500.0, 20000.0,
];

/// Errors from band table construction and lookup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BandError {
    #[error("Frequency {frequency} Hz is outside the critical-band table [{lower}, {upper}]")]
    OutOfRange { frequency: f64, lower: f64, upper: f64 },

    #[error("Invalid critical-band table: {0}")]
    InvalidTable(String),
}

/// What band statistics do with a tone whose frequency has no band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Fail the whole dataset variant
    #[default]
    Abort,
    /// Leave the tone out of band statistics; it is still exported
    Skip,
}

/// Ordered critical-band boundary table
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalBands {
    boundaries: Vec<f64>,
}

impl CriticalBands {
    /// Build a table from boundary frequencies
    ///
    /// # Errors
    ///
    /// Returns `BandError::InvalidTable` unless there are at least two finite,
    /// strictly ascending boundaries.
    pub fn new(boundaries: Vec<f64>) -> Result<Self, BandError> {
        if boundaries.len() < 2 {
            return Err(BandError::InvalidTable(format!(
                "need at least 2 boundaries, got {}",
                boundaries.len()
            )));
        }
        if let Some(bad) = boundaries.iter().find(|b| !b.is_finite()) {
            return Err(BandError::InvalidTable(format!("non-finite boundary {bad}")));
        }
        if let Some(pair) = boundaries.windows(2).find(|w| w[1] <= w[0]) {
            return Err(BandError::InvalidTable(format!(
                "boundaries not strictly ascending at {} -> {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { boundaries })
    }

    /// Zwicker's table
    #[must_use]
    pub fn zwicker() -> Self {
        Self {
            boundaries: ZWICKER_BOUNDARIES.to_vec(),
        }
    }

    /// Number of bands (one less than the number of boundaries)
    #[must_use]
    pub fn band_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    #[must_use]
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Lower and upper edge of `band`
    #[must_use]
    pub fn band_range(&self, band: usize) -> Option<(f64, f64)> {
        Some((*self.boundaries.get(band)?, *self.boundaries.get(band + 1)?))
    }

    /// Band index containing `frequency`
    ///
    /// # Errors
    ///
    /// Returns `BandError::OutOfRange` if no band contains it.
    pub fn locate(&self, frequency: f64) -> Result<usize, BandError> {
        locate_band(&self.boundaries, frequency).ok_or_else(|| BandError::OutOfRange {
            frequency,
            lower: self.boundaries[0],
            upper: self.boundaries[self.boundaries.len() - 1],
        })
    }
}

impl Default for CriticalBands {
    fn default() -> Self {
        Self::zwicker()
    }
}

/// Binary search for the band containing `frequency`.
///
/// `boundaries` must be ascending. Returns `None` when the frequency is
/// outside `[first, last]` or NaN, or when the table has fewer than two
/// boundaries.
#[must_use]
pub fn locate_band(boundaries: &[f64], frequency: f64) -> Option<usize> {
    let (&first, &last) = (boundaries.first()?, boundaries.last()?);
    if boundaries.len() < 2 || !(frequency >= first && frequency <= last) {
        return None;
    }
    let upper = boundaries.partition_point(|&b| b <= frequency);
    Some((upper - 1).min(boundaries.len() - 2))
}

/// Index of the STFT bin holding `frequency` for a given window and rate.
///
/// `None` for an empty window, a zero sample rate, or a frequency that is
/// negative or not finite.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn stft_bin(frequency: f64, window_size: usize, sample_rate: u32) -> Option<usize> {
    if window_size == 0 || sample_rate == 0 || !frequency.is_finite() || frequency < 0.0 {
        return None;
    }
    let step = f64::from(sample_rate) / window_size as f64;
    Some((frequency / step) as usize)
}
