//! Critical-band statistics accumulated over one pass of the examples.
//!
//! - `CooccurrenceMatrix`: symmetric counts of band pairs sounding together
//! - `ToneCountTable`: per band, how many tone instances came from examples
//!   with a given number of tones
//! - `PairBandMatrix`: directed masker-band x probe-band counts for two-tone sets
//!
//! All accumulators are purely additive, so partial results built over
//! disjoint slices of the data combine with `merge`.

use crate::bands::{BandError, CriticalBands, OutOfRangePolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::warn;

/// Errors raised while accumulating band statistics
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatisticsError {
    #[error("Band index {band} out of range for {band_count} bands")]
    BandIndex { band: usize, band_count: usize },

    #[error("Cannot merge statistics over {left} and {right} bands")]
    SizeMismatch { left: usize, right: usize },
}

/// Square, symmetric count matrix over critical bands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooccurrenceMatrix {
    size: usize,
    counts: Vec<u64>,
}

impl CooccurrenceMatrix {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            counts: vec![0; size * size],
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Count at row `i`, column `j` (zero outside the matrix)
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> u64 {
        if i >= self.size || j >= self.size {
            return 0;
        }
        self.counts[i * self.size + j]
    }

    /// Record the bands of one example.
    ///
    /// Every unordered pair of distinct bands present in the example adds one
    /// to both `M[a][b]` and `M[b][a]`. Repeated bands within an example count
    /// once, and an example confined to a single band changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `StatisticsError::BandIndex` if a band is outside the matrix;
    /// the matrix is left untouched in that case.
    pub fn record_bands(&mut self, bands: &[usize]) -> Result<(), StatisticsError> {
        if let Some(&band) = bands.iter().find(|&&b| b >= self.size) {
            return Err(StatisticsError::BandIndex {
                band,
                band_count: self.size,
            });
        }
        let distinct: BTreeSet<usize> = bands.iter().copied().collect();
        let distinct: Vec<usize> = distinct.into_iter().collect();
        for (k, &a) in distinct.iter().enumerate() {
            for &b in &distinct[k + 1..] {
                self.counts[a * self.size + b] += 1;
                self.counts[b * self.size + a] += 1;
            }
        }
        Ok(())
    }

    /// Elementwise sum with another matrix of the same size
    ///
    /// # Errors
    ///
    /// Returns `StatisticsError::SizeMismatch` if the sizes differ.
    pub fn merge(&mut self, other: &Self) -> Result<(), StatisticsError> {
        if self.size != other.size {
            return Err(StatisticsError::SizeMismatch {
                left: self.size,
                right: other.size,
            });
        }
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        (0..self.size).all(|i| (i + 1..self.size).all(|j| self.get(i, j) == self.get(j, i)))
    }

    /// Sum of all cells
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Row-major copy for heatmap rendering
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<u64>> {
        self.counts
            .chunks(self.size.max(1))
            .take(self.size)
            .map(<[u64]>::to_vec)
            .collect()
    }
}

/// Directed band-pair counts: row is the masker band, column the probe band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairBandMatrix {
    size: usize,
    counts: Vec<u64>,
}

impl PairBandMatrix {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            counts: vec![0; size * size],
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn get(&self, from: usize, to: usize) -> u64 {
        if from >= self.size || to >= self.size {
            return 0;
        }
        self.counts[from * self.size + to]
    }

    /// Count one `from -> to` observation
    ///
    /// # Errors
    ///
    /// Returns `StatisticsError::BandIndex` if either band is outside the matrix.
    pub fn record(&mut self, from: usize, to: usize) -> Result<(), StatisticsError> {
        for band in [from, to] {
            if band >= self.size {
                return Err(StatisticsError::BandIndex {
                    band,
                    band_count: self.size,
                });
            }
        }
        self.counts[from * self.size + to] += 1;
        Ok(())
    }

    /// The same counts seen from the other side (rows become columns)
    #[must_use]
    pub fn transposed(&self) -> Self {
        let mut out = Self::new(self.size);
        for from in 0..self.size {
            for to in 0..self.size {
                out.counts[to * self.size + from] = self.counts[from * self.size + to];
            }
        }
        out
    }

    /// Elementwise sum with another matrix of the same size
    ///
    /// # Errors
    ///
    /// Returns `StatisticsError::SizeMismatch` if the sizes differ.
    pub fn merge(&mut self, other: &Self) -> Result<(), StatisticsError> {
        if self.size != other.size {
            return Err(StatisticsError::SizeMismatch {
                left: self.size,
                right: other.size,
            });
        }
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
        Ok(())
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    #[must_use]
    pub fn rows(&self) -> Vec<Vec<u64>> {
        self.counts
            .chunks(self.size.max(1))
            .take(self.size)
            .map(<[u64]>::to_vec)
            .collect()
    }
}

/// `band -> (tone_count -> occurrences)`, one increment per tone instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneCountTable {
    counts: BTreeMap<usize, BTreeMap<usize, u64>>,
}

impl ToneCountTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one tone in `band` that came from a `tone_count`-tone example
    pub fn record(&mut self, band: usize, tone_count: usize) {
        *self
            .counts
            .entry(band)
            .or_default()
            .entry(tone_count)
            .or_insert(0) += 1;
    }

    /// Occurrences for a band and tone count
    #[must_use]
    pub fn get(&self, band: usize, tone_count: usize) -> u64 {
        self.counts
            .get(&band)
            .and_then(|m| m.get(&tone_count))
            .copied()
            .unwrap_or(0)
    }

    /// Distribution for one band
    #[must_use]
    pub fn band(&self, band: usize) -> Option<&BTreeMap<usize, u64>> {
        self.counts.get(&band)
    }

    /// Tone instances observed in `band`
    #[must_use]
    pub fn band_total(&self, band: usize) -> u64 {
        self.counts.get(&band).map_or(0, |m| m.values().sum())
    }

    /// Tone instances observed across all bands
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().flat_map(BTreeMap::values).sum()
    }

    /// Iterate bands in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeMap<usize, u64>)> {
        self.counts.iter().map(|(&band, m)| (band, m))
    }

    /// Average tone count of the examples that put a tone in each band
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_tone_count_per_band(&self) -> Vec<(usize, f64)> {
        self.counts
            .iter()
            .filter_map(|(&band, dist)| {
                let occurrences: u64 = dist.values().sum();
                if occurrences == 0 {
                    return None;
                }
                let weighted: u64 = dist.iter().map(|(&count, &n)| count as u64 * n).sum();
                Some((band, weighted as f64 / occurrences as f64))
            })
            .collect()
    }

    /// Add another table's counts into this one
    pub fn merge(&mut self, other: &Self) {
        for (&band, dist) in &other.counts {
            let mine = self.counts.entry(band).or_default();
            for (&tone_count, &n) in dist {
                *mine.entry(tone_count).or_insert(0) += n;
            }
        }
    }
}

/// Accumulator for co-occurrence and tone-count statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandStatistics {
    /// Symmetric band co-occurrence counts
    pub cooccurrence: CooccurrenceMatrix,
    /// Per-band tone-count distribution
    pub tone_counts: ToneCountTable,
    /// Tones left out because their frequency had no band
    pub skipped_tones: usize,
}

impl BandStatistics {
    #[must_use]
    pub fn new(band_count: usize) -> Self {
        Self {
            cooccurrence: CooccurrenceMatrix::new(band_count),
            tone_counts: ToneCountTable::new(),
            skipped_tones: 0,
        }
    }

    /// Record one example given the band of each of its tones.
    ///
    /// `tone_count` is the number of tones in the whole example, which can
    /// exceed `bands.len()` when out-of-range tones were skipped.
    ///
    /// # Errors
    ///
    /// Returns `StatisticsError::BandIndex` if a band is outside the table.
    pub fn record_example(
        &mut self,
        bands: &[usize],
        tone_count: usize,
    ) -> Result<(), StatisticsError> {
        self.cooccurrence.record_bands(bands)?;
        for &band in bands {
            self.tone_counts.record(band, tone_count);
        }
        Ok(())
    }

    /// Combine statistics gathered over another slice of the data
    ///
    /// # Errors
    ///
    /// Returns `StatisticsError::SizeMismatch` if the band tables differ in size.
    pub fn merge(&mut self, other: &Self) -> Result<(), StatisticsError> {
        self.cooccurrence.merge(&other.cooccurrence)?;
        self.tone_counts.merge(&other.tone_counts);
        self.skipped_tones += other.skipped_tones;
        Ok(())
    }

    /// Locate the band of every frequency, applying `policy` to misses.
    ///
    /// With `OutOfRangePolicy::Skip` the missing tones are dropped from the
    /// returned list and added to `skipped_tones`.
    ///
    /// # Errors
    ///
    /// Returns `BandError::OutOfRange` under `OutOfRangePolicy::Abort`.
    pub fn resolve_bands(
        &mut self,
        table: &CriticalBands,
        frequencies: &[f64],
        policy: OutOfRangePolicy,
    ) -> Result<Vec<usize>, BandError> {
        let mut bands = Vec::with_capacity(frequencies.len());
        for &frequency in frequencies {
            match table.locate(frequency) {
                Ok(band) => bands.push(band),
                Err(err) => match policy {
                    OutOfRangePolicy::Abort => return Err(err),
                    OutOfRangePolicy::Skip => {
                        warn!(frequency, "Tone outside critical-band table, skipping");
                        self.skipped_tones += 1;
                    }
                },
            }
        }
        Ok(bands)
    }
}
