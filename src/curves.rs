//! Masking-curve specifications grouped by experimental condition.
//!
//! Every probe/masker pair is observed from both sides:
//! - probe curves are keyed by `(masker_frequency, probe_level)` and collect
//!   probe frequencies per masker level
//! - masker curves are keyed by `(probe_frequency, masker_level)` and collect
//!   masker frequencies per probe level
//!
//! Conditions and levels keep first-seen order, observations keep arrival
//! order. Measurements are not aggregated here; the JSON carries a `[0]`
//! placeholder per frequency for downstream analysis to fill.

use crate::metrics::MaskingPoint;
use crate::stimulus::ProbeMaskerPair;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors from curve key parsing and spec serialization
#[derive(Error, Debug)]
pub enum CurveError {
    #[error("Invalid condition key '{0}': expected '<frequency>,<level>'")]
    InvalidKey(String),

    #[error("Failed to serialize curve specification: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to read curve specification {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// A fixed reference tone frequency and companion level
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConditionKey {
    /// Frequency of the tone held fixed, in Hz
    pub frequency: f64,
    /// Level of the companion tone held fixed, in dB SPL
    pub level: i32,
}

impl ConditionKey {
    #[must_use]
    pub const fn new(frequency: f64, level: i32) -> Self {
        Self { frequency, level }
    }

    // 0.0 and -0.0 are the same condition
    fn frequency_bits(&self) -> u64 {
        if self.frequency == 0.0 {
            0.0f64.to_bits()
        } else {
            self.frequency.to_bits()
        }
    }
}

impl PartialEq for ConditionKey {
    fn eq(&self, other: &Self) -> bool {
        self.frequency_bits() == other.frequency_bits() && self.level == other.level
    }
}

impl Eq for ConditionKey {}

impl Hash for ConditionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.frequency_bits().hash(state);
        self.level.hash(state);
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.frequency, self.level)
    }
}

impl FromStr for ConditionKey {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CurveError::InvalidKey(s.to_string());
        let (frequency, level) = s.split_once(',').ok_or_else(invalid)?;
        let frequency: f64 = frequency.trim().parse().map_err(|_| invalid())?;
        let level: i32 = level.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(frequency, level))
    }
}

/// Companion frequencies observed at one level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelObservations {
    pub level: i32,
    pub frequencies: Vec<f64>,
}

/// All observations recorded under one condition
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionCurves {
    pub key: ConditionKey,
    /// Per-level observation lists in first-seen level order
    pub levels: Vec<LevelObservations>,
}

impl ConditionCurves {
    fn new(key: ConditionKey) -> Self {
        Self {
            key,
            levels: Vec::new(),
        }
    }

    fn append(&mut self, level: i32, frequency: f64) {
        match self.levels.iter_mut().find(|l| l.level == level) {
            Some(observations) => observations.frequencies.push(frequency),
            None => self.levels.push(LevelObservations {
                level,
                frequencies: vec![frequency],
            }),
        }
    }

    /// Every `(level, frequency)` observation in recording order per level
    pub fn observations(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.levels
            .iter()
            .flat_map(|l| l.frequencies.iter().map(move |&f| (l.level, f)))
    }

    /// Number of observations under this condition
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.iter().map(|l| l.frequencies.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered two-level map: condition -> level -> observed frequencies
#[derive(Debug, Clone, Default)]
pub struct CurveGroups {
    conditions: Vec<ConditionCurves>,
    index: HashMap<ConditionKey, usize>,
}

impl CurveGroups {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `frequency` to the list for `level` under `key`, creating
    /// either entry on first use
    pub fn insert_or_append(&mut self, key: ConditionKey, level: i32, frequency: f64) {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.conditions.push(ConditionCurves::new(key));
                self.index.insert(key, self.conditions.len() - 1);
                self.conditions.len() - 1
            }
        };
        self.conditions[slot].append(level, frequency);
    }

    #[must_use]
    pub fn get(&self, key: &ConditionKey) -> Option<&ConditionCurves> {
        self.index.get(key).map(|&slot| &self.conditions[slot])
    }

    /// Conditions in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &ConditionCurves> {
        self.conditions.iter()
    }

    /// Number of conditions
    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Total observations across all conditions
    #[must_use]
    pub fn observation_count(&self) -> usize {
        self.conditions.iter().map(ConditionCurves::len).sum()
    }

    /// Append another group's observations after this one's
    pub fn merge(&mut self, other: &Self) {
        for condition in &other.conditions {
            for (level, frequency) in condition.observations() {
                self.insert_or_append(condition.key, level, frequency);
            }
        }
    }

    /// JSON-ready specs with placeholder masking values
    #[must_use]
    pub fn to_specs(&self) -> Vec<CurveSpec> {
        self.conditions
            .iter()
            .map(|condition| CurveSpec {
                masker_frequency: condition.key.frequency,
                probe_level: condition.key.level,
                curves: condition
                    .levels
                    .iter()
                    .map(|l| MaskerCurve {
                        masker_level: l.level,
                        probe_frequencies: l.frequencies.clone(),
                        probe_masking: vec![vec![0.0]; l.frequencies.len()],
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Accumulates probe-side and masker-side curve groups from pairs
#[derive(Debug, Clone, Default)]
pub struct CurveSpecBuilder {
    /// Keyed by `(masker_frequency, probe_level)`, probe frequencies per masker level
    pub probes: CurveGroups,
    /// Keyed by `(probe_frequency, masker_level)`, masker frequencies per probe level
    pub maskers: CurveGroups,
}

impl CurveSpecBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record both views of one pair
    pub fn record(&mut self, pair: &ProbeMaskerPair) {
        let ProbeMaskerPair { masker, probe } = *pair;
        self.probes.insert_or_append(
            ConditionKey::new(masker.frequency, probe.level),
            masker.level,
            probe.frequency,
        );
        self.maskers.insert_or_append(
            ConditionKey::new(probe.frequency, masker.level),
            probe.level,
            masker.frequency,
        );
    }

    /// Combine with a builder that saw a later slice of the pairs
    pub fn merge(&mut self, other: &Self) {
        self.probes.merge(&other.probes);
        self.maskers.merge(&other.maskers);
    }
}

/// One masking pattern: fixed reference frequency and fixed level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSpec {
    pub masker_frequency: f64,
    pub probe_level: i32,
    pub curves: Vec<MaskerCurve>,
}

impl CurveSpec {
    /// The condition this spec describes
    #[must_use]
    pub const fn key(&self) -> ConditionKey {
        ConditionKey::new(self.masker_frequency, self.probe_level)
    }

    /// Load specs, typically after downstream analysis filled in masking values
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_all<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, CurveError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CurveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Observations at one masker level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskerCurve {
    pub masker_level: i32,
    pub probe_frequencies: Vec<f64>,
    /// Measured masking per probe frequency, parallel to `probe_frequencies`
    pub probe_masking: Vec<Vec<f64>>,
}

impl MaskerCurve {
    /// Mean and spread of the masking measurements at each frequency
    #[must_use]
    pub fn masking_summary(&self) -> Vec<MaskingPoint> {
        self.probe_frequencies
            .iter()
            .zip(&self.probe_masking)
            .map(|(&frequency, samples)| MaskingPoint::from_samples(frequency, samples))
            .collect()
    }
}

/// Serialize specs as pretty JSON with `indent` spaces
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn specs_to_json(specs: &[CurveSpec], indent: usize) -> Result<String, CurveError> {
    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    specs.serialize(&mut serializer)?;
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
