//! Stimulus data model produced by the tone generator.
//!
//! The generator emits three shapes of data:
//! - Multi-tone examples grouped by tone count (`{"2": [..], "3": [..]}`)
//! - Probe/masker pairs for the two-tone masking set
//! - ISO equal-loudness reproduction entries keyed by an integer id
//!
//! Everything here is read-only after loading. Validation happens once, up
//! front, so that a malformed example aborts a run before any output exists.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Frequency of the reference tone in every ISO reproduction entry.
pub const ISO_REFERENCE_FREQUENCY: f64 = 1000.0;

/// Errors that can occur while loading or validating generator output
#[derive(Error, Debug)]
pub enum StimulusError {
    #[error("Malformed example at {location}: {reason}")]
    MalformedExample { location: String, reason: String },

    #[error("Failed to read generator output {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse generator output {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A single pure tone: frequency in Hz and level in dB SPL
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneLevel {
    /// Frequency in Hz
    #[serde(alias = "tone")]
    pub frequency: f64,
    /// Sound pressure level in dB
    pub level: i32,
}

impl ToneLevel {
    #[must_use]
    pub const fn new(frequency: f64, level: i32) -> Self {
        Self { frequency, level }
    }
}

/// One generated multi-tone example.
///
/// The three collections are parallel: tone `i` has frequency
/// `frequencies[i]`, level `levels[i]` and loudness `phons[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Tone frequencies in Hz, in generator order
    pub frequencies: Vec<f64>,
    /// Tone levels in dB SPL
    pub levels: Vec<i32>,
    /// Tone loudness in phons
    pub phons: Vec<i32>,
}

impl Example {
    /// Build a validated example
    ///
    /// # Errors
    ///
    /// Returns `StimulusError::MalformedExample` if the collections differ in length.
    pub fn new(
        frequencies: Vec<f64>,
        levels: Vec<i32>,
        phons: Vec<i32>,
    ) -> Result<Self, StimulusError> {
        let example = Self {
            frequencies,
            levels,
            phons,
        };
        example.validate("new example")?;
        Ok(example)
    }

    /// Number of simultaneous tones
    #[must_use]
    pub fn tone_count(&self) -> usize {
        self.frequencies.len()
    }

    /// Iterate over the tones in generator order
    pub fn tones(&self) -> impl Iterator<Item = ToneLevel> + '_ {
        self.frequencies
            .iter()
            .zip(self.levels.iter())
            .map(|(&frequency, &level)| ToneLevel::new(frequency, level))
    }

    /// Check that frequencies, levels and phons line up
    ///
    /// # Errors
    ///
    /// Returns `StimulusError::MalformedExample` naming `location` on mismatch.
    pub fn validate(&self, location: &str) -> Result<(), StimulusError> {
        let n = self.frequencies.len();
        if self.levels.len() != n || self.phons.len() != n {
            return Err(StimulusError::MalformedExample {
                location: location.to_string(),
                reason: format!(
                    "{} frequencies, {} levels, {} phons",
                    n,
                    self.levels.len(),
                    self.phons.len()
                ),
            });
        }
        if n == 0 {
            return Err(StimulusError::MalformedExample {
                location: location.to_string(),
                reason: "example has no tones".to_string(),
            });
        }
        Ok(())
    }
}

/// Multi-tone generator output: examples grouped by their tone count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedExamples {
    /// Tone count -> examples with that many tones, iterated in ascending order
    pub groups: BTreeMap<usize, Vec<Example>>,
}

impl GeneratedExamples {
    /// Load from a generator JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StimulusError> {
        read_json(path.as_ref())
    }

    /// Parse from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, StimulusError> {
        serde_json::from_str(json).map_err(|source| StimulusError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Add an example under its own tone count
    pub fn push(&mut self, example: Example) {
        self.groups
            .entry(example.tone_count())
            .or_default()
            .push(example);
    }

    /// Iterate `(group_tone_count, example)` in export order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Example)> {
        self.groups
            .iter()
            .flat_map(|(&count, examples)| examples.iter().map(move |e| (count, e)))
    }

    /// Total number of unique examples
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Whether there are no examples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate every example, including that it sits under the right tone count
    ///
    /// # Errors
    ///
    /// Returns the first `StimulusError::MalformedExample` found.
    pub fn validate(&self) -> Result<(), StimulusError> {
        for (&count, examples) in &self.groups {
            for (index, example) in examples.iter().enumerate() {
                let location = format!("group {count}, example {index}");
                example.validate(&location)?;
                if example.tone_count() != count {
                    return Err(StimulusError::MalformedExample {
                        location,
                        reason: format!(
                            "{} tones listed under tone count {count}",
                            example.tone_count()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One two-tone stimulus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeMaskerPair {
    /// The interfering tone
    pub masker: ToneLevel,
    /// The tone being judged
    pub probe: ToneLevel,
}

impl ProbeMaskerPair {
    #[must_use]
    pub const fn new(masker: ToneLevel, probe: ToneLevel) -> Self {
        Self { masker, probe }
    }

    /// Both tones in combined-representation order (masker first)
    #[must_use]
    pub const fn tones(&self) -> [ToneLevel; 2] {
        [self.masker, self.probe]
    }

    /// Load a list of pairs from a generator JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_all<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, StimulusError> {
        read_json(path.as_ref())
    }
}

/// A tone matched in loudness to the 1 kHz reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsoTone {
    /// Frequency in Hz
    pub frequency: f64,
    /// Level in dB SPL
    pub level: i32,
    /// Measurement uncertainty in dB, if published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
}

/// A reproduction of one published equal-loudness measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsoReproductionEntry {
    /// Level of the 1 kHz reference tone in dB SPL
    #[serde(rename = "ref1000_spl")]
    pub reference_level: i32,
    /// Tones judged equally loud as the reference
    pub other_tones: Vec<IsoTone>,
}

impl IsoReproductionEntry {
    /// The fixed 1 kHz reference tone
    #[must_use]
    pub const fn reference(&self) -> ToneLevel {
        ToneLevel::new(ISO_REFERENCE_FREQUENCY, self.reference_level)
    }
}

/// ISO reproduction entries keyed by id, iterated in ascending id order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsoReproductionSet {
    pub entries: BTreeMap<usize, IsoReproductionEntry>,
}

impl IsoReproductionSet {
    /// Load from a generator JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StimulusError> {
        read_json(path.as_ref())
    }

    /// Iterate entries in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &IsoReproductionEntry> {
        self.entries.values()
    }

    /// Total number of other tones across all entries
    #[must_use]
    pub fn tone_count(&self) -> usize {
        self.entries.values().map(|e| e.other_tones.len()).sum()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StimulusError> {
    let content = std::fs::read_to_string(path).map_err(|source| StimulusError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StimulusError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
