//! Canonical string representations of exported examples.
//!
//! A single tone renders as `[frequency,level]` and a tone combination as
//! `[[f1,l1],[f2,l2],...]` in generator order. Values pass through verbatim:
//! frequencies use the shortest round-trip float form, levels are integers.

use crate::stimulus::{Example, IsoReproductionEntry, ProbeMaskerPair, StimulusError, ToneLevel};
use serde::{Deserialize, Serialize};

/// Render one tone as `[frequency,level]`
#[must_use]
pub fn single_tone_repr(tone: ToneLevel) -> String {
    format!("[{},{}]", tone.frequency, tone.level)
}

/// Render a tone combination as `[[f1,l1],[f2,l2],...]`
#[must_use]
pub fn combined_tone_repr<I>(tones: I) -> String
where
    I: IntoIterator<Item = ToneLevel>,
{
    let parts: Vec<String> = tones.into_iter().map(single_tone_repr).collect();
    format!("[{}]", parts.join(","))
}

/// Render parallel frequency/level slices as a combination
///
/// # Errors
///
/// Returns `StimulusError::MalformedExample` if the slices differ in length.
pub fn combined_repr_from_parts(
    frequencies: &[f64],
    levels: &[i32],
) -> Result<String, StimulusError> {
    if frequencies.len() != levels.len() {
        return Err(StimulusError::MalformedExample {
            location: "combined representation".to_string(),
            reason: format!(
                "{} frequencies but {} levels",
                frequencies.len(),
                levels.len()
            ),
        });
    }
    Ok(combined_tone_repr(
        frequencies
            .iter()
            .zip(levels)
            .map(|(&frequency, &level)| ToneLevel::new(frequency, level)),
    ))
}

/// A normalized example row before an export id is assigned
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// The tone a listener judges, `[f,l]`
    pub single_tone: String,
    /// Every tone sounding together, `[[f,l],...]`
    pub combined_tones: String,
    /// Whether the row reproduces an ISO measurement
    pub iso_reproduction: bool,
}

impl NormalizedRecord {
    #[must_use]
    pub fn new(single_tone: String, combined_tones: String) -> Self {
        Self {
            single_tone,
            combined_tones,
            iso_reproduction: false,
        }
    }

    #[must_use]
    pub fn flagged(single_tone: String, combined_tones: String) -> Self {
        Self {
            single_tone,
            combined_tones,
            iso_reproduction: true,
        }
    }

    /// The `(single_tone, combined_tones)` content pair
    #[must_use]
    pub fn content(&self) -> (&str, &str) {
        (&self.single_tone, &self.combined_tones)
    }
}

/// One row per tone of `example`, all sharing the combined representation
///
/// # Errors
///
/// Returns `StimulusError::MalformedExample` if the example is inconsistent.
pub fn example_records(example: &Example) -> Result<Vec<NormalizedRecord>, StimulusError> {
    let combined = combined_repr_from_parts(&example.frequencies, &example.levels)?;
    Ok(example
        .tones()
        .map(|tone| NormalizedRecord::new(single_tone_repr(tone), combined.clone()))
        .collect())
}

/// The masker-side and probe-side rows derived from one pair
#[must_use]
pub fn pair_records(pair: &ProbeMaskerPair) -> (NormalizedRecord, NormalizedRecord) {
    let combined = combined_tone_repr(pair.tones());
    let masker = NormalizedRecord::new(single_tone_repr(pair.masker), combined.clone());
    let probe = NormalizedRecord::new(single_tone_repr(pair.probe), combined);
    (masker, probe)
}

/// Flagged rows for an ISO entry, each paired with the lone 1 kHz reference
#[must_use]
pub fn iso_records(entry: &IsoReproductionEntry) -> Vec<NormalizedRecord> {
    let combined = combined_tone_repr([entry.reference()]);
    entry
        .other_tones
        .iter()
        .map(|tone| {
            NormalizedRecord::flagged(
                single_tone_repr(ToneLevel::new(tone.frequency, tone.level)),
                combined.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stimulus::IsoTone;

    #[test]
    fn test_single_tone_repr_passes_values_through() {
        assert_eq!(single_tone_repr(ToneLevel::new(440.0, 50)), "[440,50]");
        assert_eq!(single_tone_repr(ToneLevel::new(440.5, -3)), "[440.5,-3]");
        assert_eq!(
            single_tone_repr(ToneLevel::new(1234.5678, 70)),
            "[1234.5678,70]"
        );
    }

    #[test]
    fn test_combined_repr_keeps_order() {
        let combined = combined_tone_repr([ToneLevel::new(2000.0, 70), ToneLevel::new(440.0, 50)]);
        assert_eq!(combined, "[[2000,70],[440,50]]");
    }

    #[test]
    fn test_combined_repr_from_parts_rejects_mismatch() {
        let result = combined_repr_from_parts(&[440.0, 1000.0], &[50]);
        assert!(matches!(
            result,
            Err(StimulusError::MalformedExample { .. })
        ));
    }

    #[test]
    fn test_example_records_one_per_tone() {
        let example = Example::new(vec![440.0, 1000.0, 2000.0], vec![50, 60, 70], vec![40, 60, 70])
            .unwrap();
        let records = example_records(&example).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].single_tone, "[440,50]");
        assert_eq!(records[2].single_tone, "[2000,70]");
        for record in &records {
            assert_eq!(record.combined_tones, "[[440,50],[1000,60],[2000,70]]");
            assert!(!record.iso_reproduction);
        }
    }

    #[test]
    fn test_example_records_rejects_unvalidated_example() {
        let example = Example {
            frequencies: vec![440.0, 1000.0],
            levels: vec![50],
            phons: vec![40, 60],
        };
        assert!(example_records(&example).is_err());
    }

    #[test]
    fn test_pair_records_share_combination() {
        let pair = ProbeMaskerPair::new(ToneLevel::new(1000.0, 60), ToneLevel::new(1200.0, 30));
        let (masker, probe) = pair_records(&pair);

        assert_eq!(masker.single_tone, "[1000,60]");
        assert_eq!(probe.single_tone, "[1200,30]");
        assert_eq!(masker.combined_tones, "[[1000,60],[1200,30]]");
        assert_eq!(masker.combined_tones, probe.combined_tones);
    }

    #[test]
    fn test_iso_records_are_flagged() {
        let entry = IsoReproductionEntry {
            reference_level: 40,
            other_tones: vec![
                IsoTone {
                    frequency: 100.0,
                    level: 62,
                    error: None,
                },
                IsoTone {
                    frequency: 4000.0,
                    level: 36,
                    error: Some(2.0),
                },
            ],
        };
        let records = iso_records(&entry);

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.iso_reproduction));
        assert!(records.iter().all(|r| r.combined_tones == "[[1000,40]]"));
        assert_eq!(records[1].single_tone, "[4000,36]");
    }
}
