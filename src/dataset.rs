//! Dataset assembly: one pass per dataset variant.
//!
//! Each pass normalizes the generator output into records, accumulates band
//! statistics and (for the two-tone set) curve specifications, then shuffles
//! the records for export. Nothing touches the filesystem until the whole
//! variant has been assembled; the files are then committed together.

use crate::bands::{BandError, CriticalBands};
use crate::config::{ConfigError, DatasetConfig};
use crate::cooccurrence::{BandStatistics, PairBandMatrix, StatisticsError};
use crate::curves::{specs_to_json, CurveError, CurveSpecBuilder};
use crate::export::{ExportError, ExportPaths, ShuffledExport, StagedFiles};
use crate::normalize::{example_records, iso_records, pair_records, NormalizedRecord};
use crate::stimulus::{GeneratedExamples, IsoReproductionSet, ProbeMaskerPair, StimulusError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Stem of the multi-tone export files
pub const MULTI_TONE_STEM: &str = "data";
/// Stem of the probe-side two-tone export files
pub const PROBES_STEM: &str = "probes_two_tone_set";
/// Stem of the masker-side two-tone export files
pub const MASKERS_STEM: &str = "maskers_two_tone_set";
/// File name of the ISO reproduction listing
pub const ISO_REPRO_FILE: &str = "data_iso_repro.csv";

/// Errors that abort a dataset variant
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Malformed example at {location}: {reason}")]
    MalformedExample { location: String, reason: String },

    #[error("Frequency {frequency} Hz at {location} is outside the critical-band table")]
    OutOfRangeFrequency { frequency: f64, location: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    Input(StimulusError),

    #[error("Band statistics error: {0}")]
    Statistics(#[from] StatisticsError),

    #[error("Curve specification error: {0}")]
    Curves(#[from] CurveError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<StimulusError> for DatasetError {
    fn from(err: StimulusError) -> Self {
        match err {
            StimulusError::MalformedExample { location, reason } => {
                Self::MalformedExample { location, reason }
            }
            other => Self::Input(other),
        }
    }
}

impl From<ExportError> for DatasetError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Io { path, source } => Self::Io { path, source },
        }
    }
}

impl DatasetError {
    fn out_of_range(err: BandError, location: String) -> Self {
        match err {
            BandError::OutOfRange { frequency, .. } => {
                Self::OutOfRangeFrequency { frequency, location }
            }
            other => Self::Config(ConfigError::InvalidBands(other)),
        }
    }
}

/// Raw per-tone and per-example arrays in generation order, for plotting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToneCoverage {
    /// Frequency of every tone
    pub frequencies: Vec<f64>,
    /// Level of every tone
    pub levels: Vec<i32>,
    /// Loudness of every tone (empty for two-tone sets)
    pub phons: Vec<i32>,
    /// Tone count of every example
    pub tone_counts: Vec<usize>,
}

/// One plotted point of an ISO reproduction entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsoPoint {
    /// Position of the entry in ascending id order
    pub entry: usize,
    pub frequency: f64,
    pub level: i32,
    pub error: Option<f64>,
}

/// Reference and matched tones of every ISO entry, in id order
#[must_use]
pub fn iso_points(iso: &IsoReproductionSet) -> (Vec<IsoPoint>, Vec<IsoPoint>) {
    let mut references = Vec::new();
    let mut points = Vec::new();
    for (entry, item) in iso.iter().enumerate() {
        let reference = item.reference();
        references.push(IsoPoint {
            entry,
            frequency: reference.frequency,
            level: reference.level,
            error: None,
        });
        points.extend(item.other_tones.iter().map(|tone| IsoPoint {
            entry,
            frequency: tone.frequency,
            level: tone.level,
            error: tone.error,
        }));
    }
    (references, points)
}

/// Everything produced by one multi-tone pass
#[derive(Debug, Clone)]
pub struct MultiToneDataset {
    /// Normalized rows in generation order
    pub records: Vec<NormalizedRecord>,
    /// Rows in export order
    pub export: ShuffledExport,
    /// Co-occurrence and per-band tone-count statistics
    pub statistics: BandStatistics,
    pub coverage: ToneCoverage,
    /// Number of generated examples
    pub unique_examples: usize,
    /// Number of listener-facing rows (one per tone of every example)
    pub listener_examples: usize,
}

impl MultiToneDataset {
    /// Queue `data.csv` and `data_ids.csv`
    pub fn stage(&self, dir: &Path, staged: &mut StagedFiles) -> ExportPaths {
        staged.stage_export(dir, MULTI_TONE_STEM, &self.export)
    }
}

/// Everything produced by one two-tone pass
#[derive(Debug, Clone)]
pub struct TwoToneDataset {
    /// Probe-side rows (pairs then ISO entries) in generation order
    pub probe_records: Vec<NormalizedRecord>,
    /// Masker-side rows in generation order
    pub masker_records: Vec<NormalizedRecord>,
    pub probe_export: ShuffledExport,
    pub masker_export: ShuffledExport,
    /// Symmetric band co-occurrence of masker and probe
    pub statistics: BandStatistics,
    /// Directed counts, row = masker band, column = probe band
    pub masker_to_probe: PairBandMatrix,
    pub probe_coverage: ToneCoverage,
    pub masker_coverage: ToneCoverage,
    pub curves: CurveSpecBuilder,
    /// Number of probe/masker pairs
    pub pair_count: usize,
    /// Number of flagged ISO rows on the probe side
    pub iso_rows: usize,
}

/// Files written for the two-tone set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoTonePaths {
    pub probes: ExportPaths,
    pub maskers: ExportPaths,
    pub probe_specs: PathBuf,
    pub masker_specs: PathBuf,
}

impl TwoToneDataset {
    /// Queue both exports and both curve specification files
    ///
    /// # Errors
    ///
    /// Returns an error if the curve specifications cannot be serialized.
    pub fn stage(
        &self,
        dir: &Path,
        json_indent: usize,
        staged: &mut StagedFiles,
    ) -> Result<TwoTonePaths, DatasetError> {
        let probes = staged.stage_export(dir, PROBES_STEM, &self.probe_export);
        let maskers = staged.stage_export(dir, MASKERS_STEM, &self.masker_export);

        let probe_specs = dir.join(format!("SPECS_{PROBES_STEM}.json"));
        let masker_specs = dir.join(format!("SPECS_{MASKERS_STEM}.json"));
        staged.stage(
            probe_specs.clone(),
            specs_to_json(&self.curves.probes.to_specs(), json_indent)?,
        );
        staged.stage(
            masker_specs.clone(),
            specs_to_json(&self.curves.maskers.to_specs(), json_indent)?,
        );

        Ok(TwoTonePaths {
            probes,
            maskers,
            probe_specs,
            masker_specs,
        })
    }
}

/// Drives normalization, statistics, curve building and export
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    config: DatasetConfig,
    bands: CriticalBands,
}

impl DatasetAssembler {
    /// Create an assembler from a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured band table is invalid.
    pub fn new(config: DatasetConfig) -> Result<Self, DatasetError> {
        config.validate()?;
        let bands = config.bands()?;
        Ok(Self { config, bands })
    }

    #[must_use]
    pub const fn config(&self) -> &DatasetConfig {
        &self.config
    }

    #[must_use]
    pub const fn bands(&self) -> &CriticalBands {
        &self.bands
    }

    /// Assemble the multi-tone dataset in memory
    ///
    /// # Errors
    ///
    /// Fails on the first malformed example or, under the abort policy, the
    /// first tone outside the band table.
    pub fn build_multi_tone(
        &self,
        data: &GeneratedExamples,
    ) -> Result<MultiToneDataset, DatasetError> {
        data.validate()?;
        info!(examples = data.len(), "Assembling multi-tone dataset");

        let mut records = Vec::new();
        let mut statistics = BandStatistics::new(self.bands.band_count());
        let mut coverage = ToneCoverage::default();

        for (count, examples) in &data.groups {
            debug!(tone_count = count, examples = examples.len(), "Processing group");
            for (index, example) in examples.iter().enumerate() {
                records.extend(example_records(example)?);

                let bands = statistics
                    .resolve_bands(&self.bands, &example.frequencies, self.config.out_of_range)
                    .map_err(|e| {
                        DatasetError::out_of_range(e, format!("group {count}, example {index}"))
                    })?;
                statistics.record_example(&bands, *count)?;

                coverage.frequencies.extend_from_slice(&example.frequencies);
                coverage.levels.extend_from_slice(&example.levels);
                coverage.phons.extend_from_slice(&example.phons);
                coverage.tone_counts.push(*count);
            }
        }

        let export = ShuffledExport::new(&records, self.config.seed);
        let dataset = MultiToneDataset {
            unique_examples: data.len(),
            listener_examples: records.len(),
            records,
            export,
            statistics,
            coverage,
        };
        info!(
            unique = dataset.unique_examples,
            listener = dataset.listener_examples,
            skipped = dataset.statistics.skipped_tones,
            "Multi-tone dataset assembled"
        );
        Ok(dataset)
    }

    /// Assemble and write `data.csv` / `data_ids.csv` into `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if assembly fails or any file cannot be written; in
    /// either case no output file is left behind.
    pub fn write_multi_tone(
        &self,
        data: &GeneratedExamples,
        dir: &Path,
    ) -> Result<(MultiToneDataset, ExportPaths), DatasetError> {
        let dataset = self.build_multi_tone(data)?;
        ensure_dir(dir)?;
        let mut staged = StagedFiles::new();
        let paths = dataset.stage(dir, &mut staged);
        staged.commit()?;
        Ok((dataset, paths))
    }

    /// Assemble the two-tone dataset in memory.
    ///
    /// Pairs yield one masker-side and one probe-side row each; ISO entries
    /// are appended to the probe side only and flagged.
    ///
    /// # Errors
    ///
    /// Under the abort policy, fails on the first tone outside the band table.
    pub fn build_two_tone(
        &self,
        pairs: &[ProbeMaskerPair],
        iso: &IsoReproductionSet,
    ) -> Result<TwoToneDataset, DatasetError> {
        info!(pairs = pairs.len(), iso_entries = iso.entries.len(), "Assembling two-tone dataset");

        let band_count = self.bands.band_count();
        let mut probe_records = Vec::with_capacity(pairs.len() + iso.tone_count());
        let mut masker_records = Vec::with_capacity(pairs.len());
        let mut statistics = BandStatistics::new(band_count);
        let mut masker_to_probe = PairBandMatrix::new(band_count);
        let mut probe_coverage = ToneCoverage::default();
        let mut masker_coverage = ToneCoverage::default();
        let mut curves = CurveSpecBuilder::new();

        for (index, pair) in pairs.iter().enumerate() {
            let (masker_record, probe_record) = pair_records(pair);
            masker_records.push(masker_record);
            probe_records.push(probe_record);

            let frequencies = [pair.masker.frequency, pair.probe.frequency];
            let bands = statistics
                .resolve_bands(&self.bands, &frequencies, self.config.out_of_range)
                .map_err(|e| DatasetError::out_of_range(e, format!("pair {index}")))?;
            statistics.record_example(&bands, 2)?;
            if let [masker_band, probe_band] = bands[..] {
                masker_to_probe.record(masker_band, probe_band)?;
            }

            masker_coverage.frequencies.push(pair.masker.frequency);
            masker_coverage.levels.push(pair.masker.level);
            probe_coverage.frequencies.push(pair.probe.frequency);
            probe_coverage.levels.push(pair.probe.level);

            curves.record(pair);
        }

        let mut iso_rows = 0;
        for entry in iso.iter() {
            let rows = iso_records(entry);
            iso_rows += rows.len();
            probe_records.extend(rows);
        }

        let seed = self.config.seed;
        let dataset = TwoToneDataset {
            probe_export: ShuffledExport::new(&probe_records, seed),
            masker_export: ShuffledExport::new(&masker_records, seed),
            probe_records,
            masker_records,
            statistics,
            masker_to_probe,
            probe_coverage,
            masker_coverage,
            curves,
            pair_count: pairs.len(),
            iso_rows,
        };
        info!(
            probe_rows = dataset.probe_records.len(),
            masker_rows = dataset.masker_records.len(),
            iso_rows,
            conditions = dataset.curves.probes.len(),
            "Two-tone dataset assembled"
        );
        Ok(dataset)
    }

    /// Assemble and write the two-tone exports and curve specs into `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if assembly fails or any file cannot be written; in
    /// either case no output file is left behind.
    pub fn write_two_tone(
        &self,
        pairs: &[ProbeMaskerPair],
        iso: &IsoReproductionSet,
        dir: &Path,
    ) -> Result<(TwoToneDataset, TwoTonePaths), DatasetError> {
        let dataset = self.build_two_tone(pairs, iso)?;
        ensure_dir(dir)?;
        let mut staged = StagedFiles::new();
        let paths = dataset.stage(dir, self.config.json_indent, &mut staged)?;
        staged.commit()?;
        Ok((dataset, paths))
    }

    /// Write every ISO reproduction tone, in source order, to `data_iso_repro.csv`
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::Io` if the file cannot be written.
    pub fn write_iso_reproduction(
        &self,
        iso: &IsoReproductionSet,
        dir: &Path,
    ) -> Result<PathBuf, DatasetError> {
        let records: Vec<NormalizedRecord> = iso.iter().flat_map(iso_records).collect();
        let export = ShuffledExport::sequential(&records);
        ensure_dir(dir)?;

        let path = dir.join(ISO_REPRO_FILE);
        let mut staged = StagedFiles::new();
        staged.stage(path.clone(), export.records_csv());
        staged.commit()?;
        info!(rows = records.len(), path = %path.display(), "Wrote ISO reproduction examples");
        Ok(path)
    }
}

impl Default for DatasetAssembler {
    fn default() -> Self {
        Self {
            config: DatasetConfig::default(),
            bands: CriticalBands::default(),
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<(), DatasetError> {
    std::fs::create_dir_all(dir).map_err(|source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    })
}
