//! # Stimulus Dataset
//!
//! Assembly of psychoacoustic listening-test datasets from generated tone
//! stimuli.
//!
//! Two datasets are produced:
//!
//! - **Multi-tone**: examples of one or more simultaneous tones, one
//!   listener-facing row per tone.
//! - **Two-tone**: probe/masker pairs, exported as separate probe-side and
//!   masker-side files, plus per-condition masking-curve specifications.
//!   ISO equal-loudness reproduction examples ride along on the probe side.
//!
//! ## Pipeline
//!
//! ```text
//! Generator output (JSON)
//!        ↓
//! Normalization ("[f,l]" / "[[f1,l1],...]" rows)
//!        ↓
//! Critical-band statistics (co-occurrence, tone counts)
//!        ↓
//! Curve specifications (two-tone only)
//!        ↓
//! Seeded shuffle → CSV / ids / SPECS_*.json
//! ```
//!
//! The same input and seed always produce byte-identical files.

pub mod bands;
pub mod config;
pub mod cooccurrence;
pub mod curves;
pub mod dataset;
pub mod export;
pub mod loudness;
pub mod metrics;
pub mod normalize;
pub mod report;
pub mod stimulus;

pub use bands::{
    locate_band, stft_bin, BandError, CriticalBands, OutOfRangePolicy, ZWICKER_BOUNDARIES,
};
pub use config::{ConfigError, DatasetConfig};
pub use cooccurrence::{
    BandStatistics, CooccurrenceMatrix, PairBandMatrix, StatisticsError, ToneCountTable,
};
pub use curves::{
    specs_to_json, ConditionCurves, ConditionKey, CurveError, CurveGroups, CurveSpec,
    CurveSpecBuilder, MaskerCurve,
};
pub use dataset::{
    iso_points, DatasetAssembler, DatasetError, IsoPoint, MultiToneDataset, ToneCoverage,
    TwoToneDataset, TwoTonePaths,
};
pub use export::{
    shuffled_order, write_examples, ExportError, ExportPaths, ExportRecord, ShuffledExport,
    StagedFiles, DEFAULT_SEED,
};
pub use loudness::{equal_loudness_contours, Iso226, LoudnessModel};
pub use metrics::MaskingPoint;
pub use normalize::{
    combined_tone_repr, example_records, iso_records, pair_records, single_tone_repr,
    NormalizedRecord,
};
pub use report::{DatasetReport, DatasetVariant, ReportBuilder};
pub use stimulus::{
    Example, GeneratedExamples, IsoReproductionEntry, IsoReproductionSet, IsoTone,
    ProbeMaskerPair, StimulusError, ToneLevel,
};
