//! Run reports for assembled datasets.
//!
//! A report summarizes one assembly pass: how many examples went in, how
//! many rows came out, which files were written, and how the tones spread
//! over the critical bands.

use crate::bands::CriticalBands;
use crate::cooccurrence::BandStatistics;
use crate::dataset::{MultiToneDataset, TwoToneDataset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::path::PathBuf;
use tabled::{Table, Tabled};

/// Which dataset a report describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetVariant {
    MultiTone,
    TwoTone,
}

impl std::fmt::Display for DatasetVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultiTone => write!(f, "multi-tone"),
            Self::TwoTone => write!(f, "two-tone"),
        }
    }
}

/// Full report for one assembly pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    /// Per-band tone statistics, bands with no tones omitted
    pub bands: Vec<BandReport>,
    /// Files written by the pass
    pub files: Vec<PathBuf>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub title: String,
    pub variant: DatasetVariant,
    pub generated_at: DateTime<Utc>,
    /// Crate version that produced the files
    pub framework_version: String,
    /// Shuffle seed
    pub seed: u64,
}

/// Headline counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Generated examples (multi-tone) or probe/masker pairs (two-tone)
    pub unique_examples: usize,
    /// Rows written across all record files
    pub exported_rows: usize,
    /// Rows flagged as ISO reproduction examples
    pub flagged_rows: usize,
    /// Tones dropped because no band contained them
    pub skipped_tones: usize,
    /// Sum of all co-occurrence matrix entries
    pub cooccurrence_total: u64,
    /// Probe-side curve conditions (two-tone only)
    pub probe_conditions: usize,
    /// Masker-side curve conditions (two-tone only)
    pub masker_conditions: usize,
}

/// Tone statistics of one critical band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandReport {
    pub band: usize,
    pub lower_hz: f64,
    pub upper_hz: f64,
    /// Tones that fell into the band
    pub tones: u64,
    /// Average size of the examples those tones came from
    pub mean_tone_count: f64,
    /// Tone count -> number of tones
    pub tone_counts: BTreeMap<usize, u64>,
}

/// Builds a `DatasetReport` from an assembled dataset
pub struct ReportBuilder {
    title: String,
    bands: CriticalBands,
    seed: u64,
    files: Vec<PathBuf>,
}

impl ReportBuilder {
    #[must_use]
    pub fn new(title: &str, bands: &CriticalBands, seed: u64) -> Self {
        Self {
            title: title.to_string(),
            bands: bands.clone(),
            seed,
            files: Vec::new(),
        }
    }

    /// Record the files the pass wrote
    #[must_use]
    pub fn with_files<I: IntoIterator<Item = PathBuf>>(mut self, files: I) -> Self {
        self.files.extend(files);
        self
    }

    /// Report on a multi-tone pass
    #[must_use]
    pub fn multi_tone(self, dataset: &MultiToneDataset) -> DatasetReport {
        let summary = ReportSummary {
            unique_examples: dataset.unique_examples,
            exported_rows: dataset.export.len(),
            flagged_rows: dataset.export.flagged_ids.len(),
            skipped_tones: dataset.statistics.skipped_tones,
            cooccurrence_total: dataset.statistics.cooccurrence.total(),
            ..ReportSummary::default()
        };
        self.build(DatasetVariant::MultiTone, summary, &dataset.statistics)
    }

    /// Report on a two-tone pass
    #[must_use]
    pub fn two_tone(self, dataset: &TwoToneDataset) -> DatasetReport {
        let summary = ReportSummary {
            unique_examples: dataset.pair_count,
            exported_rows: dataset.probe_export.len() + dataset.masker_export.len(),
            flagged_rows: dataset.probe_export.flagged_ids.len(),
            skipped_tones: dataset.statistics.skipped_tones,
            cooccurrence_total: dataset.statistics.cooccurrence.total(),
            probe_conditions: dataset.curves.probes.len(),
            masker_conditions: dataset.curves.maskers.len(),
        };
        self.build(DatasetVariant::TwoTone, summary, &dataset.statistics)
    }

    fn build(
        self,
        variant: DatasetVariant,
        summary: ReportSummary,
        statistics: &BandStatistics,
    ) -> DatasetReport {
        let means: BTreeMap<usize, f64> = statistics
            .tone_counts
            .mean_tone_count_per_band()
            .into_iter()
            .collect();

        let bands = statistics
            .tone_counts
            .iter()
            .filter_map(|(band, counts)| {
                let (lower_hz, upper_hz) = self.bands.band_range(band)?;
                Some(BandReport {
                    band,
                    lower_hz,
                    upper_hz,
                    tones: counts.values().sum(),
                    mean_tone_count: means.get(&band).copied().unwrap_or(0.0),
                    tone_counts: counts.clone(),
                })
            })
            .collect();

        DatasetReport {
            metadata: ReportMetadata {
                title: self.title,
                variant,
                generated_at: Utc::now(),
                framework_version: env!("CARGO_PKG_VERSION").to_string(),
                seed: self.seed,
            },
            summary,
            bands,
            files: self.files,
        }
    }
}

/// Table row for markdown/text output
#[derive(Tabled)]
struct BandTableRow {
    #[tabled(rename = "Band")]
    band: usize,
    #[tabled(rename = "Range (Hz)")]
    range: String,
    #[tabled(rename = "Tones")]
    tones: u64,
    #[tabled(rename = "Mean tone count")]
    mean_tone_count: String,
}

impl DatasetReport {
    /// Render report as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn band_table(&self) -> String {
        let rows: Vec<BandTableRow> = self
            .bands
            .iter()
            .map(|b| BandTableRow {
                band: b.band,
                range: format!("{}-{}", b.lower_hz, b.upper_hz),
                tones: b.tones,
                mean_tone_count: format!("{:.2}", b.mean_tone_count),
            })
            .collect();
        Table::new(rows).to_string()
    }

    /// Render report as markdown
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        writeln!(output, "# {}", self.metadata.title).ok();
        writeln!(output).ok();
        writeln!(
            output,
            "**Generated:** {}",
            self.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .ok();
        writeln!(
            output,
            "**Framework Version:** {}",
            self.metadata.framework_version
        )
        .ok();
        writeln!(output, "**Dataset:** {}", self.metadata.variant).ok();
        writeln!(output, "**Seed:** {}", self.metadata.seed).ok();
        writeln!(output).ok();

        writeln!(output, "## Summary").ok();
        writeln!(output).ok();
        writeln!(output, "| Metric | Value |").ok();
        writeln!(output, "|--------|-------|").ok();
        writeln!(
            output,
            "| Unique Examples | {} |",
            self.summary.unique_examples
        )
        .ok();
        writeln!(output, "| Exported Rows | {} |", self.summary.exported_rows).ok();
        writeln!(output, "| ISO Rows | {} |", self.summary.flagged_rows).ok();
        writeln!(output, "| Skipped Tones | {} |", self.summary.skipped_tones).ok();
        writeln!(
            output,
            "| Co-occurrence Total | {} |",
            self.summary.cooccurrence_total
        )
        .ok();
        if self.metadata.variant == DatasetVariant::TwoTone {
            writeln!(
                output,
                "| Probe Conditions | {} |",
                self.summary.probe_conditions
            )
            .ok();
            writeln!(
                output,
                "| Masker Conditions | {} |",
                self.summary.masker_conditions
            )
            .ok();
        }
        writeln!(output).ok();

        writeln!(output, "## Critical Bands").ok();
        writeln!(output).ok();
        writeln!(output, "{}", self.band_table()).ok();
        writeln!(output).ok();

        if !self.files.is_empty() {
            writeln!(output, "## Files").ok();
            writeln!(output).ok();
            for file in &self.files {
                writeln!(output, "- `{}`", file.display()).ok();
            }
        }

        output
    }

    /// Render report as plain text
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        writeln!(output, "{} ({})", self.metadata.title, self.metadata.variant).ok();
        writeln!(output, "  Unique examples:  {}", self.summary.unique_examples).ok();
        writeln!(output, "  Exported rows:    {}", self.summary.exported_rows).ok();
        writeln!(output, "  ISO rows:         {}", self.summary.flagged_rows).ok();
        writeln!(output, "  Skipped tones:    {}", self.summary.skipped_tones).ok();
        if self.metadata.variant == DatasetVariant::TwoTone {
            writeln!(
                output,
                "  Conditions:       {} probe / {} masker",
                self.summary.probe_conditions, self.summary.masker_conditions
            )
            .ok();
        }
        writeln!(output).ok();
        writeln!(output, "{}", self.band_table()).ok();
        for file in &self.files {
            writeln!(output, "wrote {}", file.display()).ok();
        }

        output
    }
}
