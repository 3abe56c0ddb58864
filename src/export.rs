//! Deterministic shuffled export of normalized records.
//!
//! The record order is a seeded Fisher-Yates permutation, so the same seed
//! and the same number of records always produce byte-identical files.
//! Export ids are `1..=N` in permuted order. A side file lists the ids of
//! flagged (ISO reproduction) rows in ascending order.
//!
//! Files are staged in memory and committed together: each one is written to
//! a `.tmp` sibling, and only once all of them succeeded are they renamed
//! into place.

use crate::normalize::NormalizedRecord;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Seed used when the caller does not supply one
pub const DEFAULT_SEED: u64 = 1;

/// Header row of every record file
pub const RECORD_HEADER: &str = "id,single_tone,combined_tones";

const LINE_TERMINATOR: &str = "\r\n";

/// Errors that can occur while writing export files
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A record with its assigned export id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// 1-based position in the exported file
    pub export_id: usize,
    pub single_tone: String,
    pub combined_tones: String,
}

/// Seeded uniform permutation of `0..n`
#[must_use]
pub fn shuffled_order(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rng);
    order
}

/// Quote a CSV field if it contains a delimiter, quote or line break
#[must_use]
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Records in export order together with the flagged ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffledExport {
    /// Records in file order, ids `1..=N`
    pub records: Vec<ExportRecord>,
    /// Export ids of flagged records, ascending
    pub flagged_ids: Vec<usize>,
    /// `order[k]` is the source index of the record with export id `k + 1`
    pub order: Vec<usize>,
}

impl ShuffledExport {
    /// Permute `records` with `seed` and assign export ids
    #[must_use]
    pub fn new(records: &[NormalizedRecord], seed: u64) -> Self {
        Self::with_order(records, shuffled_order(records.len(), seed))
    }

    /// Keep source order; ids are assigned sequentially
    #[must_use]
    pub fn sequential(records: &[NormalizedRecord]) -> Self {
        Self::with_order(records, (0..records.len()).collect())
    }

    fn with_order(records: &[NormalizedRecord], order: Vec<usize>) -> Self {
        let mut exported = Vec::with_capacity(order.len());
        let mut flagged_ids = Vec::new();

        for (position, &source) in order.iter().enumerate() {
            let record = &records[source];
            let export_id = position + 1;
            exported.push(ExportRecord {
                export_id,
                single_tone: record.single_tone.clone(),
                combined_tones: record.combined_tones.clone(),
            });
            if record.iso_reproduction {
                flagged_ids.push(export_id);
            }
        }

        Self {
            records: exported,
            flagged_ids,
            order,
        }
    }

    /// Export id assigned to the record at `source_index`
    #[must_use]
    pub fn export_id_of(&self, source_index: usize) -> Option<usize> {
        self.order
            .iter()
            .position(|&source| source == source_index)
            .map(|position| position + 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the main record file
    #[must_use]
    pub fn records_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(RECORD_HEADER);
        out.push_str(LINE_TERMINATOR);
        for record in &self.records {
            write!(
                out,
                "{},{},{}{LINE_TERMINATOR}",
                record.export_id,
                csv_field(&record.single_tone),
                csv_field(&record.combined_tones)
            )
            .ok();
        }
        out
    }

    /// Render the header-less flagged-id file
    #[must_use]
    pub fn ids_csv(&self) -> String {
        let mut out = String::new();
        for id in &self.flagged_ids {
            write!(out, "{id}{LINE_TERMINATOR}").ok();
        }
        out
    }
}

/// Paths of a record file and its id side file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPaths {
    pub records: PathBuf,
    pub ids: PathBuf,
}

impl ExportPaths {
    /// `<dir>/<stem>.csv` and `<dir>/<stem>_ids.csv`
    #[must_use]
    pub fn new(dir: &Path, stem: &str) -> Self {
        Self {
            records: dir.join(format!("{stem}.csv")),
            ids: dir.join(format!("{stem}_ids.csv")),
        }
    }
}

/// Output files rendered in memory, committed together
#[derive(Debug, Default)]
pub struct StagedFiles {
    files: Vec<(PathBuf, String)>,
}

impl StagedFiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `contents` for `path`
    pub fn stage(&mut self, path: impl Into<PathBuf>, contents: String) {
        self.files.push((path.into(), contents));
    }

    /// Queue a record file and its id file
    pub fn stage_export(&mut self, dir: &Path, stem: &str, export: &ShuffledExport) -> ExportPaths {
        let paths = ExportPaths::new(dir, stem);
        self.stage(paths.records.clone(), export.records_csv());
        self.stage(paths.ids.clone(), export.ids_csv());
        paths
    }

    /// Paths queued so far
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|(path, _)| path.as_path())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every staged file.
    ///
    /// All contents go to `.tmp` siblings first. Existing targets are moved
    /// to `.bak` siblings before being replaced, so if any write or rename
    /// fails the already-renamed files are removed, the previous contents are
    /// restored and the temporaries are deleted.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Io` naming the file that failed.
    pub fn commit(self) -> Result<Vec<PathBuf>, ExportError> {
        let mut written: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(self.files.len());

        for (path, contents) in &self.files {
            let temp = temp_path(path);
            if let Err(source) = write_file(&temp, contents) {
                discard(&temp);
                discard_all(&written);
                return Err(ExportError::Io {
                    path: path.clone(),
                    source,
                });
            }
            debug!(path = %path.display(), bytes = contents.len(), "Staged output file");
            written.push((temp, path.clone()));
        }

        let mut committed: Vec<Replaced> = Vec::with_capacity(written.len());
        for (index, (temp, path)) in written.iter().enumerate() {
            match replace(temp, path) {
                Ok(replaced) => committed.push(replaced),
                Err(source) => {
                    rollback(&committed);
                    discard_all(&written[index..]);
                    return Err(ExportError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }

        for replaced in &committed {
            if let Some(backup) = &replaced.backup {
                discard(backup);
            }
        }
        info!(files = committed.len(), "Committed output files");
        Ok(committed.into_iter().map(|replaced| replaced.path).collect())
    }
}

/// A target that now holds new contents, with its previous file if any
struct Replaced {
    path: PathBuf,
    backup: Option<PathBuf>,
}

/// Move `temp` onto `path`, keeping an existing regular file as a backup
fn replace(temp: &Path, path: &Path) -> std::io::Result<Replaced> {
    let backup = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() => {
            let backup = sibling(path, ".bak");
            fs::rename(path, &backup)?;
            Some(backup)
        }
        _ => None,
    };

    if let Err(e) = fs::rename(temp, path) {
        if let Some(backup) = &backup {
            restore(backup, path);
        }
        return Err(e);
    }
    Ok(Replaced {
        path: path.to_path_buf(),
        backup,
    })
}

fn rollback(committed: &[Replaced]) {
    for replaced in committed.iter().rev() {
        discard(&replaced.path);
        if let Some(backup) = &replaced.backup {
            restore(backup, &replaced.path);
        }
    }
}

fn restore(backup: &Path, path: &Path) {
    if let Err(e) = fs::rename(backup, path) {
        warn!(path = %path.display(), error = %e, "Failed to restore previous file");
    }
}

/// Shuffle `records` with `seed` and write `<stem>.csv` and `<stem>_ids.csv`
///
/// # Errors
///
/// Returns `ExportError::Io` if either file cannot be written.
pub fn write_examples(
    records: &[NormalizedRecord],
    dir: &Path,
    stem: &str,
    seed: u64,
) -> Result<(ExportPaths, ShuffledExport), ExportError> {
    let export = ShuffledExport::new(records, seed);
    let mut staged = StagedFiles::new();
    let paths = staged.stage_export(dir, stem, &export);
    staged.commit()?;
    Ok((paths, export))
}

fn temp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn write_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(contents.as_bytes())?;
    writer.flush()
}

fn discard(path: &Path) {
    if path.is_file() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

fn discard_all(written: &[(PathBuf, PathBuf)]) {
    for (temp, _) in written {
        discard(temp);
    }
}
