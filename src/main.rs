//! Stimulus Dataset CLI
//!
//! Builds the multi-tone and two-tone listening-test datasets.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stimulus_dataset::{
    stft_bin, DatasetAssembler, DatasetConfig, DatasetReport, GeneratedExamples, Iso226,
    IsoReproductionSet, LoudnessModel, ProbeMaskerPair, ReportBuilder,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stimulus-dataset")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the multi-tone dataset (data.csv, data_ids.csv)
    MultiTone {
        /// Generated examples JSON (tone count -> examples)
        #[arg(long)]
        input: PathBuf,

        /// Output directory
        #[arg(long)]
        output: PathBuf,

        /// Shuffle seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Write a run report (.md for markdown, JSON otherwise)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Build the two-tone dataset and masking-curve specifications
    TwoTone {
        /// Probe/masker pairs JSON
        #[arg(long)]
        pairs: PathBuf,

        /// ISO reproduction examples JSON
        #[arg(long)]
        iso: PathBuf,

        /// Output directory
        #[arg(long)]
        output: PathBuf,

        /// Shuffle seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Write a run report (.md for markdown, JSON otherwise)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Write ISO reproduction examples unshuffled (data_iso_repro.csv)
    IsoRepro {
        /// ISO reproduction examples JSON
        #[arg(long)]
        iso: PathBuf,

        /// Output directory
        #[arg(long)]
        output: PathBuf,
    },

    /// Print the critical band containing a frequency
    Locate {
        /// Frequency in Hz
        #[arg(long, value_parser = parse_frequency)]
        frequency: f64,

        /// Also print the STFT bin for this window size
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        window_size: Option<u64>,

        /// Sample rate used with --window-size
        #[arg(long, default_value = "44100", value_parser = clap::value_parser!(u32).range(1..))]
        sample_rate: u32,
    },

    /// Print the SPL of a tone on an ISO 226 equal-loudness contour
    Loudness {
        /// Loudness level in phon (0-90, the range ISO 226 covers)
        #[arg(long, value_parser = clap::value_parser!(i32).range(0..=90))]
        phons: i32,

        /// Frequency in Hz
        #[arg(long, value_parser = parse_frequency)]
        frequency: f64,
    },

    /// Print an example configuration file
    ExampleConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => DatasetConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DatasetConfig::default(),
    };

    match cli.command {
        Commands::MultiTone {
            input,
            output,
            seed,
            report,
        } => {
            tracing::info!(
                input = %input.display(),
                output = %output.display(),
                "Building multi-tone dataset"
            );
            let assembler = assembler(config, seed)?;
            let data = GeneratedExamples::load(&input)
                .with_context(|| format!("Failed to load examples from {}", input.display()))?;

            let (dataset, paths) = assembler
                .write_multi_tone(&data, &output)
                .context("Multi-tone assembly failed")?;

            let summary = ReportBuilder::new(
                "Multi-tone dataset",
                assembler.bands(),
                assembler.config().seed,
            )
            .with_files([paths.records, paths.ids])
            .multi_tone(&dataset);
            finish(&summary, report.as_deref())?;
        }
        Commands::TwoTone {
            pairs,
            iso,
            output,
            seed,
            report,
        } => {
            tracing::info!(
                pairs = %pairs.display(),
                iso = %iso.display(),
                output = %output.display(),
                "Building two-tone dataset"
            );
            let assembler = assembler(config, seed)?;
            let pair_list = ProbeMaskerPair::load_all(&pairs)
                .with_context(|| format!("Failed to load pairs from {}", pairs.display()))?;
            let iso_set = IsoReproductionSet::load(&iso)
                .with_context(|| format!("Failed to load ISO examples from {}", iso.display()))?;

            let (dataset, paths) = assembler
                .write_two_tone(&pair_list, &iso_set, &output)
                .context("Two-tone assembly failed")?;

            let summary = ReportBuilder::new(
                "Two-tone dataset",
                assembler.bands(),
                assembler.config().seed,
            )
            .with_files([
                paths.probes.records,
                paths.probes.ids,
                paths.maskers.records,
                paths.maskers.ids,
                paths.probe_specs,
                paths.masker_specs,
            ])
            .two_tone(&dataset);
            finish(&summary, report.as_deref())?;
        }
        Commands::IsoRepro { iso, output } => {
            let assembler = assembler(config, None)?;
            let iso_set = IsoReproductionSet::load(&iso)
                .with_context(|| format!("Failed to load ISO examples from {}", iso.display()))?;
            let path = assembler
                .write_iso_reproduction(&iso_set, &output)
                .context("Writing ISO reproduction examples failed")?;
            println!("wrote {}", path.display());
        }
        Commands::Locate {
            frequency,
            window_size,
            sample_rate,
        } => {
            let bands = config.bands().context("Invalid band table")?;
            let band = bands
                .locate(frequency)
                .with_context(|| format!("No critical band for {frequency} Hz"))?;
            if let Some((lower, upper)) = bands.band_range(band) {
                println!("{frequency} Hz -> band {band} [{lower}, {upper})");
            }
            if let Some(window) = window_size {
                let window = usize::try_from(window).context("Window size too large")?;
                let bin = stft_bin(frequency, window, sample_rate)
                    .context("No STFT bin for this window and sample rate")?;
                println!("STFT bin: {bin} (window {window}, {sample_rate} Hz)");
            }
        }
        Commands::Loudness { phons, frequency } => {
            let spl = Iso226.loudness_to_spl(phons, frequency);
            println!("{phons} phon at {frequency} Hz = {spl:.2} dB SPL");
        }
        Commands::ExampleConfig => {
            print!("{}", DatasetConfig::example_yaml());
        }
    }

    Ok(())
}

fn parse_frequency(value: &str) -> Result<f64, String> {
    let frequency: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if frequency.is_finite() && frequency > 0.0 {
        Ok(frequency)
    } else {
        Err(format!("frequency must be a positive number of Hz, got {value}"))
    }
}

fn assembler(config: DatasetConfig, seed: Option<u64>) -> Result<DatasetAssembler> {
    let config = match seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    };
    DatasetAssembler::new(config).context("Invalid configuration")
}

fn finish(report: &DatasetReport, path: Option<&Path>) -> Result<()> {
    print!("{}", report.to_text());

    if let Some(path) = path {
        let is_markdown = path.extension().is_some_and(|ext| ext == "md");
        let contents = if is_markdown {
            report.to_markdown()
        } else {
            report.to_json().context("Failed to serialize report")?
        };
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        tracing::info!(path = %path.display(), "Report written");
    }
    Ok(())
}
