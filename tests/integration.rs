//! Integration tests for the stimulus-dataset CLI and library.
//!
//! These tests verify end-to-end functionality including:
//! - Both datasets are written with the expected files and rows
//! - Output is byte-identical for the same seed
//! - Malformed input leaves no output behind
//! - CLI commands work correctly

#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;
use stimulus_dataset::{
    CurveSpec, DatasetAssembler, DatasetConfig, DatasetError, GeneratedExamples,
    IsoReproductionSet, OutOfRangePolicy, ProbeMaskerPair,
};
use tempfile::TempDir;

const EXAMPLES_JSON: &str = r#"{
    "1": [
        {"frequencies": [440.0], "levels": [50], "phons": [45]},
        {"frequencies": [8000.5], "levels": [30], "phons": [28]}
    ],
    "2": [
        {"frequencies": [440.0, 1000.0], "levels": [50, 60], "phons": [45, 60]},
        {"frequencies": [1000.0, 2000.0], "levels": [60, 70], "phons": [60, 70]}
    ],
    "3": [
        {"frequencies": [150.0, 1500.0, 6000.0], "levels": [40, 55, 45], "phons": [30, 55, 48]}
    ]
}"#;

const PAIRS_JSON: &str = r#"[
    {"masker": {"frequency": 1000.0, "level": 60}, "probe": {"frequency": 1200.0, "level": 30}},
    {"masker": {"frequency": 1000.0, "level": 60}, "probe": {"frequency": 1500.0, "level": 30}},
    {"masker": {"frequency": 1000.0, "level": 40}, "probe": {"frequency": 1200.0, "level": 30}},
    {"masker": {"frequency": 500.0, "level": 60}, "probe": {"frequency": 1200.0, "level": 20}}
]"#;

const ISO_JSON: &str = r#"{
    "0": {"ref1000_spl": 40, "other_tones": [
        {"frequency": 100.0, "level": 62, "error": 1.5},
        {"frequency": 4000.0, "level": 36}
    ]},
    "1": {"ref1000_spl": 60, "other_tones": [
        {"frequency": 250.0, "level": 68}
    ]}
}"#;

fn write_inputs(dir: &Path) {
    std::fs::write(dir.join("examples.json"), EXAMPLES_JSON).unwrap();
    std::fs::write(dir.join("pairs.json"), PAIRS_JSON).unwrap();
    std::fs::write(dir.join("iso.json"), ISO_JSON).unwrap();
}

fn data_lines(path: &Path) -> Vec<String> {
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.starts_with("id,single_tone,combined_tones\r\n"));
    content
        .split("\r\n")
        .skip(1)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_ids(path: &Path) -> Vec<usize> {
    std::fs::read_to_string(path)
        .unwrap()
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| line.parse().unwrap())
        .collect()
}

// ============================================================================
// Library pipeline
// ============================================================================

#[test]
fn test_multi_tone_pipeline() {
    let dir = TempDir::new().unwrap();
    let data = GeneratedExamples::from_json(EXAMPLES_JSON).unwrap();

    let (dataset, paths) = DatasetAssembler::default()
        .write_multi_tone(&data, dir.path())
        .unwrap();

    assert_eq!(dataset.unique_examples, 5);
    assert_eq!(dataset.listener_examples, 8);

    let lines = data_lines(&paths.records);
    assert_eq!(lines.len(), 8);

    // Ids are 1..=N in file order
    for (i, line) in lines.iter().enumerate() {
        assert!(line.starts_with(&format!("{},", i + 1)), "{line}");
    }

    // Every normalized row appears exactly once
    let exported: HashSet<String> = lines
        .iter()
        .map(|line| line.split_once(',').unwrap().1.to_string())
        .collect();
    assert_eq!(exported.len(), 8);
    assert!(exported.contains("\"[8000.5,30]\",\"[[8000.5,30]]\""));
    assert!(exported.contains("\"[1500,55]\",\"[[150,40],[1500,55],[6000,45]]\""));

    assert!(read_ids(&paths.ids).is_empty());
    assert!(dataset.statistics.cooccurrence.is_symmetric());
}

#[test]
fn test_multi_tone_deterministic() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let data = GeneratedExamples::from_json(EXAMPLES_JSON).unwrap();
    let assembler = DatasetAssembler::default();

    assembler.write_multi_tone(&data, first.path()).unwrap();
    assembler.write_multi_tone(&data, second.path()).unwrap();

    for name in ["data.csv", "data_ids.csv"] {
        assert_eq!(
            std::fs::read(first.path().join(name)).unwrap(),
            std::fs::read(second.path().join(name)).unwrap(),
            "{name} differs"
        );
    }
}

#[test]
fn test_two_tone_pipeline() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());
    let pairs = ProbeMaskerPair::load_all(dir.path().join("pairs.json")).unwrap();
    let iso = IsoReproductionSet::load(dir.path().join("iso.json")).unwrap();
    let out = dir.path().join("out");

    let (dataset, paths) = DatasetAssembler::default()
        .write_two_tone(&pairs, &iso, &out)
        .unwrap();

    let probe_lines = data_lines(&paths.probes.records);
    let masker_lines = data_lines(&paths.maskers.records);
    assert_eq!(probe_lines.len(), 4 + 3);
    assert_eq!(masker_lines.len(), 4);

    // Flagged ids point at exactly the ISO rows
    let flagged = read_ids(&paths.probes.ids);
    assert_eq!(flagged.len(), 3);
    for id in &flagged {
        let line = &probe_lines[id - 1];
        assert!(
            line.ends_with("\"[[1000,40]]\"") || line.ends_with("\"[[1000,60]]\""),
            "{line}"
        );
    }
    assert!(read_ids(&paths.maskers.ids).is_empty());

    // Probe-side groups by (masker frequency, probe level)
    let probe_specs = CurveSpec::load_all(&paths.probe_specs).unwrap();
    assert_eq!(probe_specs.len(), 2);
    let first = &probe_specs[0];
    assert_eq!(first.masker_frequency, 1000.0);
    assert_eq!(first.probe_level, 30);
    assert_eq!(first.curves.len(), 2);
    assert_eq!(first.curves[0].masker_level, 60);
    assert_eq!(first.curves[0].probe_frequencies, vec![1200.0, 1500.0]);
    assert_eq!(first.curves[1].masker_level, 40);
    assert_eq!(first.curves[1].probe_frequencies, vec![1200.0]);

    let masker_specs = CurveSpec::load_all(&paths.masker_specs).unwrap();
    assert_eq!(masker_specs.len(), 3);
    assert_eq!(masker_specs.len(), dataset.curves.maskers.len());

    let json = std::fs::read_to_string(&paths.probe_specs).unwrap();
    assert!(json.contains("\n    {"), "indent 4 expected:\n{json}");
}

#[test]
fn test_malformed_example_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let data = GeneratedExamples::from_json(
        r#"{"2": [{"frequencies": [440.0, 1000.0], "levels": [50], "phons": [40, 60]}]}"#,
    )
    .unwrap();

    let result = DatasetAssembler::default().write_multi_tone(&data, dir.path());
    assert!(matches!(result, Err(DatasetError::MalformedExample { .. })));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_out_of_range_policies() {
    let data = GeneratedExamples::from_json(
        r#"{"2": [{"frequencies": [10.0, 1000.0], "levels": [50, 60], "phons": [0, 60]}]}"#,
    )
    .unwrap();

    let abort = DatasetAssembler::default().build_multi_tone(&data);
    assert!(matches!(
        abort,
        Err(DatasetError::OutOfRangeFrequency { frequency, .. }) if frequency == 10.0
    ));

    let config = DatasetConfig {
        out_of_range: OutOfRangePolicy::Skip,
        ..DatasetConfig::default()
    };
    let dataset = DatasetAssembler::new(config)
        .unwrap()
        .build_multi_tone(&data)
        .unwrap();
    assert_eq!(dataset.listener_examples, 2);
    assert_eq!(dataset.statistics.skipped_tones, 1);
}

#[test]
fn test_seed_changes_order() {
    let data = GeneratedExamples::from_json(EXAMPLES_JSON).unwrap();
    let one = DatasetAssembler::new(DatasetConfig::default().with_seed(1))
        .unwrap()
        .build_multi_tone(&data)
        .unwrap();
    let two = DatasetAssembler::new(DatasetConfig::default().with_seed(2))
        .unwrap()
        .build_multi_tone(&data)
        .unwrap();

    let mut a = one.export.order.clone();
    let mut b = two.export.order.clone();
    assert_ne!(a, b);
    a.sort_unstable();
    b.sort_unstable();
    assert_eq!(a, b);
}

// ============================================================================
// CLI Integration Tests
// ============================================================================

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_stimulus-dataset"))
}

#[test]
fn test_cli_help_command() {
    let output = cli().arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("multi-tone"), "Help should list multi-tone");
    assert!(stdout.contains("two-tone"), "Help should list two-tone");
}

#[test]
fn test_cli_multi_tone_with_report() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());
    let out = dir.path().join("out");
    let report = dir.path().join("report.json");

    let output = cli()
        .args(["multi-tone", "--seed", "3", "--input"])
        .arg(dir.path().join("examples.json"))
        .arg("--output")
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(out.join("data.csv").exists());
    assert!(out.join("data_ids.csv").exists());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(json["metadata"]["seed"], 3);
    assert_eq!(json["summary"]["exported_rows"], 8);
}

#[test]
fn test_cli_two_tone() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());
    let out = dir.path().join("out");

    let output = cli()
        .arg("two-tone")
        .arg("--pairs")
        .arg(dir.path().join("pairs.json"))
        .arg("--iso")
        .arg(dir.path().join("iso.json"))
        .arg("--output")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());

    for name in [
        "probes_two_tone_set.csv",
        "probes_two_tone_set_ids.csv",
        "maskers_two_tone_set.csv",
        "maskers_two_tone_set_ids.csv",
        "SPECS_probes_two_tone_set.json",
        "SPECS_maskers_two_tone_set.json",
    ] {
        assert!(out.join(name).exists(), "{name} missing");
    }
}

#[test]
fn test_cli_malformed_input_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("bad.json");
    std::fs::write(
        &input,
        r#"{"1": [{"frequencies": [440.0], "levels": [], "phons": [40]}]}"#,
    )
    .unwrap();
    let out = dir.path().join("out");

    let output = cli()
        .arg("multi-tone")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!out.join("data.csv").exists());
}

#[test]
fn test_cli_locate() {
    let output = cli().args(["locate", "--frequency", "1000"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("band 8"), "{stdout}");
}

#[test]
fn test_cli_locate_with_window() {
    let output = cli()
        .args(["locate", "--frequency", "1000", "--window-size", "1024"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("STFT bin:"), "{stdout}");
}

#[test]
fn test_cli_locate_rejects_degenerate_input() {
    for args in [
        ["locate", "--frequency", "1000", "--window-size", "0"],
        ["locate", "--frequency", "1000", "--sample-rate", "0"],
        ["locate", "--frequency", "NaN", "--window-size", "1024"],
        ["locate", "--frequency", "-5", "--window-size", "1024"],
    ] {
        let output = cli().args(args).output().unwrap();
        assert!(!output.status.success(), "{args:?}");
    }
}

#[test]
fn test_cli_loudness() {
    let output = cli()
        .args(["loudness", "--phons", "40", "--frequency", "1000"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("dB SPL"), "{stdout}");
    assert!(!stdout.contains("NaN"), "{stdout}");
}

#[test]
fn test_cli_loudness_rejects_degenerate_input() {
    for args in [
        ["loudness", "--phons", "40", "--frequency", "NaN"],
        ["loudness", "--phons", "40", "--frequency", "inf"],
        ["loudness", "--phons", "40", "--frequency", "0"],
        ["loudness", "--phons", "120", "--frequency", "1000"],
    ] {
        let output = cli().args(args).output().unwrap();
        assert!(!output.status.success(), "{args:?}");
    }
}

#[test]
fn test_cli_example_config_roundtrip() {
    let dir = TempDir::new().unwrap();
    let output = cli().arg("example-config").output().unwrap();
    assert!(output.status.success());

    let path = dir.path().join("config.yaml");
    std::fs::write(&path, &output.stdout).unwrap();
    let config = DatasetConfig::load(&path).unwrap();
    assert_eq!(config, DatasetConfig::default());
}
