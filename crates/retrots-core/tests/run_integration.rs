use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use retrots_core::regressors::{assemble, output_grid, synthesize, SliceOrder};
use retrots_core::{
    estimate_phase, run, ColumnLayout, Extrema, ExtremumKind, ExtremumSet, HarmonicCoefficients,
    OutputFormat, RawSignal, RetroConfig, RetroError, SignalKind, SliceTiming,
};
use tempfile::TempDir;

fn cosine_train(period: usize, offset: usize, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (2.0 * PI * (i as f64 - offset as f64) / period as f64).cos())
        .collect()
}

fn write_1d(dir: &Path, name: &str, samples: &[f64]) -> PathBuf {
    let path = dir.join(name);
    let body: String = samples.iter().map(|v| format!("{v}\n")).collect();
    fs::write(&path, body).unwrap();
    path
}

/// 20 s of a 1 Hz pulse sampled at 50 Hz.
fn cardiac_config(dir: &TempDir) -> RetroConfig {
    let card = write_1d(dir.path(), "ECG.1D", &cosine_train(50, 25, 1000));
    let mut config = RetroConfig {
        phys_fs: Some(50.0),
        number_of_slices: 3,
        volume_tr: 2.0,
        out_dir: dir.path().join("out"),
        ..Default::default()
    };
    config.inputs.card_file = Some(card);
    config
}

fn argv() -> Vec<String> {
    vec!["retrots".to_string(), "--card-file".to_string(), "ECG.1D".to_string()]
}

#[test]
fn cardiac_only_run_writes_niml_table() {
    let dir = TempDir::new().unwrap();
    let config = cardiac_config(&dir);

    let outcome = run(&config, &argv()).unwrap();
    assert_eq!(outcome.kept, vec![SignalKind::Cardiac]);
    assert!(outcome.dropped.is_empty());

    // D = 19.98 s, stop = 18.98 s -> volumes at 0, 2, ..., 18
    assert_eq!(outcome.table.rows(), 10);
    assert_eq!(outcome.table.cols(), 3 * 4);
    assert_eq!(outcome.table.labels()[0], "s0.Card0");
    assert_eq!(outcome.table.labels()[11], "s2.Card3");
    assert!(outcome.table.data().iter().all(|v| v.is_finite() && v.abs() <= 1.0));

    assert_eq!(outcome.table_path, config.out_dir.join("ECG.slibase.1D"));
    let text = fs::read_to_string(&outcome.table_path).unwrap();
    assert!(text.starts_with("# <RetroTSout\n"));
    assert!(text.contains("# ni_dimen = \"10\""));
    assert_eq!(
        fs::read_to_string(&outcome.arguments_path).unwrap(),
        "retrots --card-file ECG.1D\n"
    );
}

#[test]
fn reruns_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let config = cardiac_config(&dir);

    let first = run(&config, &argv()).unwrap();
    let before = fs::read(&first.table_path).unwrap();
    let second = run(&config, &argv()).unwrap();
    assert_eq!(first.table, second.table);
    assert_eq!(fs::read(&second.table_path).unwrap(), before);
}

#[test]
fn csv_output_and_fitted_amplitudes() {
    let dir = TempDir::new().unwrap();
    let mut config = cardiac_config(&dir);
    config.output_format = OutputFormat::Csv;
    config.fit_coefficients = true;
    config.prefix = Some("subj07".to_string());

    let outcome = run(&config, &argv()).unwrap();
    assert_eq!(outcome.table_path, config.out_dir.join("subj07.csv"));
    let text = fs::read_to_string(&outcome.table_path).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with(",s0.Card0,s0.Card1,s0.Card2,s0.Card3,s1.Card0"));
    assert!(lines.next().unwrap().starts_with("0,"));
    assert_eq!(text.lines().count(), 1 + 10);
}

#[test]
fn flat_respiration_is_dropped() {
    let dir = TempDir::new().unwrap();
    let mut config = cardiac_config(&dir);
    let resp = write_1d(dir.path(), "Resp.1D", &vec![3.0; 1000]);
    config.inputs.resp_file = Some(resp);

    let outcome = run(&config, &argv()).unwrap();
    assert_eq!(outcome.kept, vec![SignalKind::Cardiac]);
    assert_eq!(outcome.dropped.len(), 1);
    assert_eq!(outcome.dropped[0].0, SignalKind::Respiratory);
    assert!(outcome.table.labels().iter().all(|l| l.contains("Card")));
}

#[test]
fn nothing_usable_is_an_error() {
    let dir = TempDir::new().unwrap();
    let resp = write_1d(dir.path(), "Resp.1D", &vec![3.0; 1000]);
    let mut config = RetroConfig {
        phys_fs: Some(50.0),
        out_dir: dir.path().join("out"),
        ..Default::default()
    };
    config.inputs.resp_file = Some(resp);

    assert!(matches!(run(&config, &argv()), Err(RetroError::NoUsableSignal)));
    assert!(!config.out_dir.exists());
}

#[test]
fn respiratory_only_run() {
    let dir = TempDir::new().unwrap();
    // 0.25 Hz breathing, 80 s at 10 Hz
    let resp = write_1d(dir.path(), "Resp.1D", &cosine_train(40, 20, 800));
    let mut config = RetroConfig {
        phys_fs: Some(10.0),
        number_of_slices: 2,
        volume_tr: 2.0,
        slice_pattern: "seq+z".to_string(),
        out_dir: dir.path().join("out"),
        ..Default::default()
    };
    config.inputs.resp_file = Some(resp);

    let outcome = run(&config, &argv()).unwrap();
    assert_eq!(outcome.kept, vec![SignalKind::Respiratory]);
    assert_eq!(outcome.table.rows(), 40);
    assert_eq!(outcome.table.labels()[4], "s1.Resp0");
    assert_eq!(outcome.table_path, config.out_dir.join("Resp.slibase.1D"));
}

#[test]
fn shortest_respiratory_recording_runs_end_to_end() {
    let dir = TempDir::new().unwrap();
    // 8 s at 10 Hz: peaks at 20 and 60 around a single trough at 40
    let resp = write_1d(dir.path(), "Resp.1D", &cosine_train(40, 20, 80));
    let mut config = RetroConfig {
        phys_fs: Some(10.0),
        number_of_slices: 2,
        volume_tr: 2.0,
        out_dir: dir.path().join("out"),
        ..Default::default()
    };
    config.inputs.resp_file = Some(resp);

    let outcome = run(&config, &argv()).unwrap();
    assert_eq!(outcome.kept, vec![SignalKind::Respiratory]);
    assert_eq!(outcome.table.cols(), 2 * 4);
    // D = 7.9 s, stop = 6.9 s -> 0, 2, 4, 6
    assert_eq!(outcome.table.rows(), 4);
    assert!(outcome.table.data().iter().all(|v| v.is_finite()));
    assert!(outcome.table_path.exists());
}

#[test]
fn custom_offset_mismatch_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut config = cardiac_config(&dir);
    config.slice_pattern = "custom".to_string();
    config.slice_offsets = Some(vec![0.0, 1.0]);

    match run(&config, &argv()) {
        Err(RetroError::SliceCountMismatch { expected, got }) => {
            assert_eq!(expected, 3);
            assert_eq!(got, 2);
        }
        other => panic!("expected slice count mismatch, got {other:?}"),
    }
    assert!(!config.out_dir.exists());
}

#[test]
fn three_extrema_respiratory_table() {
    // one breath: trough, peak, trough over 41 samples at 10 Hz
    let samples: Vec<f64> = (0..41)
        .map(|i| {
            let i = i as f64;
            if i <= 20.0 {
                i
            } else {
                40.0 - i
            }
        })
        .collect();
    let signal = RawSignal::new(SignalKind::Respiratory, 10.0, samples).unwrap();
    let extrema = Extrema::Respiratory {
        peaks: ExtremumSet::new(ExtremumKind::Peak, vec![20], 41).unwrap(),
        troughs: ExtremumSet::new(ExtremumKind::Trough, vec![0, 40], 41).unwrap(),
    };
    let phase = estimate_phase(&signal, &extrema).unwrap();
    assert!(phase.values().iter().all(|p| (-PI..=PI).contains(p)));

    let timing = SliceTiming::generated(SliceOrder::Sequential, false, 1, 1.0);
    let grid = output_grid(phase.len(), phase.sample_rate(), 1.0, None).unwrap();
    let block = synthesize(&phase, &HarmonicCoefficients::unit(), &timing, &grid);
    let table = assemble(&[block], ColumnLayout::SliceMajor).unwrap();

    // D = 4 s, stop = 3.5 s -> 0, 1, 2, 3
    assert_eq!(table.rows(), 4);
    assert_eq!(table.labels(), &["s0.Resp0", "s0.Resp1", "s0.Resp2", "s0.Resp3"]);
}
