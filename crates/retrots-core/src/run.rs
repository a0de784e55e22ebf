//! End-to-end driver: read inputs, extract extrema, estimate phase, synthesize
//! and write the regressor table.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{ConfigError, RetroConfig};
use crate::dsp::repair_gaps;
use crate::error::{RetroError, RetroResult};
use crate::io::{self, PhysioSidecar};
use crate::peaks::PeakPipeline;
use crate::physio::{estimate_phase, HarmonicCoefficients};
use crate::regressors::{assemble, output_grid, synthesize, RegressorTable, SlicePattern, SliceTiming};
use crate::signal::{PhaseSignal, RawSignal, SignalKind};

/// Raw recordings requested by the configuration.
#[derive(Debug, Clone, Default)]
pub struct PhysioInputs {
    pub sample_rate: f64,
    pub start_time: f64,
    pub cardiac: Option<Vec<f64>>,
    pub respiratory: Option<Vec<f64>>,
}

/// A signal that made it through phase estimation.
#[derive(Debug, Clone)]
pub struct ProcessedSignal {
    pub phase: PhaseSignal,
    pub coefficients: HarmonicCoefficients,
}

/// What a successful run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub table: RegressorTable,
    pub table_path: PathBuf,
    pub arguments_path: PathBuf,
    pub kept: Vec<SignalKind>,
    /// Signal types dropped for quality reasons, with the reason
    pub dropped: Vec<(SignalKind, String)>,
}

fn config_error(msg: impl Into<String>) -> RetroError {
    ConfigError::Validation(msg.into()).into()
}

/// File name up to its first dot (`sub-01_physio.tsv.gz` -> `sub-01_physio`).
fn file_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next().unwrap_or(name);
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Output prefix: explicit, else the sidecar, cardiac or respiratory file stem.
pub fn resolve_prefix(config: &RetroConfig) -> RetroResult<String> {
    if let Some(prefix) = config.prefix.as_ref().filter(|p| !p.trim().is_empty()) {
        return Ok(prefix.clone());
    }
    let inputs = &config.inputs;
    [&inputs.phys_json, &inputs.card_file, &inputs.resp_file]
        .into_iter()
        .flatten()
        .find_map(|p| file_stem(p))
        .ok_or_else(|| config_error("could not determine an output prefix"))
}

/// Read every requested recording, from a BIDS pair or from 1D files.
pub fn load_inputs(config: &RetroConfig) -> RetroResult<PhysioInputs> {
    let inputs = &config.inputs;
    let mut loaded = PhysioInputs {
        start_time: config.start_time,
        ..Default::default()
    };

    let sidecar_fs = match (&inputs.phys_file, &inputs.phys_json) {
        (Some(tsv), Some(json)) => {
            let sidecar = PhysioSidecar::from_file(json)?;
            let physio = io::read_bids(tsv, &sidecar)?;
            if config.start_time == 0.0 {
                loaded.start_time = sidecar.effective_start_time().unwrap_or(0.0);
            }
            loaded.cardiac = physio.cardiac.filter(|_| config.cardiac_out);
            loaded.respiratory = physio.respiratory.filter(|_| config.respiration_out);
            Some(sidecar.sampling_frequency)
        }
        _ => {
            if config.cardiac_out {
                loaded.cardiac = inputs.card_file.as_deref().map(io::read_1d).transpose()?;
            }
            if config.respiration_out {
                loaded.respiratory = inputs.resp_file.as_deref().map(io::read_1d).transpose()?;
            }
            None
        }
    };

    loaded.sample_rate = config
        .phys_fs
        .or(sidecar_fs)
        .ok_or_else(|| config_error("sampling frequency (phys_fs) is required"))?;

    if loaded.cardiac.is_none() && loaded.respiratory.is_none() {
        return Err(config_error(
            "no requested signal type has an input recording",
        ));
    }
    Ok(loaded)
}

/// Gap repair, extrema, phase and amplitudes for one signal type.
pub fn process_signal(
    kind: SignalKind,
    samples: Vec<f64>,
    sample_rate: f64,
    start_time: f64,
    config: &RetroConfig,
) -> RetroResult<ProcessedSignal> {
    let filters = &config.filters;
    let gap_secs = match kind {
        SignalKind::Cardiac => filters.cardiac_gap_limit_secs,
        SignalKind::Respiratory => filters.resp_gap_limit_secs,
    };

    let trimmed = io::trim_leading(samples, start_time, sample_rate);
    let repaired = repair_gaps(kind, &trimmed, (gap_secs * sample_rate) as usize)?;
    let signal = RawSignal::new(kind, sample_rate, repaired)?;

    let extrema = PeakPipeline::new(filters).extract(&signal)?;
    let phase = estimate_phase(&signal, &extrema)?;
    let coefficients = if config.fit_coefficients {
        HarmonicCoefficients::fit(&signal, &phase)?
    } else {
        HarmonicCoefficients::unit()
    };

    info!(
        signal = %kind,
        samples = signal.len(),
        duration_secs = signal.duration_secs(),
        ?coefficients,
        "phase estimated"
    );
    Ok(ProcessedSignal {
        phase,
        coefficients,
    })
}

/// Build the regressor table from already-processed signals.
pub fn build_table(
    processed: &[ProcessedSignal],
    timing: &SliceTiming,
    config: &RetroConfig,
) -> RetroResult<RegressorTable> {
    let shortest = processed
        .iter()
        .min_by_key(|p| p.phase.len())
        .ok_or(RetroError::NoUsableSignal)?;
    let grid = output_grid(
        shortest.phase.len(),
        shortest.phase.sample_rate(),
        config.volume_tr,
        config.num_time_pts,
    )?;

    let blocks: Vec<_> = processed
        .iter()
        .map(|p| synthesize(&p.phase, &p.coefficients, timing, &grid))
        .collect();
    assemble(&blocks, config.layout)
}

/// Run the whole pipeline and write its outputs.
///
/// `argv` is recorded verbatim in `arguments.txt`.
pub fn run(config: &RetroConfig, argv: &[String]) -> RetroResult<RunOutcome> {
    config.validate()?;
    if config.rvt_out {
        warn!("RVT regressors are not synthesized; ignoring rvt_out");
    }

    // Resolve everything that can fail cheaply before touching signals
    let pattern: SlicePattern = config.slice_pattern.parse()?;
    let timing = SliceTiming::resolve(
        &pattern,
        config.slice_offsets.as_deref(),
        config.number_of_slices,
        config.volume_tr,
    )?;
    let prefix = resolve_prefix(config)?;
    let inputs = load_inputs(config)?;

    let PhysioInputs {
        sample_rate,
        start_time,
        cardiac,
        respiratory,
    } = inputs;
    let (card_result, resp_result) = rayon::join(
        move || cardiac.map(|s| process_signal(SignalKind::Cardiac, s, sample_rate, start_time, config)),
        move || {
            respiratory.map(|s| process_signal(SignalKind::Respiratory, s, sample_rate, start_time, config))
        },
    );

    let mut processed = Vec::new();
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for (kind, result) in [
        (SignalKind::Respiratory, resp_result),
        (SignalKind::Cardiac, card_result),
    ] {
        match result {
            None => {}
            Some(Ok(p)) => {
                kept.push(kind);
                processed.push(p);
            }
            Some(Err(e)) if e.is_recoverable() => {
                warn!(signal = %kind, error = %e, "dropping signal type");
                dropped.push((kind, e.to_string()));
            }
            Some(Err(e)) => return Err(e),
        }
    }
    if processed.is_empty() {
        return Err(RetroError::NoUsableSignal);
    }

    let table = build_table(&processed, &timing, config)?;
    let table_path = io::write_table(&table, config.output_format, &config.out_dir, &prefix)?;
    let arguments_path = io::write_arguments(&config.out_dir, argv)?;

    info!(
        kept = ?kept,
        dropped = dropped.len(),
        rows = table.rows(),
        cols = table.cols(),
        "run complete"
    );
    Ok(RunOutcome {
        table,
        table_path,
        arguments_path,
        kept,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputConfig;

    #[test]
    fn prefix_order() {
        let mut cfg = RetroConfig {
            inputs: InputConfig {
                card_file: Some(PathBuf::from("data/ECG.1D")),
                resp_file: Some(PathBuf::from("data/Resp.1D")),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(resolve_prefix(&cfg).unwrap(), "ECG");
        cfg.inputs.card_file = None;
        assert_eq!(resolve_prefix(&cfg).unwrap(), "Resp");
        cfg.prefix = Some("subj12".to_string());
        assert_eq!(resolve_prefix(&cfg).unwrap(), "subj12");
    }

    #[test]
    fn sidecar_stem_wins_over_files() {
        let cfg = RetroConfig {
            inputs: InputConfig {
                phys_file: Some(PathBuf::from("sub-01_physio.tsv.gz")),
                phys_json: Some(PathBuf::from("bids/sub-01_physio.json")),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(resolve_prefix(&cfg).unwrap(), "sub-01_physio");
    }

    #[test]
    fn no_prefix_source_is_config_error() {
        let cfg = RetroConfig::default();
        assert!(matches!(
            resolve_prefix(&cfg),
            Err(RetroError::Configuration(_))
        ));
    }
}
