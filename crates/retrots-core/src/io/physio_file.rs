use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{RetroError, RetroResult};

/// Some recorders emit this value for dropped samples; it is skipped on read.
pub const ARTIFACT_VALUE: f64 = 5000.0;

/// Read a plain one-value-per-line recording.
///
/// Blank lines and [`ARTIFACT_VALUE`] entries are skipped; anything else that
/// does not parse as a number is an error naming the line.
pub fn read_1d(path: &Path) -> RetroResult<Vec<f64>> {
    let file = File::open(path).map_err(|e| RetroError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| RetroError::io(path, e))?;
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }
        let value: f64 = entry.parse().map_err(|_| {
            RetroError::input(
                path,
                format!("line {}: non-numeric entry '{entry}'", lineno + 1),
            )
        })?;
        if value == ARTIFACT_VALUE {
            skipped += 1;
            continue;
        }
        samples.push(value);
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "dropped artifact entries");
    }
    info!(path = %path.display(), samples = samples.len(), "read 1D recording");
    Ok(samples)
}

/// BIDS `_physio.json` sidecar fields used here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysioSidecar {
    pub columns: Vec<String>,
    pub sampling_frequency: f64,
    #[serde(default)]
    pub start_time: Option<f64>,
}

impl PhysioSidecar {
    pub fn from_file(path: &Path) -> RetroResult<Self> {
        let file = File::open(path).map_err(|e| RetroError::io(path, e))?;
        let sidecar: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RetroError::input(path, format!("invalid sidecar: {e}")))?;
        if sidecar.columns.is_empty() {
            return Err(RetroError::input(path, "sidecar lists no Columns"));
        }
        if !(sidecar.sampling_frequency.is_finite() && sidecar.sampling_frequency > 0.0) {
            return Err(RetroError::input(path, "SamplingFrequency must be positive"));
        }
        Ok(sidecar)
    }

    /// Start time to apply; positive values are not supported and ignored.
    pub fn effective_start_time(&self) -> Option<f64> {
        match self.start_time {
            Some(t) if t > 0.0 => {
                warn!(start_time = t, "sidecar StartTime is positive; ignoring it");
                None
            }
            other => other,
        }
    }
}

/// Columns extracted from a BIDS physio recording.
#[derive(Debug, Clone, Default)]
pub struct BidsPhysio {
    pub respiratory: Option<Vec<f64>>,
    pub cardiac: Option<Vec<f64>>,
}

enum Column {
    Respiratory,
    Cardiac,
    Ignored,
}

fn classify(name: &str) -> Column {
    match name.to_ascii_lowercase().as_str() {
        "respiratory" | "respiration" => Column::Respiratory,
        "cardiac" => Column::Cardiac,
        _ => Column::Ignored,
    }
}

fn open_maybe_gz(path: &Path) -> RetroResult<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| RetroError::io(path, e))?;
    let gz = path.extension().map_or(false, |ext| ext == "gz");
    let reader: Box<dyn Read> = if gz {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Read a tab-separated (optionally gzipped) BIDS physio file.
///
/// `n/a` cells become NaN and are left for gap repair.
pub fn read_bids(tsv: &Path, sidecar: &PhysioSidecar) -> RetroResult<BidsPhysio> {
    let kinds: Vec<Column> = sidecar.columns.iter().map(|c| classify(c)).collect();
    for (name, kind) in sidecar.columns.iter().zip(&kinds) {
        if matches!(kind, Column::Ignored) {
            warn!(column = %name, "physio column is neither cardiac nor respiratory; skipping");
        }
    }

    let mut respiratory = Vec::new();
    let mut cardiac = Vec::new();
    let reader = open_maybe_gz(tsv)?;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| RetroError::io(tsv, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').collect();
        if cells.len() < kinds.len() {
            return Err(RetroError::input(
                tsv,
                format!(
                    "line {}: {} columns, sidecar declares {}",
                    lineno + 1,
                    cells.len(),
                    kinds.len()
                ),
            ));
        }
        for (cell, kind) in cells.iter().zip(&kinds) {
            let target = match kind {
                Column::Respiratory => &mut respiratory,
                Column::Cardiac => &mut cardiac,
                Column::Ignored => continue,
            };
            let cell = cell.trim();
            let value = if cell.eq_ignore_ascii_case("n/a") {
                f64::NAN
            } else {
                cell.parse().map_err(|_| {
                    RetroError::input(tsv, format!("line {}: non-numeric cell '{cell}'", lineno + 1))
                })?
            };
            target.push(value);
        }
    }

    let present = |kind: fn(&Column) -> bool| kinds.iter().any(kind);
    let physio = BidsPhysio {
        respiratory: present(|k| matches!(k, Column::Respiratory)).then_some(respiratory),
        cardiac: present(|k| matches!(k, Column::Cardiac)).then_some(cardiac),
    };
    info!(
        path = %tsv.display(),
        respiratory = physio.respiratory.as_ref().map_or(0, Vec::len),
        cardiac = physio.cardiac.as_ref().map_or(0, Vec::len),
        "read BIDS physio"
    );
    Ok(physio)
}

/// Drop the samples recorded before the scan started (`start_time <= 0`).
pub fn trim_leading(samples: Vec<f64>, start_time: f64, fs: f64) -> Vec<f64> {
    if start_time >= 0.0 {
        return samples;
    }
    let skip = (-start_time * fs).round() as usize;
    samples.into_iter().skip(skip).collect()
}
