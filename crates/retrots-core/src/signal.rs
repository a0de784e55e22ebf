//! Core signal types shared by every pipeline stage.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RetroError, RetroResult};

/// The two waveform types handled by the Glover model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Cardiac,
    Respiratory,
}

impl SignalKind {
    /// Short tag used in regressor column labels (`s0.Card2`).
    pub fn column_tag(&self) -> &'static str {
        match self {
            Self::Cardiac => "Card",
            Self::Respiratory => "Resp",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cardiac => write!(f, "cardiac"),
            Self::Respiratory => write!(f, "respiratory"),
        }
    }
}

/// A cleaned physiological recording at a fixed sampling rate.
#[derive(Debug, Clone)]
pub struct RawSignal {
    kind: SignalKind,
    sample_rate: f64,
    samples: Array1<f64>,
}

impl RawSignal {
    /// Wrap samples, enforcing non-empty data, a positive rate and no NaNs.
    pub fn new(kind: SignalKind, sample_rate: f64, samples: Vec<f64>) -> RetroResult<Self> {
        if samples.is_empty() {
            return Err(RetroError::quality(kind, "ingest", "signal has no samples"));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(RetroError::quality(
                kind,
                "ingest",
                format!("invalid sampling frequency {sample_rate}"),
            ));
        }
        if samples.iter().any(|x| !x.is_finite()) {
            return Err(RetroError::quality(
                kind,
                "ingest",
                "signal still contains non-finite samples",
            ));
        }
        Ok(Self {
            kind,
            sample_rate,
            samples: Array1::from(samples),
        })
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &Array1<f64> {
        &self.samples
    }

    pub fn as_slice(&self) -> &[f64] {
        // Array1::from(Vec) is always contiguous in standard layout
        self.samples.as_slice().unwrap_or(&[])
    }

    /// Recording duration from first to last sample, in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.len().saturating_sub(1)) as f64 / self.sample_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    Peak,
    Trough,
}

impl ExtremumKind {
    /// Orient a signal so that this extremum kind becomes a maximum.
    pub fn orient(&self, samples: &[f64]) -> Vec<f64> {
        match self {
            Self::Peak => samples.to_vec(),
            Self::Trough => samples.iter().map(|x| -x).collect(),
        }
    }
}

/// Strictly increasing sample indices of one extremum kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremumSet {
    kind: ExtremumKind,
    indices: Vec<usize>,
}

impl ExtremumSet {
    /// Build a set, rejecting unsorted, duplicated or out-of-range indices.
    pub fn new(kind: ExtremumKind, indices: Vec<usize>, signal_len: usize) -> Option<Self> {
        let increasing = indices.windows(2).all(|w| w[0] < w[1]);
        let in_range = indices.last().map_or(true, |&last| last < signal_len);
        (increasing && in_range).then_some(Self { kind, indices })
    }

    pub fn kind(&self) -> ExtremumKind {
        self.kind
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Extrema produced for one signal type by the orchestrator.
#[derive(Debug, Clone)]
pub enum Extrema {
    Cardiac { peaks: ExtremumSet },
    Respiratory { peaks: ExtremumSet, troughs: ExtremumSet },
}

/// Cyclic phase (radians), one value per raw sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSignal {
    kind: SignalKind,
    sample_rate: f64,
    values: Array1<f64>,
}

impl PhaseSignal {
    pub fn new(kind: SignalKind, sample_rate: f64, values: Array1<f64>) -> Self {
        Self {
            kind,
            sample_rate,
            values,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
