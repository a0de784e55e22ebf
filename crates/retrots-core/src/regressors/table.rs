use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::ConfigError;
use crate::error::{RetroError, RetroResult};
use crate::signal::SignalKind;

use super::{SignalRegressors, COMPONENTS};

/// Column ordering of the assembled table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnLayout {
    /// slice, then signal (Resp before Card), then component
    #[default]
    SliceMajor,
    /// signal, then component, then slice
    SignalMajor,
}

impl FromStr for ColumnLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "slice_major" | "slice" => Ok(Self::SliceMajor),
            "signal_major" | "signal" => Ok(Self::SignalMajor),
            other => Err(ConfigError::Validation(format!(
                "unknown column layout '{other}'"
            ))),
        }
    }
}

/// Labeled regressor matrix, one row per output volume.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressorTable {
    labels: Vec<String>,
    data: Array2<f64>,
}

impl RegressorTable {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Values of the column with the given label.
    pub fn column(&self, label: &str) -> Option<ArrayView1<'_, f64>> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.data.column(i))
    }
}

fn label(slice: usize, kind: SignalKind, component: usize) -> String {
    format!("s{slice}.{}{component}", kind.column_tag())
}

fn kind_rank(kind: SignalKind) -> u8 {
    match kind {
        SignalKind::Respiratory => 0,
        SignalKind::Cardiac => 1,
    }
}

/// Stack per-signal regressors into one table.
///
/// All inputs must share slice and volume counts; respiratory columns always
/// precede cardiac ones within a group.
pub fn assemble(signals: &[SignalRegressors], layout: ColumnLayout) -> RetroResult<RegressorTable> {
    let mut ordered: Vec<&SignalRegressors> = signals.iter().collect();
    ordered.sort_by_key(|s| kind_rank(s.kind));

    let Some(first) = ordered.first() else {
        return Err(RetroError::NoUsableSignal);
    };
    let (slices, rows) = (first.slices(), first.volumes());
    if ordered
        .iter()
        .any(|s| s.slices() != slices || s.volumes() != rows)
    {
        return Err(ConfigError::Validation(
            "regressor blocks disagree on slice or volume count".to_string(),
        )
        .into());
    }

    // (signal, slice, component) triples in output order
    let mut columns: Vec<(&SignalRegressors, usize, usize)> =
        Vec::with_capacity(ordered.len() * slices * COMPONENTS);
    match layout {
        ColumnLayout::SliceMajor => {
            for s in 0..slices {
                for &sig in &ordered {
                    for j in 0..COMPONENTS {
                        columns.push((sig, s, j));
                    }
                }
            }
        }
        ColumnLayout::SignalMajor => {
            for &sig in &ordered {
                for j in 0..COMPONENTS {
                    for s in 0..slices {
                        columns.push((sig, s, j));
                    }
                }
            }
        }
    }

    let mut data = Array2::<f64>::zeros((rows, columns.len()));
    let mut labels = Vec::with_capacity(columns.len());
    for (c, &(sig, s, j)) in columns.iter().enumerate() {
        labels.push(label(s, sig.kind, j));
        for k in 0..rows {
            data[[k, c]] = sig.values[[s, k, j]];
        }
    }

    Ok(RegressorTable { labels, data })
}
