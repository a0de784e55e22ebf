//! Physiological input readers and regressor table writers.

mod physio_file;
mod writer;

pub use physio_file::{read_1d, read_bids, trim_leading, BidsPhysio, PhysioSidecar, ARTIFACT_VALUE};
pub use writer::{render_csv, render_niml, write_arguments, write_table};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::ConfigError;

/// On-disk format of the regressor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// AFNI NIML-enveloped `.slibase.1D`
    #[default]
    Niml,
    Csv,
}

impl OutputFormat {
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Niml => "slibase.1D",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "niml" | "1d" => Ok(Self::Niml),
            "csv" => Ok(Self::Csv),
            other => Err(ConfigError::Validation(format!(
                "unknown output format '{other}'"
            ))),
        }
    }
}
