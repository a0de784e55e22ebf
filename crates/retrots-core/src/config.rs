use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::io::OutputFormat;
use crate::regressors::ColumnLayout;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full run configuration, validated once before any signal is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetroConfig {
    pub inputs: InputConfig,
    /// Physiological sampling frequency (Hz). May come from a BIDS sidecar.
    pub phys_fs: Option<f64>,
    pub number_of_slices: usize,
    /// Volume repetition time in seconds
    pub volume_tr: f64,
    /// Truncate the output grid to this many volumes
    pub num_time_pts: Option<usize>,
    /// Seconds; must be <= 0. Negative values drop leading samples.
    pub start_time: f64,
    /// alt+z, alt-z, seq+z, seq-z, custom, or a path to an offsets file
    pub slice_pattern: String,
    /// Offsets used by the `custom` pattern
    pub slice_offsets: Option<Vec<f64>>,
    /// Fit a/b amplitudes instead of unit amplitudes
    pub fit_coefficients: bool,
    pub output_format: OutputFormat,
    pub layout: ColumnLayout,
    pub cardiac_out: bool,
    pub respiration_out: bool,
    /// Accepted for compatibility; RVT regressors are not synthesized.
    pub rvt_out: bool,
    pub prefix: Option<String>,
    pub out_dir: PathBuf,
    pub filters: FilterParams,
}

/// Where the raw physiological data comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub card_file: Option<PathBuf>,
    pub resp_file: Option<PathBuf>,
    /// BIDS tab-separated physio file (optionally gzipped)
    pub phys_file: Option<PathBuf>,
    /// BIDS JSON sidecar describing `phys_file`
    pub phys_json: Option<PathBuf>,
}

/// Constants of the peak/trough filter recipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub cardiac_min_bpm: f64,
    pub resp_max_period_secs: f64,
    /// Coarse search width = fs / divisor
    pub cardiac_search_divisor: f64,
    pub resp_peak_search_divisor: f64,
    pub resp_trough_search_divisor: f64,
    pub cardiac_percentile: f64,
    /// Width of the local percentile window, in typical periods
    pub cardiac_percentile_periods: usize,
    pub resp_peak_percentile: f64,
    pub resp_trough_percentile: f64,
    /// Longest NaN run repaired by interpolation, in seconds
    pub cardiac_gap_limit_secs: f64,
    pub resp_gap_limit_secs: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            cardiac_min_bpm: 25.0,
            resp_max_period_secs: 10.0,
            cardiac_search_divisor: 40.0,
            resp_peak_search_divisor: 4.0,
            resp_trough_search_divisor: 8.0,
            cardiac_percentile: 70.0,
            cardiac_percentile_periods: 3,
            resp_peak_percentile: 10.0,
            resp_trough_percentile: 90.0,
            cardiac_gap_limit_secs: 0.25,
            resp_gap_limit_secs: 1.0,
        }
    }
}

impl Default for RetroConfig {
    fn default() -> Self {
        Self {
            inputs: InputConfig::default(),
            phys_fs: None,
            number_of_slices: 1,
            volume_tr: 2.0,
            num_time_pts: None,
            start_time: 0.0,
            slice_pattern: "alt+z".to_string(),
            slice_offsets: None,
            fit_coefficients: false,
            output_format: OutputFormat::default(),
            layout: ColumnLayout::default(),
            cardiac_out: true,
            respiration_out: true,
            rvt_out: false,
            prefix: None,
            out_dir: default_out_dir(),
            filters: FilterParams::default(),
        }
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(format!(
        "retro_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

impl RetroConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML and apply `RETROTS_` environment overrides on top.
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::layered(path)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML plus environment overrides, not yet validated. Callers that add
    /// their own layer (command-line flags) validate afterwards.
    pub fn layered<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        use std::env;

        if let Ok(val) = env::var("RETROTS_PHYS_FS") {
            self.phys_fs = Some(val.parse().map_err(|_| {
                ConfigError::Validation("Invalid RETROTS_PHYS_FS".to_string())
            })?);
        }
        if let Ok(val) = env::var("RETROTS_VOLUME_TR") {
            self.volume_tr = val
                .parse()
                .map_err(|_| ConfigError::Validation("Invalid RETROTS_VOLUME_TR".to_string()))?;
        }
        if let Ok(val) = env::var("RETROTS_NUMBER_OF_SLICES") {
            self.number_of_slices = val.parse().map_err(|_| {
                ConfigError::Validation("Invalid RETROTS_NUMBER_OF_SLICES".to_string())
            })?;
        }
        if let Ok(val) = env::var("RETROTS_SLICE_PATTERN") {
            self.slice_pattern = val;
        }
        if let Ok(val) = env::var("RETROTS_OUT_DIR") {
            self.out_dir = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(fs) = self.phys_fs {
            if !(fs.is_finite() && fs > 0.0) {
                return Err(ConfigError::Validation(
                    "phys_fs must be a positive number of Hz".to_string(),
                ));
            }
        }
        if self.number_of_slices == 0 {
            return Err(ConfigError::Validation(
                "number_of_slices must be at least 1".to_string(),
            ));
        }
        if !(self.volume_tr.is_finite() && self.volume_tr > 0.0) {
            return Err(ConfigError::Validation(
                "volume_tr must be positive".to_string(),
            ));
        }
        if !self.start_time.is_finite() || self.start_time > 0.0 {
            return Err(ConfigError::Validation(
                "start_time must be <= 0 seconds".to_string(),
            ));
        }
        if self.num_time_pts == Some(0) {
            return Err(ConfigError::Validation(
                "num_time_pts must be positive when given".to_string(),
            ));
        }
        if self.slice_pattern.trim().is_empty() {
            return Err(ConfigError::Validation(
                "slice_pattern must not be empty".to_string(),
            ));
        }

        let inputs = &self.inputs;
        if inputs.phys_file.is_some() && (inputs.card_file.is_some() || inputs.resp_file.is_some())
        {
            return Err(ConfigError::Validation(
                "a BIDS physio file cannot be combined with separate cardiac/respiratory files"
                    .to_string(),
            ));
        }
        if inputs.phys_file.is_some() != inputs.phys_json.is_some() {
            return Err(ConfigError::Validation(
                "phys_file and phys_json must be given together".to_string(),
            ));
        }
        if inputs.phys_file.is_none() && inputs.card_file.is_none() && inputs.resp_file.is_none() {
            return Err(ConfigError::Validation(
                "no physiological input: give card_file, resp_file or phys_file".to_string(),
            ));
        }
        // A sidecar may still supply SamplingFrequency.
        if self.phys_fs.is_none() && inputs.phys_json.is_none() {
            return Err(ConfigError::Validation(
                "sampling frequency (phys_fs) is required".to_string(),
            ));
        }
        if !self.cardiac_out && !self.respiration_out {
            return Err(ConfigError::Validation(
                "cardiac_out and respiration_out are both disabled".to_string(),
            ));
        }

        self.filters.validate()
    }
}

impl FilterParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let percentiles = [
            self.cardiac_percentile,
            self.resp_peak_percentile,
            self.resp_trough_percentile,
        ];
        if percentiles.iter().any(|p| !(0.0..=100.0).contains(p)) {
            return Err(ConfigError::Validation(
                "filter percentiles must be in [0, 100]".to_string(),
            ));
        }
        let positive = [
            self.cardiac_min_bpm,
            self.resp_max_period_secs,
            self.cardiac_search_divisor,
            self.resp_peak_search_divisor,
            self.resp_trough_search_divisor,
        ];
        if positive.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(ConfigError::Validation(
                "filter rates and search divisors must be positive".to_string(),
            ));
        }
        if self.cardiac_gap_limit_secs < 0.0 || self.resp_gap_limit_secs < 0.0 {
            return Err(ConfigError::Validation(
                "gap limits must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
