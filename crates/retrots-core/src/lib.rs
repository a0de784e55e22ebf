//! # retrots-core
//!
//! RETROICOR physiological noise regressors (Glover et al., 2000).
//!
//! This crate provides:
//! - **Peak/trough extraction**: a fixed recipe of filter stages per signal type
//! - **Phase estimation**: cardiac interval ramps and respiratory histogram equalization
//! - **Regressor synthesis**: slice-time aligned first and second harmonics
//! - **I/O**: 1D and BIDS physio readers, NIML and CSV table writers
//!
//! ## Example
//!
//! ```ignore
//! use retrots_core::{run, RetroConfig};
//!
//! let config = RetroConfig::from_file("retrots.toml")?;
//! let outcome = run(&config, &std::env::args().collect::<Vec<_>>())?;
//! println!("{} regressors written to {}", outcome.table.cols(), outcome.table_path.display());
//! ```

pub mod config;
pub mod dsp;
pub mod error;
pub mod io;
pub mod peaks;
pub mod physio;
pub mod regressors;
pub mod run;
pub mod signal;

pub use config::{ConfigError, FilterParams, InputConfig, RetroConfig};
pub use error::{RetroError, RetroResult};
pub use io::OutputFormat;
pub use peaks::{DefaultPeakFilters, PeakFilters, PeakPipeline};
pub use physio::{estimate_phase, HarmonicCoefficients};
pub use regressors::{ColumnLayout, RegressorTable, SlicePattern, SliceTiming};
pub use run::{run, RunOutcome};
pub use signal::{Extrema, ExtremumKind, ExtremumSet, PhaseSignal, RawSignal, SignalKind};
