//! DSP (Digital Signal Processing) module
//!
//! Provides the numeric primitives used by the peak/trough stages:
//! - `spectral` - FFT dominant frequency, band-pass and period estimate
//! - `stats` - percentiles and detrending
//! - `gaps` - NaN run repair for freshly ingested recordings

pub mod gaps;
pub mod spectral;
pub mod stats;

pub use gaps::repair_gaps;
pub use spectral::{bandpass, bandpass_around_dominant, dominant_component, DominantComponent};
pub use stats::{median, percentile};
