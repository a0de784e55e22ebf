//! Cyclic phase estimation and harmonic amplitude fitting.
//!
//! - `cardiac` - linear ramp between beats, modular extrapolation at the ends
//! - `respiratory` - histogram-equalized phase per inspiration/expiration
//! - `coeffs` - least-squares a/b amplitudes (Glover et al. 2000, eq. 4)

mod cardiac;
mod coeffs;
mod respiratory;

pub use cardiac::cardiac_phase;
pub use coeffs::{HarmonicCoefficients, HARMONIC_ORDER};
pub use respiratory::{respiratory_phase, HISTOGRAM_BINS};

use crate::error::{RetroError, RetroResult};
use crate::signal::{Extrema, ExtremumKind, PhaseSignal, RawSignal};

/// Phase of `signal` given the extrema the pipeline found for it.
pub fn estimate_phase(signal: &RawSignal, extrema: &Extrema) -> RetroResult<PhaseSignal> {
    let tagged_correctly = match extrema {
        Extrema::Cardiac { peaks } => peaks.kind() == ExtremumKind::Peak,
        Extrema::Respiratory { peaks, troughs } => {
            peaks.kind() == ExtremumKind::Peak && troughs.kind() == ExtremumKind::Trough
        }
    };
    if !tagged_correctly {
        return Err(RetroError::quality(
            signal.kind(),
            "phase",
            "extremum sets are tagged with the wrong kind",
        ));
    }

    match extrema {
        Extrema::Cardiac { peaks } => cardiac_phase(signal, peaks),
        Extrema::Respiratory { peaks, troughs } => respiratory_phase(signal, peaks, troughs),
    }
    .and_then(|phase| {
        if phase.len() == signal.len() {
            Ok(phase)
        } else {
            Err(RetroError::quality(
                signal.kind(),
                "phase",
                "phase length differs from the signal length",
            ))
        }
    })
}
