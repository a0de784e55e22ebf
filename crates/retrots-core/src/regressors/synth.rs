use ndarray::Array3;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::error::RetroResult;
use crate::physio::HarmonicCoefficients;
use crate::signal::{PhaseSignal, SignalKind};

use super::SliceTiming;

/// Regressors per slice and signal: b1·sinφ, a1·cosφ, b2·sin2φ, a2·cos2φ.
pub const COMPONENTS: usize = 4;

/// Volume onset times `k * TR` covered by a recording of `n_samples`.
///
/// Instants run while `k * TR < D - TR/2` with `D = (n - 1) / fs`; when
/// `D - TR/2` is an exact multiple of TR one more instant is appended.
pub fn output_grid(
    n_samples: usize,
    fs: f64,
    tr: f64,
    num_time_pts: Option<usize>,
) -> RetroResult<Vec<f64>> {
    let duration = n_samples.saturating_sub(1) as f64 / fs;
    let stop = duration - tr / 2.0;
    if !(stop > 0.0) {
        return Err(ConfigError::Validation(format!(
            "recording of {duration:.3} s is shorter than half a TR ({tr} s)"
        ))
        .into());
    }

    let count = (stop / tr).ceil() as usize;
    let mut grid: Vec<f64> = (0..count).map(|k| k as f64 * tr).collect();
    if stop % tr == 0.0 {
        grid.push(count as f64 * tr);
    }

    if let Some(limit) = num_time_pts {
        if limit > grid.len() {
            warn!(
                requested = limit,
                available = grid.len(),
                "num_time_pts exceeds the recording; keeping available volumes"
            );
        }
        grid.truncate(limit);
    }
    debug!(volumes = grid.len(), duration, "output grid");
    Ok(grid)
}

/// Sample index nearest to time `t`; exact midpoints go to the earlier sample.
pub fn nearest_sample(t: f64, fs: f64, n_samples: usize) -> usize {
    let last = n_samples.saturating_sub(1);
    let x = t * fs;
    if !(x > 0.0) {
        return 0;
    }
    let lo = x.floor();
    let hi = x.ceil();
    let pick = if x - lo <= hi - x { lo } else { hi };
    (pick as usize).min(last)
}

/// Harmonic regressors of one signal, shaped `(slice, volume, component)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRegressors {
    pub kind: SignalKind,
    pub values: Array3<f64>,
}

impl SignalRegressors {
    pub fn slices(&self) -> usize {
        self.values.dim().0
    }

    pub fn volumes(&self) -> usize {
        self.values.dim().1
    }
}

/// Sample the phase at each slice's shifted grid and expand into harmonics.
pub fn synthesize(
    phase: &PhaseSignal,
    coeffs: &HarmonicCoefficients,
    timing: &SliceTiming,
    grid: &[f64],
) -> SignalRegressors {
    let fs = phase.sample_rate();
    let n = phase.len();
    let phi = phase.values();
    let mut values = Array3::<f64>::zeros((timing.len(), grid.len(), COMPONENTS));

    for (s, &offset) in timing.offsets().iter().enumerate() {
        for (k, &t) in grid.iter().enumerate() {
            let p = phi[nearest_sample(t + offset, fs, n)];
            let (s1, c1) = p.sin_cos();
            let (s2, c2) = (2.0 * p).sin_cos();
            values[[s, k, 0]] = coeffs.b[0] * s1;
            values[[s, k, 1]] = coeffs.a[0] * c1;
            values[[s, k, 2]] = coeffs.b[1] * s2;
            values[[s, k, 3]] = coeffs.a[1] * c2;
        }
    }

    SignalRegressors {
        kind: phase.kind(),
        values,
    }
}
