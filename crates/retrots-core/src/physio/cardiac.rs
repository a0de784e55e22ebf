use ndarray::Array1;
use std::f64::consts::PI;

use crate::error::{RetroError, RetroResult};
use crate::signal::{ExtremumSet, PhaseSignal, RawSignal};

/// Cardiac phase in [-π, π): a linear 2π ramp across each beat interval.
///
/// Samples before the first beat repeat the first interval's ramp, samples
/// from the last beat onward repeat the last interval's ramp.
pub fn cardiac_phase(signal: &RawSignal, peaks: &ExtremumSet) -> RetroResult<PhaseSignal> {
    let kind = signal.kind();
    let p = peaks.indices();
    if p.len() < 2 {
        return Err(RetroError::quality(
            kind,
            "cardiac phase",
            format!("{} peak(s); at least 2 are needed", p.len()),
        ));
    }

    let n = signal.len();
    let first_len = (p[1] - p[0]) as i64;
    let last_len = (p[p.len() - 1] - p[p.len() - 2]) as i64;
    let first = p[0] as i64;
    let last = p[p.len() - 1] as i64;

    let ramp = |offset: i64, len: i64| 2.0 * PI * offset.rem_euclid(len) as f64 / len as f64;

    let mut phase = Array1::<f64>::zeros(n);
    for t in 0..p[0].min(n) {
        phase[t] = ramp(t as i64 - first, first_len);
    }
    for w in p.windows(2) {
        let len = (w[1] - w[0]) as i64;
        for t in w[0]..w[1] {
            phase[t] = ramp((t - w[0]) as i64, len);
        }
    }
    for t in p[p.len() - 1]..n {
        phase[t] = ramp(t as i64 - last, last_len);
    }

    phase.mapv_inplace(|x| x - PI);
    Ok(PhaseSignal::new(kind, signal.sample_rate(), phase))
}
