//! Repair of missing (NaN) samples in raw recordings.

use tracing::debug;

use crate::error::{RetroError, RetroResult};
use crate::signal::SignalKind;

/// Linearly interpolate NaN runs, holding the nearest valid value at the edges.
///
/// A run longer than `max_run` samples means the recording dropped out and is
/// rejected for that signal type.
pub fn repair_gaps(kind: SignalKind, samples: &[f64], max_run: usize) -> RetroResult<Vec<f64>> {
    let valid: Vec<usize> = samples
        .iter()
        .enumerate()
        .filter(|(_, x)| x.is_finite())
        .map(|(i, _)| i)
        .collect();

    let (first, last) = match (valid.first(), valid.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return Err(RetroError::quality(kind, "gap repair", "no finite samples")),
    };
    if valid.len() == samples.len() {
        return Ok(samples.to_vec());
    }

    let mut out = samples.to_vec();
    let mut longest = first.max(samples.len() - 1 - last);

    for i in 0..first {
        out[i] = samples[first];
    }
    for i in last + 1..samples.len() {
        out[i] = samples[last];
    }
    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let run = b - a - 1;
        if run == 0 {
            continue;
        }
        longest = longest.max(run);
        let (ya, yb) = (samples[a], samples[b]);
        for (offset, slot) in out[a + 1..b].iter_mut().enumerate() {
            let t = (offset + 1) as f64 / (b - a) as f64;
            *slot = ya + (yb - ya) * t;
        }
    }

    if longest > max_run {
        return Err(RetroError::quality(
            kind,
            "gap repair",
            format!("{longest} consecutive missing samples exceed the limit of {max_run}"),
        ));
    }

    debug!(
        signal = %kind,
        repaired = samples.len() - valid.len(),
        "interpolated missing samples"
    );
    Ok(out)
}
