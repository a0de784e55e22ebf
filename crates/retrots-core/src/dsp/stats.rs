//! Small order statistics over `f64` slices.

/// Remove the mean from a signal.
pub fn detrend(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    signal.iter().map(|x| x - mean).collect()
}

/// Linear-interpolated percentile (`q` in [0, 100]), numpy's default method.
///
/// Returns `None` for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Index of the largest value in `values[lo..hi]` (first one on ties).
pub fn argmax_in(values: &[f64], lo: usize, hi: usize) -> Option<usize> {
    let hi = hi.min(values.len());
    if lo >= hi {
        return None;
    }
    let mut best = lo;
    for i in lo + 1..hi {
        if values[i] > values[best] {
            best = i;
        }
    }
    Some(best)
}

/// Index of the smallest value in `values[lo..hi]` (first one on ties).
pub fn argmin_in(values: &[f64], lo: usize, hi: usize) -> Option<usize> {
    let hi = hi.min(values.len());
    if lo >= hi {
        return None;
    }
    let mut best = lo;
    for i in lo + 1..hi {
        if values[i] < values[best] {
            best = i;
        }
    }
    Some(best)
}
