//! Default implementations of the peak filter stages.

use crate::dsp::{spectral, stats};

use super::{Direction, PeakFilters};

/// Fraction of a period used by the merge, directional and gap-fill stages.
const QUARTER: f64 = 0.25;

/// A peak must rise at least this fraction of its neighbour's rise above the
/// dip between them.
const SHOULDER_RATIO: f64 = 0.25;

/// Stateless default stage library.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPeakFilters;

fn quarter_window(period: f64) -> usize {
    ((period * QUARTER).round() as usize).max(1)
}

fn dedup_sorted(mut indices: Vec<usize>) -> Vec<usize> {
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Climb from `start` to the nearest local maximum of `raw`.
///
/// `None` when the climb ends on the first or last sample, which never
/// count as peaks.
fn hill_climb(raw: &[f64], start: usize) -> Option<usize> {
    let n = raw.len();
    let mut i = start.min(n.saturating_sub(1));
    loop {
        let left = (i > 0).then(|| raw[i - 1]);
        let right = (i + 1 < n).then(|| raw[i + 1]);
        match (left, right) {
            (_, Some(r)) if r > raw[i] && left.map_or(true, |l| r >= l) => i += 1,
            (Some(l), _) if l > raw[i] => i -= 1,
            _ => break,
        }
    }
    (i > 0 && i + 1 < n).then_some(i)
}

impl PeakFilters for DefaultPeakFilters {
    fn bandpass(&self, raw: &[f64], fs: f64, min_hz: f64) -> Option<Vec<f64>> {
        spectral::bandpass_around_dominant(raw, fs, min_hz).map(|(filtered, _)| filtered)
    }

    fn coarse_search(&self, filtered: &[f64], width: usize) -> Vec<usize> {
        let n = filtered.len();
        let width = width.max(1);
        if n < 3 {
            return Vec::new();
        }

        (1..n - 1)
            .filter(|&i| {
                // Rising edge into i; a plateau reports its first sample only
                if !(filtered[i] > filtered[i - 1] && filtered[i] >= filtered[i + 1]) {
                    return false;
                }
                let lo = i.saturating_sub(width);
                let hi = (i + width + 1).min(n);
                filtered[lo..hi].iter().all(|&v| v <= filtered[i])
            })
            .collect()
    }

    fn refine(&self, raw: &[f64], candidates: &[usize]) -> Vec<usize> {
        if raw.is_empty() {
            return Vec::new();
        }
        dedup_sorted(candidates.iter().filter_map(|&c| hill_climb(raw, c)).collect())
    }

    fn percentile_filter(&self, raw: &[f64], candidates: &[usize], q: f64) -> Vec<usize> {
        let Some(threshold) = stats::percentile(raw, q) else {
            return Vec::new();
        };
        candidates
            .iter()
            .copied()
            .filter(|&c| raw[c] >= threshold)
            .collect()
    }

    fn local_percentile_filter(
        &self,
        raw: &[f64],
        candidates: &[usize],
        q: f64,
        num_periods: usize,
    ) -> Vec<usize> {
        let spacings: Vec<f64> = candidates
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64)
            .collect();
        let Some(spacing) = stats::median(&spacings) else {
            return self.percentile_filter(raw, candidates, q);
        };

        let half = ((spacing * num_periods as f64) / 2.0).round().max(1.0) as usize;
        candidates
            .iter()
            .copied()
            .filter(|&c| {
                let lo = c.saturating_sub(half);
                let hi = (c + half + 1).min(raw.len());
                stats::percentile(&raw[lo..hi], q).map_or(false, |t| raw[c] >= t)
            })
            .collect()
    }

    fn period(&self, filtered: &[f64]) -> Option<f64> {
        spectral::period_samples(filtered)
    }

    fn merge_close(&self, raw: &[f64], candidates: &[usize], period: f64) -> Vec<usize> {
        let min_gap = period * QUARTER;
        let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
        for &c in candidates {
            match kept.last_mut() {
                Some(last) if ((c - *last) as f64) < min_gap => {
                    if raw[c] > raw[*last] {
                        *last = c;
                    }
                }
                _ => kept.push(c),
            }
        }
        kept
    }

    fn remove_directional(
        &self,
        raw: &[f64],
        candidates: &[usize],
        period: f64,
        side: Direction,
    ) -> Vec<usize> {
        let reach = quarter_window(period);
        let n = raw.len();
        candidates
            .iter()
            .copied()
            .filter(|&c| {
                let window = match side {
                    Direction::Right => &raw[(c + 1).min(n)..(c + reach + 1).min(n)],
                    Direction::Left => &raw[c.saturating_sub(reach)..c],
                };
                !window.iter().any(|&v| v > raw[c])
            })
            .collect()
    }

    fn fill_gaps(&self, raw: &[f64], candidates: &[usize], period: f64) -> Vec<usize> {
        if !(period.is_finite() && period > 0.0) {
            return candidates.to_vec();
        }
        let reach = quarter_window(period);
        let mut out = candidates.to_vec();

        for pair in candidates.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let gap = (b - a) as f64;
            let cycles = (gap / period).round() as usize;
            if cycles < 2 {
                continue;
            }
            let step = gap / cycles as f64;
            for j in 1..cycles {
                let expected = a + (step * j as f64).round() as usize;
                let lo = expected.saturating_sub(reach).max(a + 1);
                let hi = (expected + reach + 1).min(b);
                if let Some(best) = stats::argmax_in(raw, lo, hi) {
                    out.push(best);
                }
            }
        }
        dedup_sorted(out)
    }

    fn remove_shoulders(&self, raw: &[f64], candidates: &[usize]) -> Vec<usize> {
        let dip = |a: usize, b: usize| -> f64 {
            raw[a..=b].iter().copied().fold(f64::INFINITY, f64::min)
        };
        let is_shoulder = |p: usize, q: usize| -> bool {
            let (lo, hi) = if p < q { (p, q) } else { (q, p) };
            let m = dip(lo, hi);
            raw[p] - m < SHOULDER_RATIO * (raw[q] - m)
        };

        candidates
            .iter()
            .enumerate()
            .filter(|&(i, &p)| {
                let prev = i.checked_sub(1).map(|j| candidates[j]);
                let next = candidates.get(i + 1).copied();
                !prev.map_or(false, |q| is_shoulder(p, q)) && !next.map_or(false, |q| is_shoulder(p, q))
            })
            .map(|(_, &p)| p)
            .collect()
    }

    fn reconcile(
        &self,
        raw: &[f64],
        peaks: &[usize],
        troughs: &[usize],
    ) -> (Vec<usize>, Vec<usize>) {
        let median = stats::median(raw).unwrap_or(0.0);

        // An index claimed by both sets goes to the side of the median it sits on
        let mut events: Vec<(usize, bool)> = Vec::with_capacity(peaks.len() + troughs.len());
        for &p in peaks {
            if troughs.binary_search(&p).is_err() || raw[p] >= median {
                events.push((p, true));
            }
        }
        for &t in troughs {
            if peaks.binary_search(&t).is_err() || raw[t] < median {
                events.push((t, false));
            }
        }
        events.sort_unstable_by_key(|&(i, _)| i);

        let mut merged: Vec<(usize, bool)> = Vec::with_capacity(events.len());
        for (idx, is_peak) in events {
            let Some(&(prev, prev_peak)) = merged.last() else {
                merged.push((idx, is_peak));
                continue;
            };
            if prev_peak != is_peak {
                merged.push((idx, is_peak));
                continue;
            }

            // Two of a kind in a row: look for the missing opposite extremum
            let between = if is_peak {
                stats::argmin_in(raw, prev + 1, idx)
                    .filter(|&m| raw[m] < raw[prev].min(raw[idx]))
            } else {
                stats::argmax_in(raw, prev + 1, idx)
                    .filter(|&m| raw[m] > raw[prev].max(raw[idx]))
            };
            match between {
                Some(m) => {
                    merged.push((m, !is_peak));
                    merged.push((idx, is_peak));
                }
                None => {
                    let stronger = if is_peak {
                        raw[idx] > raw[prev]
                    } else {
                        raw[idx] < raw[prev]
                    };
                    if stronger {
                        if let Some(last) = merged.last_mut() {
                            *last = (idx, is_peak);
                        }
                    }
                }
            }
        }

        let peaks = merged.iter().filter(|e| e.1).map(|e| e.0).collect();
        let troughs = merged.iter().filter(|e| !e.1).map(|e| e.0).collect();
        (peaks, troughs)
    }
}
