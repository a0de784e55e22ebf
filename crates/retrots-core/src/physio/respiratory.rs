use ndarray::Array1;
use std::f64::consts::PI;

use crate::error::{RetroError, RetroResult};
use crate::signal::{ExtremumKind, ExtremumSet, PhaseSignal, RawSignal};

/// Amplitude histogram resolution inside each breathing segment.
pub const HISTOGRAM_BINS: usize = 100;

const STAGE: &str = "respiratory phase";

/// One stretch of the signal mapped through its own amplitude histogram.
struct Segment {
    start: usize,
    end: usize,
    /// Subtracted from every sample before binning
    baseline: f64,
    /// Histogram covers [0, range]
    range: f64,
    /// +1 inspiration, -1 expiration
    polarity: f64,
    /// Highest allowed summation limit
    max_limit: usize,
}

/// Bin counts over [0, range] with edges `k * range / 100`.
///
/// In-range values follow numpy's uniform-bin rule: the scaled index is
/// checked against the neighbouring edges and moved by one when rounding put
/// it on the wrong side. A value equal to `range` counts in the last bin;
/// out-of-range values land in the edge bins.
fn histogram(values: &[f64], range: f64) -> [usize; HISTOGRAM_BINS] {
    let last = HISTOGRAM_BINS - 1;
    let width = range / HISTOGRAM_BINS as f64;
    let norm = HISTOGRAM_BINS as f64 / range;
    let edge = |k: usize| {
        if k == HISTOGRAM_BINS {
            range
        } else {
            k as f64 * width
        }
    };

    let mut counts = [0usize; HISTOGRAM_BINS];
    for &v in values {
        let bin = if v <= 0.0 {
            0
        } else if v >= range {
            last
        } else {
            let mut k = ((v * norm) as usize).min(last);
            if v < edge(k) {
                k -= 1;
            } else if k < last && v >= edge(k + 1) {
                k += 1;
            }
            k
        };
        counts[bin] += 1;
    }
    counts
}

impl Segment {
    fn fill(&self, shifted: &[f64], phase: &mut Array1<f64>) {
        let len = self.end - self.start;
        if len == 0 {
            return;
        }
        let values: Vec<f64> = shifted[self.start..self.end]
            .iter()
            .map(|x| x - self.baseline)
            .collect();
        let counts = histogram(&values, self.range);

        // Running totals so each sample is a single lookup
        let mut cumulative = [0usize; HISTOGRAM_BINS + 1];
        for (i, c) in counts.iter().enumerate() {
            cumulative[i + 1] = cumulative[i] + c;
        }

        for (offset, v) in values.iter().enumerate() {
            let limit = (v * HISTOGRAM_BINS as f64 / self.range).round_ties_even();
            let limit = limit.clamp(0.0, self.max_limit as f64) as usize;
            phase[self.start + offset] = PI * self.polarity * cumulative[limit] as f64 / len as f64;
        }
    }
}

/// Respiratory phase in (-π, π] from alternating peaks and troughs.
///
/// Inside each segment between consecutive extrema, phase is π times the
/// fraction of segment samples whose amplitude falls below the current one,
/// positive while inhaling (segment ends at a peak) and negative while
/// exhaling.
pub fn respiratory_phase(
    signal: &RawSignal,
    peaks: &ExtremumSet,
    troughs: &ExtremumSet,
) -> RetroResult<PhaseSignal> {
    let kind = signal.kind();
    if peaks.is_empty() || troughs.is_empty() {
        return Err(RetroError::quality(
            kind,
            STAGE,
            "at least one peak and one trough are needed",
        ));
    }

    let raw = signal.as_slice();
    let n = raw.len();
    let floor = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = raw.iter().map(|x| x - floor).collect();

    let mut events: Vec<(usize, ExtremumKind)> = peaks
        .indices()
        .iter()
        .map(|&i| (i, ExtremumKind::Peak))
        .chain(troughs.indices().iter().map(|&i| (i, ExtremumKind::Trough)))
        .collect();
    events.sort_unstable_by_key(|e| e.0);
    if events
        .windows(2)
        .any(|w| w[0].0 == w[1].0 || w[0].1 == w[1].1)
    {
        return Err(RetroError::quality(
            kind,
            STAGE,
            "peaks and troughs do not strictly alternate",
        ));
    }
    if events.iter().any(|e| e.0 >= n) {
        return Err(RetroError::quality(kind, STAGE, "extremum index beyond the signal"));
    }

    let polarity_toward = |k: ExtremumKind| match k {
        ExtremumKind::Peak => 1.0,
        ExtremumKind::Trough => -1.0,
    };
    // Peak and trough values of an adjacent pair, as (peak, trough)
    let pair_levels = |a: (usize, ExtremumKind), b: (usize, ExtremumKind)| match a.1 {
        ExtremumKind::Peak => (shifted[a.0], shifted[b.0]),
        ExtremumKind::Trough => (shifted[b.0], shifted[a.0]),
    };

    let mut segments = Vec::with_capacity(events.len() + 1);

    let (head, head_next) = (events[0], events[1]);
    if head.0 > 0 {
        let (peak, trough) = pair_levels(head, head_next);
        segments.push(Segment {
            start: 0,
            end: head.0,
            baseline: trough,
            range: peak - trough,
            polarity: polarity_toward(head.1),
            max_limit: HISTOGRAM_BINS - 1,
        });
    }

    for w in events.windows(2) {
        let (start, end) = (w[0].0, w[1].0);
        let slice = &shifted[start..end];
        let lo = slice.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        segments.push(Segment {
            start,
            end,
            baseline: lo,
            range: hi - lo,
            polarity: polarity_toward(w[1].1),
            max_limit: HISTOGRAM_BINS,
        });
    }

    let (tail_prev, tail) = (events[events.len() - 2], events[events.len() - 1]);
    let (peak, trough) = pair_levels(tail, tail_prev);
    segments.push(Segment {
        start: tail.0,
        end: n,
        baseline: trough,
        range: peak - trough,
        // Leaving a peak means exhaling
        polarity: -polarity_toward(tail.1),
        max_limit: HISTOGRAM_BINS - 1,
    });

    let mut phase = Array1::<f64>::zeros(n);
    for seg in &segments {
        if !(seg.range.is_finite() && seg.range > 0.0) {
            return Err(RetroError::quality(
                kind,
                STAGE,
                format!(
                    "flat amplitude range in samples {}..{}",
                    seg.start, seg.end
                ),
            ));
        }
        seg.fill(&shifted, &mut phase);
    }

    // Same angle; keeps the range half-open at -π
    phase.mapv_inplace(|x| if x <= -PI { PI } else { x });
    Ok(PhaseSignal::new(kind, signal.sample_rate(), phase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalKind;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn resp(samples: Vec<f64>) -> RawSignal {
        RawSignal::new(SignalKind::Respiratory, 10.0, samples).unwrap()
    }

    fn set(kind: ExtremumKind, idx: Vec<usize>, n: usize) -> ExtremumSet {
        ExtremumSet::new(kind, idx, n).unwrap()
    }

    fn triangle(period: usize, n: usize) -> Vec<f64> {
        // trough at 0, peak at period / 2
        let half = period / 2;
        (0..n)
            .map(|i| {
                let r = i % period;
                if r <= half { r as f64 } else { (period - r) as f64 }
            })
            .collect()
    }

    #[test]
    fn inspiration_rises_to_pi() {
        let samples = triangle(20, 41);
        let signal = resp(samples);
        let peaks = set(ExtremumKind::Peak, vec![10, 30], 41);
        let troughs = set(ExtremumKind::Trough, vec![20], 41);
        let phase = respiratory_phase(&signal, &peaks, &troughs).unwrap();
        let v = phase.values();

        // Expiration 10..20 starts at the top
        assert_relative_eq!(v[10], PI, epsilon = 1e-12);
        // Inspiration 20..30 starts at the bottom
        assert_relative_eq!(v[20], 0.0, epsilon = 1e-12);
        for t in 21..30 {
            assert!(v[t] > v[t - 1]);
            assert!(v[t] > 0.0 && v[t] <= PI);
        }
        // the segment minimum maps to zero
        for t in 11..19 {
            assert!(v[t] < 0.0);
        }
    }

    #[test]
    fn boundary_polarity_follows_adjacent_extremum() {
        let samples = triangle(20, 41);
        let signal = resp(samples);
        let peaks = set(ExtremumKind::Peak, vec![10, 30], 41);
        let troughs = set(ExtremumKind::Trough, vec![20], 41);
        let v = respiratory_phase(&signal, &peaks, &troughs).unwrap();
        let v = v.values();
        // Head runs toward a peak, tail leaves a peak
        assert!(v.iter().take(10).skip(1).all(|&x| x > 0.0));
        assert!(v.iter().skip(30).take(10).all(|&x| x < 0.0));
    }

    #[test]
    fn integer_levels_stay_in_their_own_bin() {
        let ramp: Vec<f64> = (0..=100).map(f64::from).collect();
        let counts = histogram(&ramp, 100.0);
        assert!(counts[..99].iter().all(|&c| c == 1));
        // closed last bin takes both 99 and 100
        assert_eq!(counts[99], 2);
    }

    #[test]
    fn integer_ramp_counts_strictly_lower_samples() {
        // trough at 1, peak at 102; the inspiration holds 0, 1, ..., 100
        let mut samples = vec![50.0];
        samples.extend((0..=100).map(f64::from));
        samples.extend([100.5, 50.0]);
        let n = samples.len();
        let signal = resp(samples);
        let phase = respiratory_phase(
            &signal,
            &set(ExtremumKind::Peak, vec![102], n),
            &set(ExtremumKind::Trough, vec![1], n),
        )
        .unwrap();
        let v = phase.values();

        for level in 0..100 {
            assert_relative_eq!(v[1 + level], PI * level as f64 / 101.0, epsilon = 1e-12);
        }
        assert_relative_eq!(v[101], PI, epsilon = 1e-12);
    }

    #[test]
    fn boundary_segments_use_adjacent_pair() {
        // peaks at 3 and 9, trough at 6
        let samples = vec![10.0, -2.0, 5.0, 10.0, 7.0, 3.0, 0.0, 4.0, 6.0, 8.0, 9.0, 4.0];
        let n = samples.len();
        let signal = resp(samples);
        let phase = respiratory_phase(
            &signal,
            &set(ExtremumKind::Peak, vec![3, 9], n),
            &set(ExtremumKind::Trough, vec![6], n),
        )
        .unwrap();
        let v = phase.values();

        // Head: baseline is the trough at 6, Rmax = 10, inspiration
        // A sample at the peak level stops at cumulative[99]
        assert_relative_eq!(v[0], 2.0 * PI / 3.0, epsilon = 1e-12);
        // Below the trough clamps to the first bin and a zero limit
        assert_relative_eq!(v[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(v[2], PI / 3.0, epsilon = 1e-12);

        // Tail: Rmax = 8 from the peak at 9, expiration
        assert_relative_eq!(v[9], -PI / 3.0, epsilon = 1e-12);
        // above the peak clamps to the last bin
        assert_relative_eq!(v[10], -PI / 3.0, epsilon = 1e-12);
        assert_relative_eq!(v[11], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn three_extrema_fill_whole_signal() {
        let samples = triangle(20, 35);
        let signal = resp(samples);
        let peaks = set(ExtremumKind::Peak, vec![10, 30], 35);
        let troughs = set(ExtremumKind::Trough, vec![20], 35);
        let phase = respiratory_phase(&signal, &peaks, &troughs).unwrap();
        assert_eq!(phase.len(), 35);
        assert!(phase.values().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn flat_segment_is_rejected() {
        let mut samples = triangle(20, 41);
        for x in samples.iter_mut().take(31).skip(20) {
            *x = 0.0;
        }
        let signal = resp(samples);
        let peaks = set(ExtremumKind::Peak, vec![10, 30], 41);
        let troughs = set(ExtremumKind::Trough, vec![20], 41);
        assert!(respiratory_phase(&signal, &peaks, &troughs).is_err());
    }

    #[test]
    fn non_alternating_extrema_rejected() {
        let signal = resp(triangle(20, 41));
        let peaks = set(ExtremumKind::Peak, vec![10, 12], 41);
        let troughs = set(ExtremumKind::Trough, vec![20], 41);
        assert!(respiratory_phase(&signal, &peaks, &troughs).is_err());
    }

    proptest! {
        #[test]
        fn phase_bounded_and_rank_monotone(
            amplitudes in prop::collection::vec(1.0f64..5.0, 4..10),
            half in 4usize..15,
        ) {
            // Alternate rise/fall ramps with random heights
            let mut samples = vec![0.0];
            let mut peaks = Vec::new();
            let mut troughs = Vec::new();
            let mut level = 0.0;
            for (k, amp) in amplitudes.iter().enumerate() {
                let (from, to) = if k % 2 == 0 { (0.0, *amp) } else { (level, 0.0) };
                for s in 1..=half {
                    let frac = s as f64 / half as f64;
                    samples.push(from + (to - from) * frac);
                }
                level = to;
                if k % 2 == 0 {
                    peaks.push(samples.len() - 1);
                } else {
                    troughs.push(samples.len() - 1);
                }
            }
            samples.extend([0.5, 0.25]);
            let n = samples.len();
            let signal = resp(samples.clone());
            let phase = respiratory_phase(
                &signal,
                &set(ExtremumKind::Peak, peaks.clone(), n),
                &set(ExtremumKind::Trough, troughs.clone(), n),
            )
            .unwrap();
            let v = phase.values();
            prop_assert!(v.iter().all(|&x| x > -PI && x <= PI));

            // Within the first full inspiration, louder samples never get smaller |phase|
            if let (Some(&p), Some(&t)) = (peaks.get(1), troughs.first()) {
                for i in t..p {
                    for j in t..p {
                        if samples[i] < samples[j] {
                            prop_assert!(v[i].abs() <= v[j].abs() + 1e-12);
                        }
                    }
                }
            }
        }
    }
}
