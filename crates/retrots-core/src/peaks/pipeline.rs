//! Fixed extraction recipes for cardiac peaks and respiratory peaks/troughs.

use tracing::debug;

use crate::config::FilterParams;
use crate::error::{RetroError, RetroResult};
use crate::signal::{Extrema, ExtremumKind, ExtremumSet, RawSignal, SignalKind};

use super::{DefaultPeakFilters, Direction, PeakFilters};

/// Sequences [`PeakFilters`] stages into the per-signal recipes.
pub struct PeakPipeline<'a, F: PeakFilters = DefaultPeakFilters> {
    filters: F,
    params: &'a FilterParams,
}

impl<'a> PeakPipeline<'a, DefaultPeakFilters> {
    pub fn new(params: &'a FilterParams) -> Self {
        Self::with_filters(DefaultPeakFilters, params)
    }
}

/// Fail the signal type when a stage leaves nothing behind.
fn require(
    kind: SignalKind,
    stage: &'static str,
    candidates: Vec<usize>,
) -> RetroResult<Vec<usize>> {
    debug!(signal = %kind, stage, count = candidates.len(), "stage complete");
    if candidates.is_empty() {
        return Err(RetroError::quality(kind, stage, "no candidates left"));
    }
    Ok(candidates)
}

fn search_width(fs: f64, divisor: f64) -> usize {
    ((fs / divisor) as usize).max(1)
}

impl<'a, F: PeakFilters> PeakPipeline<'a, F> {
    pub fn with_filters(filters: F, params: &'a FilterParams) -> Self {
        Self { filters, params }
    }

    /// Run the recipe matching the signal's kind.
    pub fn extract(&self, signal: &RawSignal) -> RetroResult<Extrema> {
        match signal.kind() {
            SignalKind::Cardiac => Ok(Extrema::Cardiac {
                peaks: self.cardiac_peaks(signal)?,
            }),
            SignalKind::Respiratory => {
                let (peaks, troughs) = self.respiratory_extrema(signal)?;
                Ok(Extrema::Respiratory { peaks, troughs })
            }
        }
    }

    fn filtered(&self, signal: &RawSignal, min_hz: f64) -> RetroResult<Vec<f64>> {
        let kind = signal.kind();
        self.filters
            .bandpass(signal.as_slice(), signal.sample_rate(), min_hz)
            .ok_or_else(|| {
                RetroError::quality(kind, "bandpass", "no spectral energy above the lower bound")
            })
    }

    fn period(&self, kind: SignalKind, filtered: &[f64]) -> RetroResult<f64> {
        match self.filters.period(filtered) {
            Some(p) if p.is_finite() && p > 0.0 => {
                debug!(signal = %kind, period_samples = p, "typical period");
                Ok(p)
            }
            _ => Err(RetroError::quality(kind, "period", "no finite positive period")),
        }
    }

    /// Cardiac recipe; needs at least two beats to form a phase.
    pub fn cardiac_peaks(&self, signal: &RawSignal) -> RetroResult<ExtremumSet> {
        let kind = SignalKind::Cardiac;
        let p = self.params;
        let f = &self.filters;
        let raw = signal.as_slice();
        let fs = signal.sample_rate();

        let filtered = self.filtered(signal, p.cardiac_min_bpm / 60.0)?;
        let peaks = require(
            kind,
            "coarse search",
            f.coarse_search(&filtered, search_width(fs, p.cardiac_search_divisor)),
        )?;
        let peaks = require(kind, "refine", f.refine(raw, &peaks))?;
        let peaks = require(
            kind,
            "local percentile",
            f.local_percentile_filter(
                raw,
                &peaks,
                p.cardiac_percentile,
                p.cardiac_percentile_periods,
            ),
        )?;
        let period = self.period(kind, &filtered)?;
        let peaks = require(kind, "merge", f.merge_close(raw, &peaks, period))?;
        let peaks = require(
            kind,
            "upstroke",
            f.remove_directional(raw, &peaks, period, Direction::Right),
        )?;
        let peaks = require(
            kind,
            "downstroke",
            f.remove_directional(raw, &peaks, period, Direction::Left),
        )?;
        let peaks = require(kind, "shoulders", f.remove_shoulders(raw, &peaks))?;
        let peaks = require(kind, "gap fill", f.fill_gaps(raw, &peaks, period))?;

        if peaks.len() < 2 {
            return Err(RetroError::quality(
                kind,
                "gap fill",
                format!("{} peak found, at least 2 are needed", peaks.len()),
            ));
        }
        ExtremumSet::new(ExtremumKind::Peak, peaks, raw.len())
            .ok_or_else(|| RetroError::quality(kind, "gap fill", "peaks are not strictly increasing"))
    }

    /// Respiratory recipe; peaks and troughs come back strictly alternating.
    pub fn respiratory_extrema(&self, signal: &RawSignal) -> RetroResult<(ExtremumSet, ExtremumSet)> {
        let kind = SignalKind::Respiratory;
        let p = self.params;
        let f = &self.filters;
        let raw = signal.as_slice();
        let fs = signal.sample_rate();

        let filtered = self.filtered(signal, 1.0 / p.resp_max_period_secs)?;

        // Peaks
        let peaks = require(
            kind,
            "coarse search",
            f.coarse_search(&filtered, search_width(fs, p.resp_peak_search_divisor)),
        )?;
        let peaks = require(kind, "refine", f.refine(raw, &peaks))?;
        let period = self.period(kind, &filtered)?;
        let peaks = require(
            kind,
            "percentile",
            f.percentile_filter(raw, &peaks, p.resp_peak_percentile),
        )?;
        let peaks = self.clean_directional(kind, raw, peaks, period)?;
        let peaks = require(kind, "shoulders", f.remove_shoulders(raw, &peaks))?;
        let peaks = require(kind, "merge", f.merge_close(raw, &peaks, period))?;
        let peaks = require(kind, "gap fill", f.fill_gaps(raw, &peaks, period))?;
        let peaks = self.clean_directional(kind, raw, peaks, period)?;

        // Troughs: the same stages on the inverted signal
        let inverted = ExtremumKind::Trough.orient(raw);
        let inverted_filtered = ExtremumKind::Trough.orient(&filtered);
        let troughs = require(
            kind,
            "trough coarse search",
            f.coarse_search(&inverted_filtered, search_width(fs, p.resp_trough_search_divisor)),
        )?;
        let troughs = require(kind, "trough refine", f.refine(&inverted, &troughs))?;
        let troughs = require(
            kind,
            "trough percentile",
            f.percentile_filter(&inverted, &troughs, 100.0 - p.resp_trough_percentile),
        )?;
        let troughs = self.clean_directional(kind, &inverted, troughs, period)?;
        let troughs = require(kind, "trough shoulders", f.remove_shoulders(&inverted, &troughs))?;
        let troughs = require(kind, "trough merge", f.merge_close(&inverted, &troughs, period))?;

        let (peaks, troughs) = f.reconcile(raw, &peaks, &troughs);
        debug!(
            signal = %kind,
            peaks = peaks.len(),
            troughs = troughs.len(),
            "reconciled extrema"
        );
        if peaks.is_empty() || troughs.is_empty() || peaks.len() + troughs.len() < 2 {
            return Err(RetroError::quality(
                kind,
                "reconcile",
                "need at least one peak and one trough",
            ));
        }

        let invalid = || RetroError::quality(kind, "reconcile", "extrema are not strictly increasing");
        Ok((
            ExtremumSet::new(ExtremumKind::Peak, peaks, raw.len()).ok_or_else(invalid)?,
            ExtremumSet::new(ExtremumKind::Trough, troughs, raw.len()).ok_or_else(invalid)?,
        ))
    }

    fn clean_directional(
        &self,
        kind: SignalKind,
        oriented: &[f64],
        candidates: Vec<usize>,
        period: f64,
    ) -> RetroResult<Vec<usize>> {
        let f = &self.filters;
        let kept = require(
            kind,
            "upstroke",
            f.remove_directional(oriented, &candidates, period, Direction::Right),
        )?;
        require(
            kind,
            "downstroke",
            f.remove_directional(oriented, &kept, period, Direction::Left),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn cosine_train(kind: SignalKind, fs: f64, period: usize, offset: usize, n: usize) -> RawSignal {
        let samples = (0..n)
            .map(|i| (2.0 * PI * (i as f64 - offset as f64) / period as f64).cos())
            .collect();
        RawSignal::new(kind, fs, samples).unwrap()
    }

    #[test]
    fn cardiac_peaks_on_clean_pulse_train() {
        let params = FilterParams::default();
        let signal = cosine_train(SignalKind::Cardiac, 50.0, 50, 25, 1000);
        let peaks = PeakPipeline::new(&params).cardiac_peaks(&signal).unwrap();
        let expected: Vec<usize> = (0..20).map(|k| 25 + 50 * k).collect();
        assert_eq!(peaks.indices(), expected.as_slice());
    }

    #[test]
    fn respiratory_extrema_alternate() {
        let params = FilterParams::default();
        // 0.25 Hz breathing at 10 Hz sampling
        let signal = cosine_train(SignalKind::Respiratory, 10.0, 40, 20, 800);
        let (peaks, troughs) = PeakPipeline::new(&params)
            .respiratory_extrema(&signal)
            .unwrap();
        assert_eq!(peaks.indices().first(), Some(&20));
        assert!(troughs.indices().contains(&40));

        let mut events: Vec<(usize, bool)> = peaks
            .indices()
            .iter()
            .map(|&i| (i, true))
            .chain(troughs.indices().iter().map(|&i| (i, false)))
            .collect();
        events.sort_unstable();
        assert!(events.windows(2).all(|w| w[0].1 != w[1].1));
    }

    #[test]
    fn flat_signal_fails_at_bandpass() {
        let params = FilterParams::default();
        let signal = RawSignal::new(SignalKind::Respiratory, 10.0, vec![1.0; 500]).unwrap();
        match PeakPipeline::new(&params).extract(&signal) {
            Err(RetroError::SignalQuality { stage, .. }) => assert_eq!(stage, "bandpass"),
            other => panic!("expected quality error, got {other:?}"),
        }
    }
}
