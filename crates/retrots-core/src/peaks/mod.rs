//! Peak/trough extraction.
//!
//! The elementary stages live behind [`PeakFilters`] so the recipes in
//! [`pipeline`] only describe *order* and *parameters*. Every stage works on
//! maxima; troughs are found by handing the stages a negated signal.
//!
//! ```text
//! raw ──► bandpass ──► coarse ──► refine ──► percentile ──► period
//!                                                             │
//!     gap fill ◄── shoulders ◄── downstroke ◄── upstroke ◄── merge
//! ```

pub mod pipeline;
pub mod stages;

pub use pipeline::PeakPipeline;
pub use stages::DefaultPeakFilters;

/// Side of a candidate inspected by the directional removal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Samples after the candidate (false peaks on the upstroke)
    Right,
    /// Samples before the candidate (false peaks on the downstroke)
    Left,
}

/// Named, parameterized filter stages used by the extraction recipes.
///
/// `raw` is always the unfiltered signal oriented so the wanted extremum is a
/// maximum. Candidate lists are sorted sample indices into `raw`.
pub trait PeakFilters {
    /// Band-pass around the dominant frequency at or above `min_hz`.
    /// `None` when the spectrum has no usable energy.
    fn bandpass(&self, raw: &[f64], fs: f64, min_hz: f64) -> Option<Vec<f64>>;

    /// Local maxima of `filtered` that dominate a `±width` window.
    fn coarse_search(&self, filtered: &[f64], width: usize) -> Vec<usize>;

    /// Move each candidate to the nearest local maximum of `raw`.
    fn refine(&self, raw: &[f64], candidates: &[usize]) -> Vec<usize>;

    /// Keep candidates at or above the `q`-th percentile of the whole signal.
    fn percentile_filter(&self, raw: &[f64], candidates: &[usize], q: f64) -> Vec<usize>;

    /// Percentile filter against a window `num_periods` typical spacings wide.
    fn local_percentile_filter(
        &self,
        raw: &[f64],
        candidates: &[usize],
        q: f64,
        num_periods: usize,
    ) -> Vec<usize>;

    /// Typical cycle length of the filtered signal, in samples.
    fn period(&self, filtered: &[f64]) -> Option<f64>;

    /// Collapse candidates closer than a quarter period, keeping the higher.
    fn merge_close(&self, raw: &[f64], candidates: &[usize], period: f64) -> Vec<usize>;

    /// Drop candidates with a higher sample within a quarter period on `side`.
    fn remove_directional(
        &self,
        raw: &[f64],
        candidates: &[usize],
        period: f64,
        side: Direction,
    ) -> Vec<usize>;

    /// Insert candidates into gaps spanning two or more periods.
    fn fill_gaps(&self, raw: &[f64], candidates: &[usize], period: f64) -> Vec<usize>;

    /// Drop shoulder artifacts that barely rise above the dip to a neighbour.
    fn remove_shoulders(&self, raw: &[f64], candidates: &[usize]) -> Vec<usize>;

    /// Make peaks and troughs disjoint and strictly alternating.
    ///
    /// Unlike the other stages this one sees the signal in its natural
    /// orientation: peaks are maxima and troughs are minima of `raw`.
    fn reconcile(&self, raw: &[f64], peaks: &[usize], troughs: &[usize])
        -> (Vec<usize>, Vec<usize>);
}
