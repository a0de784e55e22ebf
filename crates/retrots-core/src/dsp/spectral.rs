//! FFT-based spectral helpers: dominant frequency, zero-phase band-pass and
//! period estimation.

use num_complex::Complex64;
use rustfft::FftPlanner;
use std::f64::consts::PI;

use super::stats;

/// Band kept around the dominant frequency f0, as multiples of f0.
const BAND_LOW_FACTOR: f64 = 0.5;
const BAND_HIGH_FACTOR: f64 = 1.5;

/// Spectral peaks weaker than this (relative to total power) count as silence.
const MIN_RELATIVE_POWER: f64 = 1e-12;

/// Dominant spectral component of a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantComponent {
    /// FFT bin index (>= 1)
    pub bin: usize,
    pub frequency_hz: f64,
    /// Cycle length in samples (n / bin)
    pub period_samples: f64,
}

/// Create Hamming window for FFT
pub fn hamming_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.54 - 0.46 * ((2.0 * PI * i as f64) / ((size - 1) as f64)).cos())
        .collect()
}

/// One-sided power spectrum of the mean-removed, Hamming-windowed signal.
pub fn power_spectrum(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return Vec::new();
    }

    let detrended = stats::detrend(signal);
    let window = hamming_window(n);
    let mut buffer: Vec<Complex64> = detrended
        .iter()
        .zip(window.iter())
        .map(|(s, w)| Complex64::new(s * w, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    buffer.iter().take(n / 2 + 1).map(|c| c.norm_sqr()).collect()
}

/// Strongest spectral component at or above `min_freq` Hz.
///
/// Returns `None` for silent (constant) or too-short signals.
pub fn dominant_component(signal: &[f64], fs: f64, min_freq: f64) -> Option<DominantComponent> {
    let n = signal.len();
    if n < 4 || fs <= 0.0 {
        return None;
    }
    let spectrum = power_spectrum(signal);
    let bin_res = fs / n as f64;
    let first_bin = ((min_freq / bin_res).ceil() as usize).max(1);
    if first_bin >= spectrum.len() {
        return None;
    }

    let total: f64 = spectrum.iter().skip(1).sum();
    let (bin, power) = spectrum
        .iter()
        .enumerate()
        .skip(first_bin)
        .fold((0usize, 0.0f64), |best, (k, &p)| if p > best.1 { (k, p) } else { best });

    if bin == 0 || !(power.is_finite()) || power <= MIN_RELATIVE_POWER * total.max(f64::MIN_POSITIVE) {
        return None;
    }

    let period_samples = n as f64 / bin as f64;
    (period_samples.is_finite() && period_samples > 0.0).then_some(DominantComponent {
        bin,
        frequency_hz: bin as f64 * bin_res,
        period_samples,
    })
}

/// Zero-phase FFT band-pass keeping `[low_hz, high_hz]`; DC is removed.
pub fn bandpass(signal: &[f64], fs: f64, low_hz: f64, high_hz: f64) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let mut buffer: Vec<Complex64> = signal.iter().map(|&s| Complex64::new(s, 0.0)).collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let bin_res = fs / n as f64;
    for (k, value) in buffer.iter_mut().enumerate() {
        // Mirror negative-frequency bins onto their positive counterpart
        let folded = if k <= n / 2 { k } else { n - k };
        let freq = folded as f64 * bin_res;
        if folded == 0 || freq < low_hz || freq > high_hz {
            *value = Complex64::new(0.0, 0.0);
        }
    }

    planner.plan_fft_inverse(n).process(&mut buffer);
    let scale = 1.0 / n as f64;
    buffer.iter().map(|c| c.re * scale).collect()
}

/// Band-pass around the dominant frequency found above `min_freq`.
///
/// Returns the filtered signal and the component it was centred on, or `None`
/// when the spectrum holds no energy above the bound.
pub fn bandpass_around_dominant(
    signal: &[f64],
    fs: f64,
    min_freq: f64,
) -> Option<(Vec<f64>, DominantComponent)> {
    let dominant = dominant_component(signal, fs, min_freq)?;
    let low = (dominant.frequency_hz * BAND_LOW_FACTOR).max(min_freq);
    let high = dominant.frequency_hz * BAND_HIGH_FACTOR;
    let filtered = bandpass(signal, fs, low, high);
    if filtered.iter().all(|x| x.abs() < f64::EPSILON) {
        return None;
    }
    Some((filtered, dominant))
}

/// Typical cycle length of an (already band-limited) signal, in samples.
pub fn period_samples(filtered: &[f64]) -> Option<f64> {
    // Unit rate: frequencies come out in cycles per sample.
    dominant_component(filtered, 1.0, 0.0).map(|d| d.period_samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine(fs: f64, hz: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * hz * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_hamming_window() {
        let window = hamming_window(10);
        assert_eq!(window.len(), 10);
        assert_relative_eq!(window[0], 0.08, epsilon = 0.01);
        assert_relative_eq!(window[9], 0.08, epsilon = 0.01);
    }

    #[test]
    fn dominant_frequency_of_sine() {
        let fs = 50.0;
        let signal = sine(fs, 1.25, 2000);
        let dom = dominant_component(&signal, fs, 25.0 / 60.0).unwrap();
        assert_relative_eq!(dom.frequency_hz, 1.25, epsilon = 0.05);
        assert_relative_eq!(dom.period_samples, 40.0, epsilon = 1.0);
    }

    #[test]
    fn dominant_ignores_content_below_bound() {
        let fs = 50.0;
        let n = 5000;
        let slow = sine(fs, 0.1, n);
        let fast = sine(fs, 1.0, n);
        let mixed: Vec<f64> = slow.iter().zip(&fast).map(|(a, b)| 5.0 * a + b).collect();
        let dom = dominant_component(&mixed, fs, 0.5).unwrap();
        assert_relative_eq!(dom.frequency_hz, 1.0, epsilon = 0.02);
    }

    #[test]
    fn constant_signal_has_no_dominant_component() {
        let flat = vec![3.0; 512];
        assert!(dominant_component(&flat, 50.0, 0.1).is_none());
        assert!(bandpass_around_dominant(&flat, 50.0, 0.1).is_none());
        assert!(period_samples(&flat).is_none());
    }

    #[test]
    fn bandpass_removes_offset_and_keeps_band() {
        let fs = 100.0;
        let n = 1000;
        let signal: Vec<f64> = sine(fs, 2.0, n).iter().map(|x| x + 10.0).collect();
        let filtered = bandpass(&signal, fs, 1.0, 3.0);
        let mean = filtered.iter().sum::<f64>() / n as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
        let reference = sine(fs, 2.0, n);
        for (a, b) in filtered.iter().zip(&reference) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }
}
