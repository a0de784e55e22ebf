use serde::{Deserialize, Serialize};

use crate::error::{RetroError, RetroResult};
use crate::signal::{PhaseSignal, RawSignal};

/// Fourier expansion order M; harmonics m = 1..M-1 are modelled.
pub const HARMONIC_ORDER: usize = 3;

const HARMONICS: usize = HARMONIC_ORDER - 1;

/// Amplitudes of the cosine (a) and sine (b) terms per harmonic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicCoefficients {
    pub a: [f64; HARMONICS],
    pub b: [f64; HARMONICS],
}

impl Default for HarmonicCoefficients {
    fn default() -> Self {
        Self::unit()
    }
}

impl HarmonicCoefficients {
    /// Plain harmonics, used when amplitudes are not fitted.
    pub fn unit() -> Self {
        Self {
            a: [1.0; HARMONICS],
            b: [1.0; HARMONICS],
        }
    }

    /// Least-squares projection of the mean-removed signal onto cos(mφ) and
    /// sin(mφ) for each harmonic m.
    pub fn fit(signal: &RawSignal, phase: &PhaseSignal) -> RetroResult<Self> {
        let kind = signal.kind();
        let x = signal.samples();
        let phi = phase.values();
        if x.len() != phi.len() {
            return Err(RetroError::quality(
                kind,
                "coefficient fit",
                "phase and signal lengths differ",
            ));
        }
        let mean = x.mean().unwrap_or(0.0);

        let mut coeffs = Self::unit();
        for h in 0..HARMONICS {
            let m = (h + 1) as f64;
            let (mut num_a, mut den_a, mut num_b, mut den_b) = (0.0, 0.0, 0.0, 0.0);
            for (&xi, &p) in x.iter().zip(phi.iter()) {
                let (s, c) = (m * p).sin_cos();
                num_a += (xi - mean) * c;
                den_a += c * c;
                num_b += (xi - mean) * s;
                den_b += s * s;
            }
            if den_a <= f64::EPSILON || den_b <= f64::EPSILON {
                return Err(RetroError::quality(
                    kind,
                    "coefficient fit",
                    format!("zero denominator for harmonic {}", h + 1),
                ));
            }
            coeffs.a[h] = num_a / den_a;
            coeffs.b[h] = num_b / den_b;
        }
        Ok(coeffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalKind;
    use approx::assert_relative_eq;
    use ndarray::Array1;
    use std::f64::consts::PI;

    #[test]
    fn unit_is_default() {
        let c = HarmonicCoefficients::default();
        assert_eq!(c.a, [1.0, 1.0]);
        assert_eq!(c.b, [1.0, 1.0]);
    }

    #[test]
    fn recovers_known_amplitudes() {
        let n = 400;
        let phi: Vec<f64> = (0..n).map(|i| 2.0 * PI * (i % 50) as f64 / 50.0 - PI).collect();
        let x: Vec<f64> = phi
            .iter()
            .map(|p| 5.0 + 2.0 * p.cos() + 0.5 * p.sin() - 0.25 * (2.0 * p).cos())
            .collect();
        let signal = RawSignal::new(SignalKind::Cardiac, 50.0, x).unwrap();
        let phase = PhaseSignal::new(SignalKind::Cardiac, 50.0, Array1::from(phi));

        let c = HarmonicCoefficients::fit(&signal, &phase).unwrap();
        assert_relative_eq!(c.a[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(c.b[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(c.a[1], -0.25, epsilon = 1e-9);
        assert_relative_eq!(c.b[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn constant_phase_has_zero_sine_denominator() {
        let signal = RawSignal::new(SignalKind::Cardiac, 50.0, vec![1.0, 2.0, 3.0]).unwrap();
        let phase = PhaseSignal::new(SignalKind::Cardiac, 50.0, Array1::zeros(3));
        assert!(HarmonicCoefficients::fit(&signal, &phase).is_err());
    }
}
