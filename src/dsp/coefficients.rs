//! Filter coefficient design (RBJ-style biquad prototypes).
//!
//! Pure functions from (sample rate, settings) to coefficient sets. These are
//! called from the audio thread once per block, so they must be deterministic,
//! allocation-free, and total: every input is clamped into a numerically safe
//! region before it reaches the trig math. A degenerate request (frequency at
//! or above Nyquist, zero Q) yields a valid, stable filter rather than
//! NaN/Inf coefficients.

use crate::dsp::utils::db_to_lin;
use std::f32::consts::{FRAC_1_SQRT_2, PI};

/// Lowest frequency the designers will accept.
pub const MIN_DESIGN_HZ: f32 = 10.0;
/// Highest fraction of the sample rate the designers will accept.
const MAX_NYQUIST_FRAC: f32 = 0.49;
/// Q bounds for coefficient math.
const MIN_Q: f32 = 0.025;
const MAX_Q: f32 = 40.0;

/// One second-order section: `a*` feed the numerator, `b*` the denominator,
/// both already normalized by 1/a0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub a0: f32,
    pub a1: f32,
    pub a2: f32,
    pub b1: f32,
    pub b2: f32,
}

impl BiquadCoefficients {
    pub const IDENTITY: BiquadCoefficients = BiquadCoefficients {
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
        b1: 0.0,
        b2: 0.0,
    };

    /// Magnitude response at `freq` for a filter running at `sample_rate`.
    ///
    /// Evaluated in f64 so tests and visualization consumers get a clean
    /// curve; the coefficients themselves stay f32.
    pub fn magnitude_at(&self, freq: f32, sample_rate: f32) -> f64 {
        let w = 2.0 * std::f64::consts::PI * freq as f64 / sample_rate as f64;
        let (sin1, cos1) = w.sin_cos();
        let (sin2, cos2) = (2.0 * w).sin_cos();

        let num_re = self.a0 as f64 + self.a1 as f64 * cos1 + self.a2 as f64 * cos2;
        let num_im = -(self.a1 as f64 * sin1 + self.a2 as f64 * sin2);
        let den_re = 1.0 + self.b1 as f64 * cos1 + self.b2 as f64 * cos2;
        let den_im = -(self.b1 as f64 * sin1 + self.b2 as f64 * sin2);

        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt().max(1e-30);
        num / den
    }

    /// Magnitude response in dB.
    pub fn magnitude_db_at(&self, freq: f32, sample_rate: f32) -> f64 {
        20.0 * self.magnitude_at(freq, sample_rate).max(1e-30).log10()
    }
}

#[inline]
fn clamp_freq(freq: f32, sample_rate: f32) -> f32 {
    freq.clamp(MIN_DESIGN_HZ, sample_rate * MAX_NYQUIST_FRAC)
}

/// Peaking (bell) EQ section. Gain is given in decibels; the linear gain is
/// `10^(dB/20)` and the RBJ shape parameter is its square root.
pub fn peak_coefficients(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> BiquadCoefficients {
    let freq = clamp_freq(freq, sample_rate);
    let q = q.clamp(MIN_Q, MAX_Q);

    if gain_db.abs() < 0.01 {
        return BiquadCoefficients::IDENTITY;
    }

    let a = db_to_lin(gain_db).sqrt();
    let w0 = 2.0 * PI * freq / sample_rate;
    let alpha = w0.sin() / (2.0 * q);
    let cw0 = w0.cos();

    let b0 = 1.0 + alpha * a;
    let b1 = -2.0 * cw0;
    let b2 = 1.0 - alpha * a;
    let a0 = 1.0 + alpha / a;
    let a1 = -2.0 * cw0;
    let a2 = 1.0 - alpha / a;

    let inv_a0 = 1.0 / a0;
    BiquadCoefficients {
        a0: b0 * inv_a0,
        a1: b1 * inv_a0,
        a2: b2 * inv_a0,
        b1: a1 * inv_a0,
        b2: a2 * inv_a0,
    }
}

/// Second-order Butterworth high-pass prototype for the low-cut ladder.
pub fn low_cut_coefficients(sample_rate: f32, freq: f32) -> BiquadCoefficients {
    let freq = clamp_freq(freq, sample_rate);
    let w0 = 2.0 * PI * freq / sample_rate;
    let alpha = w0.sin() / (2.0 * FRAC_1_SQRT_2);
    let cw0 = w0.cos();

    let a0 = 1.0 + alpha;
    let inv_a0 = 1.0 / a0;

    BiquadCoefficients {
        a0: ((1.0 + cw0) * 0.5) * inv_a0,
        a1: -(1.0 + cw0) * inv_a0,
        a2: ((1.0 + cw0) * 0.5) * inv_a0,
        b1: (-2.0 * cw0) * inv_a0,
        b2: (1.0 - alpha) * inv_a0,
    }
}

/// Second-order Butterworth low-pass prototype for the high-cut ladder.
pub fn high_cut_coefficients(sample_rate: f32, freq: f32) -> BiquadCoefficients {
    let freq = clamp_freq(freq, sample_rate);
    let w0 = 2.0 * PI * freq / sample_rate;
    let alpha = w0.sin() / (2.0 * FRAC_1_SQRT_2);
    let cw0 = w0.cos();

    let a0 = 1.0 + alpha;
    let inv_a0 = 1.0 / a0;

    BiquadCoefficients {
        a0: ((1.0 - cw0) * 0.5) * inv_a0,
        a1: (1.0 - cw0) * inv_a0,
        a2: ((1.0 - cw0) * 0.5) * inv_a0,
        b1: (-2.0 * cw0) * inv_a0,
        b2: (1.0 - alpha) * inv_a0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;

    fn assert_finite(c: &BiquadCoefficients) {
        assert!(c.a0.is_finite());
        assert!(c.a1.is_finite());
        assert!(c.a2.is_finite());
        assert!(c.b1.is_finite());
        assert!(c.b2.is_finite());
    }

    #[test]
    fn test_recomputation_is_bit_identical() {
        let first = peak_coefficients(SR, 1000.0, 1.0, 6.0);
        let second = peak_coefficients(SR, 1000.0, 1.0, 6.0);
        assert_eq!(first.a0.to_bits(), second.a0.to_bits());
        assert_eq!(first.a1.to_bits(), second.a1.to_bits());
        assert_eq!(first.a2.to_bits(), second.a2.to_bits());
        assert_eq!(first.b1.to_bits(), second.b1.to_bits());
        assert_eq!(first.b2.to_bits(), second.b2.to_bits());

        let cut_a = low_cut_coefficients(SR, 100.0);
        let cut_b = low_cut_coefficients(SR, 100.0);
        assert_eq!(cut_a.a0.to_bits(), cut_b.a0.to_bits());
        assert_eq!(cut_a.b2.to_bits(), cut_b.b2.to_bits());
    }

    #[test]
    fn test_peak_gain_at_center() {
        let c = peak_coefficients(SR, 1000.0, 1.0, 6.0);
        let db = c.magnitude_db_at(1000.0, SR);
        assert!((db - 6.0).abs() < 0.1, "center gain {db} dB");

        // One octave out the bell has come most of the way back down.
        let below = c.magnitude_db_at(500.0, SR);
        let above = c.magnitude_db_at(2000.0, SR);
        assert!(below < 3.0 && below > -0.5, "octave below {below} dB");
        assert!(above < 3.0 && above > -0.5, "octave above {above} dB");
    }

    #[test]
    fn test_peak_cut_is_symmetric() {
        let boost = peak_coefficients(SR, 750.0, 2.0, 12.0);
        let cut = peak_coefficients(SR, 750.0, 2.0, -12.0);
        let up = boost.magnitude_db_at(750.0, SR);
        let down = cut.magnitude_db_at(750.0, SR);
        assert!((up - 12.0).abs() < 0.1);
        assert!((down + 12.0).abs() < 0.1);
    }

    #[test]
    fn test_flat_gain_yields_identity() {
        let c = peak_coefficients(SR, 1000.0, 1.0, 0.0);
        assert_eq!(c, BiquadCoefficients::IDENTITY);
    }

    #[test]
    fn test_cut_prototypes_pass_and_stop() {
        let hp = low_cut_coefficients(SR, 100.0);
        assert!(hp.magnitude_db_at(1000.0, SR).abs() < 0.5);
        assert!(hp.magnitude_db_at(25.0, SR) < -20.0);

        let lp = high_cut_coefficients(SR, 10000.0);
        assert!(lp.magnitude_db_at(1000.0, SR).abs() < 0.5);
        assert!(lp.magnitude_db_at(20000.0, SR) < -10.0);
    }

    #[test]
    fn test_degenerate_inputs_stay_finite() {
        // At/above Nyquist, zero and absurd Q: clamped before the math.
        for c in [
            peak_coefficients(SR, 0.0, 0.0, 24.0),
            peak_coefficients(SR, 44100.0, 1000.0, -24.0),
            low_cut_coefficients(SR, -5.0),
            low_cut_coefficients(SR, 96000.0),
            high_cut_coefficients(SR, f32::MAX),
        ] {
            assert_finite(&c);
        }
    }
}
