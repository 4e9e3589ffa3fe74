//! Variable-order cut filter: up to four cascaded second-order sections.
//!
//! Each active section contributes 12 dB/octave, so the selectable slopes
//! map directly onto how many sections run. Sections past the active count
//! keep whatever coefficients they last had; they are simply skipped, so
//! re-enabling a steeper slope never starts from garbage state.

use crate::dsp::biquad::Biquad;
use crate::dsp::coefficients::BiquadCoefficients;
use nih_plug::prelude::Enum;

/// Number of cascaded sections available per cut filter.
pub const MAX_CUT_STAGES: usize = 4;

/// Cut-filter steepness in dB/octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum Slope {
    #[name = "12 dB/Oct"]
    Db12,
    #[name = "24 dB/Oct"]
    Db24,
    #[name = "36 dB/Oct"]
    Db36,
    #[name = "48 dB/Oct"]
    Db48,
}

impl Default for Slope {
    fn default() -> Self {
        Slope::Db12
    }
}

impl Slope {
    /// Number of second-order sections this slope enables.
    #[inline]
    pub fn stages(self) -> usize {
        match self {
            Slope::Db12 => 1,
            Slope::Db24 => 2,
            Slope::Db36 => 3,
            Slope::Db48 => 4,
        }
    }

    #[inline]
    pub fn db_per_octave(self) -> u32 {
        12 * self.stages() as u32
    }

    #[inline]
    pub fn index(self) -> usize {
        self.stages() - 1
    }

    /// Choice index → slope, clamping out-of-range indices.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Slope::Db12,
            1 => Slope::Db24,
            2 => Slope::Db36,
            _ => Slope::Db48,
        }
    }
}

/// Cascade of identical second-order sections realizing one cut filter.
pub struct CutFilterLadder {
    stages: [Biquad; MAX_CUT_STAGES],
    active: usize,
    bypassed: bool,
}

impl Default for CutFilterLadder {
    fn default() -> Self {
        Self::new()
    }
}

impl CutFilterLadder {
    pub fn new() -> Self {
        Self {
            stages: [Biquad::new(); MAX_CUT_STAGES],
            active: 1,
            bypassed: false,
        }
    }

    /// Install `coeffs` into the first `slope.stages()` sections and mark the
    /// rest inactive. Inactive sections keep their previous coefficients.
    pub fn configure(&mut self, coeffs: BiquadCoefficients, slope: Slope) {
        let active = slope.stages();
        for stage in &mut self.stages[..active] {
            stage.set_coefficients(coeffs);
        }
        self.active = active;
    }

    #[inline]
    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    #[inline]
    pub fn active_stages(&self) -> usize {
        self.active
    }

    /// Coefficients of the section at `index`, active or not.
    pub fn stage_coefficients(&self, index: usize) -> BiquadCoefficients {
        self.stages[index].coefficients()
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        if self.bypassed {
            return sample;
        }
        let mut s = sample;
        for stage in &mut self.stages[..self.active] {
            s = stage.process(s);
        }
        s
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::coefficients::low_cut_coefficients;

    const SR: f32 = 44100.0;

    #[test]
    fn test_stage_count_follows_slope() {
        let mut ladder = CutFilterLadder::new();
        let coeffs = low_cut_coefficients(SR, 100.0);
        for (slope, expected) in [
            (Slope::Db12, 1),
            (Slope::Db24, 2),
            (Slope::Db36, 3),
            (Slope::Db48, 4),
        ] {
            ladder.configure(coeffs, slope);
            assert_eq!(ladder.active_stages(), expected);
        }
    }

    #[test]
    fn test_inactive_stages_keep_coefficients() {
        let mut ladder = CutFilterLadder::new();
        let wide = low_cut_coefficients(SR, 100.0);
        let narrow = low_cut_coefficients(SR, 500.0);

        ladder.configure(wide, Slope::Db48);
        ladder.configure(narrow, Slope::Db12);

        // Stage 0 was rewritten, stages 1..4 still hold the 100 Hz design.
        assert_eq!(ladder.stage_coefficients(0), narrow);
        for i in 1..MAX_CUT_STAGES {
            assert_eq!(ladder.stage_coefficients(i), wide);
        }
    }

    #[test]
    fn test_48db_slope_attenuation_two_octaves_down() {
        // Cascade response is the product of the section responses. Two
        // octaves below a 100 Hz cutoff the ideal asymptote is ~96 dB down;
        // allow slack for cascade interaction near the knee.
        let coeffs = low_cut_coefficients(SR, 100.0);
        let mut db = 0.0;
        for _ in 0..Slope::Db48.stages() {
            db += coeffs.magnitude_db_at(25.0, SR);
        }
        assert!(db < -80.0, "attenuation at 25 Hz was {db} dB");
        assert!(db > -110.0, "attenuation at 25 Hz was {db} dB");
    }

    #[test]
    fn test_bypass_is_identity() {
        let mut ladder = CutFilterLadder::new();
        ladder.configure(low_cut_coefficients(SR, 1000.0), Slope::Db48);
        ladder.set_bypassed(true);
        for x in [0.9f32, -0.4, 0.0, 0.123] {
            assert_eq!(ladder.process(x), x);
        }
    }

    #[test]
    fn test_steeper_slope_attenuates_more() {
        let coeffs = low_cut_coefficients(SR, 200.0);
        let mut prev = f32::MAX;
        for slope in [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48] {
            let mut ladder = CutFilterLadder::new();
            ladder.configure(coeffs, slope);
            // Drive with a 50 Hz sine and measure steady-state peak.
            let mut peak = 0.0f32;
            for n in 0..(SR as usize) {
                let x = (2.0 * std::f32::consts::PI * 50.0 * n as f32 / SR).sin();
                let y = ladder.process(x);
                if n > SR as usize / 2 {
                    peak = peak.max(y.abs());
                }
            }
            assert!(peak < prev, "slope {:?} did not attenuate more", slope);
            prev = peak;
        }
    }
}
