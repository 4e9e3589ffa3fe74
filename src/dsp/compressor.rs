//! Stereo-linked downward compressor.
//!
//! Classic threshold/ratio design with a soft knee and a shared detector for
//! both channels, so gain never diverges between left and right. Parameters
//! arrive once per block from the settings sync; attack/release coefficients
//! are only recomputed when their times actually change.

use crate::dsp::utils::{db_to_lin, lin_to_db, time_constant_coeff, DB_EPS};

// Knee width around the threshold (dB).
const KNEE_DB: f32 = 6.0;
// Parameter bounds, matching the declared ranges.
const THRESHOLD_MIN_DB: f32 = -60.0;
const THRESHOLD_MAX_DB: f32 = 0.0;
const RATIO_MIN: f32 = 1.0;
const RATIO_MAX: f32 = 20.0;
const ATTACK_MIN_MS: f32 = 1.0;
const ATTACK_MAX_MS: f32 = 100.0;
const RELEASE_MIN_MS: f32 = 10.0;
const RELEASE_MAX_MS: f32 = 500.0;

pub struct StereoCompressor {
    sample_rate: f32,

    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    attack_coeff: f32,
    release_coeff: f32,

    // Linear detector envelope, stereo-linked via max(|l|, |r|)
    envelope: f32,
    gain_reduction_db: f32,
}

impl StereoCompressor {
    pub fn new(sample_rate: f32) -> Self {
        let mut comp = Self {
            sample_rate,
            threshold_db: -24.0,
            ratio: 4.0,
            attack_ms: 20.0,
            release_ms: 250.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            gain_reduction_db: 0.0,
        };
        comp.attack_coeff = time_constant_coeff(comp.attack_ms, sample_rate);
        comp.release_coeff = time_constant_coeff(comp.release_ms, sample_rate);
        comp
    }

    pub fn set_parameters(&mut self, threshold_db: f32, ratio: f32, attack_ms: f32, release_ms: f32) {
        self.threshold_db = threshold_db.clamp(THRESHOLD_MIN_DB, THRESHOLD_MAX_DB);
        self.ratio = ratio.clamp(RATIO_MIN, RATIO_MAX);

        let attack_ms = attack_ms.clamp(ATTACK_MIN_MS, ATTACK_MAX_MS);
        if attack_ms != self.attack_ms {
            self.attack_ms = attack_ms;
            self.attack_coeff = time_constant_coeff(attack_ms, self.sample_rate);
        }
        let release_ms = release_ms.clamp(RELEASE_MIN_MS, RELEASE_MAX_MS);
        if release_ms != self.release_ms {
            self.release_ms = release_ms;
            self.release_coeff = time_constant_coeff(release_ms, self.sample_rate);
        }
    }

    #[inline]
    fn soft_knee(over_db: f32, ratio: f32) -> f32 {
        let half = 0.5 * KNEE_DB;
        if over_db <= -half {
            0.0
        } else if over_db >= half {
            over_db * (1.0 - 1.0 / ratio)
        } else {
            let x = over_db + half;
            (x * x) / (2.0 * KNEE_DB) * (1.0 - 1.0 / ratio)
        }
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let detector = left.abs().max(right.abs());

        let coeff = if detector > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * detector;

        let level_db = lin_to_db(self.envelope.max(DB_EPS));
        let reduction_db = Self::soft_knee(level_db - self.threshold_db, self.ratio);
        self.gain_reduction_db = reduction_db;

        let gain = db_to_lin(-reduction_db);
        (left * gain, right * gain)
    }

    pub fn get_gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.gain_reduction_db = 0.0;
    }
}
