//! Freeverb-style reverb: parallel damped combs into series allpasses.
//!
//! Per-channel filter banks with the classic stereo spread on the right
//! channel. Buffer lengths are derived from the 44.1 kHz reference tunings
//! and rescaled at prepare time; nothing allocates per block.

/// Comb delays at the 44.1 kHz reference rate.
const COMB_TUNINGS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
/// Allpass delays at the 44.1 kHz reference rate.
const ALLPASS_TUNINGS: [usize; 4] = [556, 441, 341, 225];
/// Right-channel offset in samples.
const STEREO_SPREAD: usize = 23;
const REFERENCE_RATE: f32 = 44100.0;

const FIXED_GAIN: f32 = 0.015;
const ALLPASS_FEEDBACK: f32 = 0.5;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;

/// Declared range of the decay parameter (seconds-ish control, mapped to
/// damping the same way the plugin always has: decay / 10, clamped to 0..1).
pub const DECAY_MIN: f32 = 0.1;
pub const DECAY_MAX: f32 = 10.0;

struct Comb {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
            filter_store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.index];
        self.filter_store = output * (1.0 - damp) + self.filter_store * damp;
        self.buffer[self.index] = input + self.filter_store * feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_store = 0.0;
        self.index = 0;
    }
}

struct Allpass {
    buffer: Vec<f32>,
    index: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        self.buffer[self.index] = input + buffered * ALLPASS_FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        buffered - input
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

struct ReverbChannel {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl ReverbChannel {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = sample_rate / REFERENCE_RATE;
        let combs = COMB_TUNINGS
            .iter()
            .map(|&len| Comb::new(((len + spread) as f32 * scale) as usize))
            .collect();
        let allpasses = ALLPASS_TUNINGS
            .iter()
            .map(|&len| Allpass::new(((len + spread) as f32 * scale) as usize))
            .collect();
        Self { combs, allpasses }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let driven = input * FIXED_GAIN;
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(driven, feedback, damp);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }

    fn clear(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for allpass in &mut self.allpasses {
            allpass.clear();
        }
    }
}

pub struct StereoReverb {
    left: ReverbChannel,
    right: ReverbChannel,
    feedback: f32,
    damp: f32,
}

impl StereoReverb {
    /// Allocates the filter banks; call only at prepare time.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: ReverbChannel::new(sample_rate, 0),
            right: ReverbChannel::new(sample_rate, STEREO_SPREAD),
            feedback: ROOM_OFFSET + 0.5 * ROOM_SCALE,
            damp: DAMP_SCALE * 0.1,
        }
    }

    /// Room size 0..1 and decay 0.1..10 map onto comb feedback and damping.
    pub fn set_parameters(&mut self, size: f32, decay: f32) {
        let size = size.clamp(0.0, 1.0);
        let decay = decay.clamp(DECAY_MIN, DECAY_MAX);
        self.feedback = ROOM_OFFSET + ROOM_SCALE * size;
        self.damp = DAMP_SCALE * (decay / DECAY_MAX).clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32, mix: f32) -> (f32, f32) {
        let mix = mix.clamp(0.0, 1.0);
        let wet_l = self.left.process(left, self.feedback, self.damp);
        let wet_r = self.right.process(right, self.feedback, self.damp);
        (
            left * (1.0 - mix) + wet_l * mix,
            right * (1.0 - mix) + wet_r * mix,
        )
    }

    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;

    #[test]
    fn test_impulse_grows_a_tail() {
        let mut reverb = StereoReverb::new(SR);
        reverb.set_parameters(0.8, 2.0);
        reverb.process(1.0, 1.0, 1.0);

        let mut energy = 0.0f32;
        for _ in 0..(SR as usize / 2) {
            let (l, r) = reverb.process(0.0, 0.0, 1.0);
            energy += l.abs() + r.abs();
        }
        assert!(energy > 0.1, "tail energy {energy}");
    }

    #[test]
    fn test_larger_room_rings_longer() {
        let mut small = StereoReverb::new(SR);
        let mut large = StereoReverb::new(SR);
        small.set_parameters(0.0, 1.0);
        large.set_parameters(1.0, 1.0);

        small.process(1.0, 1.0, 1.0);
        large.process(1.0, 1.0, 1.0);

        // Skip the early reflections, compare late-tail energy.
        let mut tail_small = 0.0f32;
        let mut tail_large = 0.0f32;
        for n in 0..(SR as usize) {
            let (sl, _) = small.process(0.0, 0.0, 1.0);
            let (ll, _) = large.process(0.0, 0.0, 1.0);
            if n > SR as usize / 2 {
                tail_small += sl.abs();
                tail_large += ll.abs();
            }
        }
        assert!(tail_large > tail_small);
    }

    #[test]
    fn test_dry_mix_passes_input() {
        let mut reverb = StereoReverb::new(SR);
        let (l, r) = reverb.process(0.6, -0.2, 0.0);
        assert_eq!((l, r), (0.6, -0.2));
    }

    #[test]
    fn test_reset_silences_tail() {
        let mut reverb = StereoReverb::new(SR);
        reverb.set_parameters(1.0, 1.0);
        for _ in 0..4096 {
            reverb.process(1.0, -1.0, 1.0);
        }
        reverb.reset();
        let (l, r) = reverb.process(0.0, 0.0, 1.0);
        assert_eq!((l, r), (0.0, 0.0));
    }
}
