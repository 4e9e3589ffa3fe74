//! Stereo feedback delay.
//!
//! Independent circular buffers per channel, sized once at prepare time for
//! the maximum delay; changing the delay time afterwards only moves the read
//! offset and never reallocates on the audio thread.

/// Declared range of the delay time parameter (ms).
pub const TIME_MIN_MS: f32 = 1.0;
pub const TIME_MAX_MS: f32 = 750.0;
/// Feedback is capped below unity so the tail always decays.
pub const FEEDBACK_MAX: f32 = 0.95;

struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    #[inline]
    fn read(&self, delay_samples: usize) -> f32 {
        let len = self.buffer.len();
        let pos = (self.write_pos + len - delay_samples.min(len - 1)) % len;
        self.buffer[pos]
    }

    #[inline]
    fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

pub struct StereoDelay {
    left: DelayLine,
    right: DelayLine,
    sample_rate: f32,
    delay_samples: usize,
}

impl StereoDelay {
    /// Buffers are sized for `TIME_MAX_MS`; call only at prepare time.
    pub fn new(sample_rate: f32) -> Self {
        let capacity = (sample_rate * TIME_MAX_MS / 1000.0).ceil() as usize + 1;
        Self {
            left: DelayLine::new(capacity),
            right: DelayLine::new(capacity),
            sample_rate,
            delay_samples: capacity - 1,
        }
    }

    pub fn set_time_ms(&mut self, time_ms: f32) {
        let time_ms = time_ms.clamp(TIME_MIN_MS, TIME_MAX_MS);
        let samples = (self.sample_rate * time_ms / 1000.0).round() as usize;
        self.delay_samples = samples.clamp(1, self.left.buffer.len() - 1);
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32, feedback: f32, mix: f32) -> (f32, f32) {
        let feedback = feedback.clamp(0.0, FEEDBACK_MAX);
        let mix = mix.clamp(0.0, 1.0);

        let delayed_l = self.left.read(self.delay_samples);
        let delayed_r = self.right.read(self.delay_samples);

        self.left.write(left + delayed_l * feedback);
        self.right.write(right + delayed_r * feedback);

        (
            left * (1.0 - mix) + delayed_l * mix,
            right * (1.0 - mix) + delayed_r * mix,
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

    const SR: f32 = 48000.0;

    #[test]
    fn test_impulse_arrives_after_delay_time() {
        let mut delay = StereoDelay::new(SR);
        delay.set_time_ms(100.0);
        let delay_samples = (SR * 0.1).round() as usize;

        let (first, _) = delay.process(1.0, 0.0, 0.0, 1.0);
        assert_eq!(first, 0.0, "fully wet output has no dry impulse");

        let mut echo_at = None;
        for n in 1..delay_samples * 2 {
            let (l, _) = delay.process(0.0, 0.0, 0.0, 1.0);
            if l.abs() > 0.5 {
                echo_at = Some(n);
                break;
            }
        }
        assert_eq!(echo_at, Some(delay_samples));
    }

    #[test]
    fn test_feedback_echoes_decay() {
        let mut delay = StereoDelay::new(SR);
        delay.set_time_ms(10.0);
        let period = (SR * 0.01).round() as usize;

        delay.process(1.0, 1.0, 0.5, 1.0);
        let mut echoes = Vec::new();
        for _ in 0..4 {
            for _ in 0..period - 1 {
                delay.process(0.0, 0.0, 0.5, 1.0);
            }
            let (l, _) = delay.process(0.0, 0.0, 0.5, 1.0);
            echoes.push(l.abs());
        }
        // Successive echoes shrink by the feedback factor.
        assert!((echoes[0] - 1.0).abs() < 1e-6);
        for pair in echoes.windows(2) {
            assert!((pair[1] / pair[0] - 0.5).abs() < 0.01);
        }
    }

    #[test]
    fn test_dry_mix_passes_input() {
        let mut delay = StereoDelay::new(SR);
        delay.set_time_ms(50.0);
        let (l, r) = delay.process(0.7, -0.3, 0.9, 0.0);
        assert_eq!((l, r), (0.7, -0.3));
    }

    #[test]
    fn test_reset_silences_tail() {
        let mut delay = StereoDelay::new(SR);
        delay.set_time_ms(5.0);
        for _ in 0..1024 {
            delay.process(1.0, 1.0, 0.9, 1.0);
        }
        delay.reset();
        for _ in 0..1024 {
            let (l, r) = delay.process(0.0, 0.0, 0.9, 1.0);
            assert_eq!((l, r), (0.0, 0.0));
        }
    }
}
