//! Metering and the post-chain analysis tap.
//!
//! Two one-way surfaces out of the audio thread, both copy-out: atomic peak
//! and gain-reduction meters, and a lock-free sample FIFO that feeds the
//! spectrum display. Observers only ever see copies of samples that already
//! left the chain; nothing here hands out an alias into live filter state.

use ringbuf::{Consumer, Producer, RingBuffer};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// FFT length of the spectrum display.
pub const SPECTRUM_FFT_SIZE: usize = 2048;

/// Thread-safe meter readouts shared between the audio thread and any
/// observer, stored as f32 bits in atomics.
#[derive(Default)]
pub struct Meters {
    input_peak_l: AtomicU32,
    input_peak_r: AtomicU32,
    output_peak_l: AtomicU32,
    output_peak_r: AtomicU32,
    comp_gain_reduction_db: AtomicU32,
}

impl Meters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input_peak_l(&self, val: f32) {
        self.input_peak_l.store(val.to_bits(), Ordering::Relaxed);
    }

    pub fn set_input_peak_r(&self, val: f32) {
        self.input_peak_r.store(val.to_bits(), Ordering::Relaxed);
    }

    pub fn set_output_peak_l(&self, val: f32) {
        self.output_peak_l.store(val.to_bits(), Ordering::Relaxed);
    }

    pub fn set_output_peak_r(&self, val: f32) {
        self.output_peak_r.store(val.to_bits(), Ordering::Relaxed);
    }

    pub fn set_comp_gain_reduction_db(&self, val: f32) {
        self.comp_gain_reduction_db
            .store(val.to_bits(), Ordering::Relaxed);
    }

    pub fn get_input_peak_l(&self) -> f32 {
        f32::from_bits(self.input_peak_l.load(Ordering::Relaxed))
    }

    pub fn get_input_peak_r(&self) -> f32 {
        f32::from_bits(self.input_peak_r.load(Ordering::Relaxed))
    }

    pub fn get_output_peak_l(&self) -> f32 {
        f32::from_bits(self.output_peak_l.load(Ordering::Relaxed))
    }

    pub fn get_output_peak_r(&self) -> f32 {
        f32::from_bits(self.output_peak_r.load(Ordering::Relaxed))
    }

    pub fn get_comp_gain_reduction_db(&self) -> f32 {
        f32::from_bits(self.comp_gain_reduction_db.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.set_input_peak_l(0.0);
        self.set_input_peak_r(0.0);
        self.set_output_peak_l(0.0);
        self.set_output_peak_r(0.0);
        self.set_comp_gain_reduction_db(0.0);
    }
}

/// Create the analysis tap pair. The producing half is written by the block
/// processor after the last stage; the consuming half belongs to whatever
/// visualizes the output.
pub fn analyzer_tap(capacity: usize) -> (AnalyzerTap, AnalyzerConsumer) {
    let (left_tx, left_rx) = RingBuffer::<f32>::new(capacity).split();
    let (right_tx, right_rx) = RingBuffer::<f32>::new(capacity).split();
    (
        AnalyzerTap {
            left: left_tx,
            right: right_tx,
        },
        AnalyzerConsumer {
            left: left_rx,
            right: right_rx,
        },
    )
}

/// Audio-thread half of the tap. Pushes never block; when the consumer falls
/// behind, samples are dropped rather than stalling the callback.
pub struct AnalyzerTap {
    left: Producer<f32>,
    right: Producer<f32>,
}

impl AnalyzerTap {
    #[inline]
    pub fn push(&mut self, left: f32, right: f32) {
        let _ = self.left.push(left);
        let _ = self.right.push(right);
    }
}

/// Observer half of the tap.
pub struct AnalyzerConsumer {
    left: Consumer<f32>,
    right: Consumer<f32>,
}

impl AnalyzerConsumer {
    /// Move every buffered sample into the caller's vectors.
    pub fn drain(&mut self, left: &mut Vec<f32>, right: &mut Vec<f32>) {
        while let Some(s) = self.left.pop() {
            left.push(s);
        }
        while let Some(s) = self.right.pop() {
            right.push(s);
        }
    }
}

/// Non-real-time spectrum computation over drained tap samples.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(SPECTRUM_FFT_SIZE);
        let window = (0..SPECTRUM_FFT_SIZE)
            .map(|n| {
                let x = n as f32 / (SPECTRUM_FFT_SIZE - 1) as f32;
                0.5 - 0.5 * (2.0 * std::f32::consts::PI * x).cos()
            })
            .collect();
        Self {
            fft,
            window,
            scratch: vec![Complex::new(0.0, 0.0); SPECTRUM_FFT_SIZE],
        }
    }

    /// Magnitude spectrum in dBFS over the most recent `SPECTRUM_FFT_SIZE`
    /// samples (zero-padded if fewer are available). Returns one value per
    /// bin up to Nyquist.
    pub fn magnitude_db(&mut self, samples: &[f32]) -> Vec<f32> {
        let take = samples.len().min(SPECTRUM_FFT_SIZE);
        let tail = &samples[samples.len() - take..];

        for slot in self.scratch.iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }
        for (i, &s) in tail.iter().enumerate() {
            self.scratch[i] = Complex::new(s * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let norm = 2.0 / SPECTRUM_FFT_SIZE as f32;
        self.scratch[..SPECTRUM_FFT_SIZE / 2]
            .iter()
            .map(|c| 20.0 * (c.norm() * norm).max(1e-9).log10())
            .collect()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_round_trip() {
        let meters = Meters::new();
        meters.set_input_peak_l(-6.5);
        meters.set_output_peak_r(-12.0);
        meters.set_comp_gain_reduction_db(3.25);
        assert_eq!(meters.get_input_peak_l(), -6.5);
        assert_eq!(meters.get_output_peak_r(), -12.0);
        assert_eq!(meters.get_comp_gain_reduction_db(), 3.25);
        meters.reset();
        assert_eq!(meters.get_comp_gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_tap_preserves_order_and_drops_overflow() {
        let (mut tap, mut rx) = analyzer_tap(4);
        for n in 0..8 {
            tap.push(n as f32, -(n as f32));
        }
        let mut left = Vec::new();
        let mut right = Vec::new();
        rx.drain(&mut left, &mut right);
        // Only the first `capacity` samples fit; the rest were dropped.
        assert_eq!(left, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(right, vec![0.0, -1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_spectrum_peaks_at_tone_bin() {
        let sr = 48000.0;
        let freq = sr / SPECTRUM_FFT_SIZE as f32 * 64.0; // exactly bin 64
        let samples: Vec<f32> = (0..SPECTRUM_FFT_SIZE)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / sr).sin())
            .collect();

        let mut analyzer = SpectrumAnalyzer::new();
        let spectrum = analyzer.magnitude_db(&samples);
        assert_eq!(spectrum.len(), SPECTRUM_FFT_SIZE / 2);

        let peak_bin = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 64);
        // A full-scale sine lands near 0 dBFS after Hann correction slack.
        assert!(spectrum[64] > -8.0 && spectrum[64] < 1.0);
    }
}
