//! Parameter store: the single shared-mutable surface between the audio
//! thread, the host's automation, and the assistant bridge.
//!
//! Every parameter has a stable string key (the same identifiers the chat
//! collaborator and saved state use), a declared kind/range, and a default.
//! Values live in `AtomicU32` as f32 bits, so the audio thread reads with
//! plain atomic loads and writers on any thread commit with a single store —
//! no locks anywhere near the realtime path. Writes are clamped to the
//! declared range before they are committed; the per-block settings snapshot
//! is the only consumer on the audio side, so a write becomes audible at the
//! start of the next block, never mid-block.

use nih_plug::params::persist::PersistentField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Labels for the slope choice parameters, index-aligned with
/// [`crate::dsp::Slope`].
pub const SLOPE_LABELS: &[&str] = &["12", "24", "36", "48"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Float { min: f32, max: f32 },
    Choice { labels: &'static [&'static str] },
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub default: f32,
}

impl ParamSpec {
    /// Clamp a requested value into this parameter's valid domain.
    pub fn clamp(&self, value: f32) -> f32 {
        let value = if value.is_finite() { value } else { self.default };
        match self.kind {
            ParamKind::Float { min, max } => value.clamp(min, max),
            ParamKind::Choice { labels } => {
                value.round().clamp(0.0, (labels.len() - 1) as f32)
            }
            ParamKind::Toggle => {
                if value > 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

macro_rules! define_params {
    ($(($variant:ident, $key:literal, $kind:expr, $default:expr)),+ $(,)?) => {
        /// Every parameter the plugin owns, identified by its stable key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum ParamId {
            $($variant),+
        }

        impl ParamId {
            pub const ALL: &'static [ParamId] = &[$(ParamId::$variant),+];

            /// The stable external identifier.
            pub fn key(self) -> &'static str {
                match self {
                    $(ParamId::$variant => $key),+
                }
            }

            pub fn spec(self) -> ParamSpec {
                match self {
                    $(ParamId::$variant => ParamSpec { kind: $kind, default: $default }),+
                }
            }

            pub fn from_key(key: &str) -> Option<ParamId> {
                match key {
                    $($key => Some(ParamId::$variant),)+
                    _ => None,
                }
            }

            #[inline]
            fn index(self) -> usize {
                self as usize
            }
        }
    };
}

define_params![
    (LowCutFreq, "LowCut Freq", ParamKind::Float { min: 20.0, max: 20000.0 }, 20.0),
    (LowCutSlope, "LowCut Slope", ParamKind::Choice { labels: SLOPE_LABELS }, 0.0),
    (LowCutBypassed, "LowCut Bypassed", ParamKind::Toggle, 0.0),
    (PeakFreq, "Peak Freq", ParamKind::Float { min: 20.0, max: 20000.0 }, 750.0),
    (PeakGain, "Peak Gain", ParamKind::Float { min: -24.0, max: 24.0 }, 0.0),
    (PeakQuality, "Peak Quality", ParamKind::Float { min: 0.1, max: 10.0 }, 1.0),
    (PeakBypassed, "Peak Bypassed", ParamKind::Toggle, 0.0),
    (HighCutFreq, "HighCut Freq", ParamKind::Float { min: 20.0, max: 20000.0 }, 20000.0),
    (HighCutSlope, "HighCut Slope", ParamKind::Choice { labels: SLOPE_LABELS }, 0.0),
    (HighCutBypassed, "HighCut Bypassed", ParamKind::Toggle, 0.0),
    (AnalyzerEnabled, "Analyzer Enabled", ParamKind::Toggle, 1.0),
    (CompThreshold, "Comp Threshold", ParamKind::Float { min: -60.0, max: 0.0 }, -24.0),
    (CompRatio, "Comp Ratio", ParamKind::Float { min: 1.0, max: 20.0 }, 4.0),
    (CompAttack, "Comp Attack", ParamKind::Float { min: 1.0, max: 100.0 }, 20.0),
    (CompRelease, "Comp Release", ParamKind::Float { min: 10.0, max: 500.0 }, 250.0),
    (CompBypassed, "Comp Bypassed", ParamKind::Toggle, 0.0),
    (DistortionAmount, "Distortion Amount", ParamKind::Float { min: 1.0, max: 10.0 }, 1.0),
    (DistortionBypassed, "Distortion Bypassed", ParamKind::Toggle, 0.0),
    (DelayTime, "Delay Time", ParamKind::Float { min: 1.0, max: 750.0 }, 500.0),
    (DelayFeedback, "Delay Feedback", ParamKind::Float { min: 0.0, max: 0.95 }, 0.5),
    (DelayMix, "Delay Mix", ParamKind::Float { min: 0.0, max: 1.0 }, 0.3),
    (DelayBypassed, "Delay Bypassed", ParamKind::Toggle, 0.0),
    (ReverbSize, "Reverb Size", ParamKind::Float { min: 0.0, max: 1.0 }, 0.5),
    (ReverbDecay, "Reverb Decay", ParamKind::Float { min: 0.1, max: 10.0 }, 1.0),
    (ReverbMix, "Reverb Mix", ParamKind::Float { min: 0.0, max: 1.0 }, 0.3),
    (ReverbBypassed, "Reverb Bypassed", ParamKind::Toggle, 0.0),
];

const PARAM_COUNT: usize = ParamId::ALL.len();

/// Serialized snapshot of every current value, keyed by stable identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    pub values: BTreeMap<String, f32>,
}

pub struct ParameterStore {
    values: [AtomicU32; PARAM_COUNT],
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| {
                AtomicU32::new(ParamId::ALL[i].spec().default.to_bits())
            }),
        }
    }

    /// Lock-free read of the current value. Safe from the audio thread.
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn get_bool(&self, id: ParamId) -> bool {
        self.get(id) > 0.5
    }

    #[inline]
    pub fn get_choice(&self, id: ParamId) -> usize {
        self.get(id).max(0.0) as usize
    }

    /// Lock-free write. The value is clamped to the declared range first;
    /// out-of-range input is a caller mistake we absorb, not an error.
    #[inline]
    pub fn set(&self, id: ParamId, value: f32) {
        let clamped = id.spec().clamp(value);
        self.values[id.index()].store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Snapshot every current value.
    pub fn state(&self) -> StoreState {
        let values = ParamId::ALL
            .iter()
            .map(|&id| (id.key().to_string(), self.get(id)))
            .collect();
        StoreState { values }
    }

    /// Restore a snapshot. Unknown keys are skipped, values are clamped;
    /// parameters missing from the snapshot keep their current value.
    pub fn load_state(&self, state: &StoreState) {
        for (key, &value) in &state.values {
            match ParamId::from_key(key) {
                Some(id) => self.set(id, value),
                None => log::warn!("ignoring unknown parameter '{key}' in saved state"),
            }
        }
    }
}

// Host-side persistence: the store snapshot rides along in the plugin state
// the same way nih_plug_vizia persists its Arc<ViziaState>. Host parameters
// are saved by nih_plug itself; if the assistant moved a value after the
// last host gesture, this snapshot is the authoritative copy on load.
impl<'a> PersistentField<'a, StoreState> for Arc<ParameterStore> {
    fn set(&self, new_value: StoreState) {
        self.load_state(&new_value);
    }

    fn map<F, R>(&self, f: F) -> R
    where
        F: Fn(&StoreState) -> R,
    {
        f(&self.state())
    }
}
