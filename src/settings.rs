//! Per-block settings snapshots.
//!
//! The settings synchronizer reads the parameter store exactly once per
//! block into these plain structs; everything downstream (coefficient
//! rebuild, bypass gating, effect configuration) consumes the snapshot, so
//! related parameters can only change together at block boundaries.

use crate::dsp::Slope;
use crate::store::{ParamId, ParameterStore};

/// Every stage of the fixed processing chain, in audible order. The block
/// processor matches over this exhaustively; reordering the chain is a
/// deliberate, visible edit here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    LowCut,
    Peak,
    HighCut,
    Compressor,
    Distortion,
    Delay,
    Reverb,
}

/// The post-EQ effects in processing order. The three EQ stages run inside
/// [`crate::dsp::ChannelChain`], which hard-codes their relative order.
pub const EFFECT_ORDER: [StageKind; 4] = [
    StageKind::Compressor,
    StageKind::Distortion,
    StageKind::Delay,
    StageKind::Reverb,
];

/// EQ portion of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
    pub low_cut_bypassed: bool,
    pub peak_bypassed: bool,
    pub high_cut_bypassed: bool,
}

impl ChainSettings {
    pub fn from_store(store: &ParameterStore) -> Self {
        Self {
            low_cut_freq: store.get(ParamId::LowCutFreq),
            high_cut_freq: store.get(ParamId::HighCutFreq),
            peak_freq: store.get(ParamId::PeakFreq),
            peak_gain_db: store.get(ParamId::PeakGain),
            peak_quality: store.get(ParamId::PeakQuality),
            low_cut_slope: Slope::from_index(store.get_choice(ParamId::LowCutSlope)),
            high_cut_slope: Slope::from_index(store.get_choice(ParamId::HighCutSlope)),
            low_cut_bypassed: store.get_bool(ParamId::LowCutBypassed),
            peak_bypassed: store.get_bool(ParamId::PeakBypassed),
            high_cut_bypassed: store.get_bool(ParamId::HighCutBypassed),
        }
    }
}

/// Post-EQ effect portion of the snapshot. Bypass flags are read here, once,
/// at block start; the block processor never re-reads them mid-block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectSettings {
    pub comp_threshold_db: f32,
    pub comp_ratio: f32,
    pub comp_attack_ms: f32,
    pub comp_release_ms: f32,
    pub comp_bypassed: bool,

    pub distortion_amount: f32,
    pub distortion_bypassed: bool,

    pub delay_time_ms: f32,
    pub delay_feedback: f32,
    pub delay_mix: f32,
    pub delay_bypassed: bool,

    pub reverb_size: f32,
    pub reverb_decay: f32,
    pub reverb_mix: f32,
    pub reverb_bypassed: bool,

    pub analyzer_enabled: bool,
}

impl EffectSettings {
    pub fn from_store(store: &ParameterStore) -> Self {
        Self {
            comp_threshold_db: store.get(ParamId::CompThreshold),
            comp_ratio: store.get(ParamId::CompRatio),
            comp_attack_ms: store.get(ParamId::CompAttack),
            comp_release_ms: store.get(ParamId::CompRelease),
            comp_bypassed: store.get_bool(ParamId::CompBypassed),

            distortion_amount: store.get(ParamId::DistortionAmount),
            distortion_bypassed: store.get_bool(ParamId::DistortionBypassed),

            delay_time_ms: store.get(ParamId::DelayTime),
            delay_feedback: store.get(ParamId::DelayFeedback),
            delay_mix: store.get(ParamId::DelayMix),
            delay_bypassed: store.get_bool(ParamId::DelayBypassed),

            reverb_size: store.get(ParamId::ReverbSize),
            reverb_decay: store.get(ParamId::ReverbDecay),
            reverb_mix: store.get(ParamId::ReverbMix),
            reverb_bypassed: store.get_bool(ParamId::ReverbBypassed),

            analyzer_enabled: store.get_bool(ParamId::AnalyzerEnabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_store() {
        let store = ParameterStore::new();
        store.set(ParamId::LowCutFreq, 120.0);
        store.set(ParamId::LowCutSlope, 3.0);
        store.set(ParamId::PeakGain, 6.0);
        store.set(ParamId::PeakBypassed, 1.0);

        let settings = ChainSettings::from_store(&store);
        assert_eq!(settings.low_cut_freq, 120.0);
        assert_eq!(settings.low_cut_slope, Slope::Db48);
        assert_eq!(settings.peak_gain_db, 6.0);
        assert!(settings.peak_bypassed);
        assert!(!settings.low_cut_bypassed);
    }

    #[test]
    fn test_snapshot_is_detached_from_store() {
        let store = ParameterStore::new();
        let settings = ChainSettings::from_store(&store);
        store.set(ParamId::PeakFreq, 5000.0);
        // The snapshot keeps the value it was built from.
        assert_eq!(settings.peak_freq, 750.0);
    }

    #[test]
    fn test_effect_snapshot_defaults() {
        let store = ParameterStore::new();
        let fx = EffectSettings::from_store(&store);
        assert_eq!(fx.comp_threshold_db, -24.0);
        assert_eq!(fx.comp_ratio, 4.0);
        assert_eq!(fx.delay_time_ms, 500.0);
        assert!(!fx.reverb_bypassed);
        assert!(fx.analyzer_enabled);
    }

    #[test]
    fn test_effect_order_is_fixed() {
        assert_eq!(
            EFFECT_ORDER,
            [
                StageKind::Compressor,
                StageKind::Distortion,
                StageKind::Delay,
                StageKind::Reverb,
            ]
        );
    }
}
