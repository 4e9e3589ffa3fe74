pub mod analyzer;
pub mod assistant;
mod debug;
pub mod dsp;
pub mod settings;
pub mod store;

use crate::analyzer::{analyzer_tap, AnalyzerConsumer, AnalyzerTap, Meters, SPECTRUM_FFT_SIZE};
use crate::assistant::{patch_queue, AssistantBridge, PatchConsumer};
use crate::dsp::coefficients::{high_cut_coefficients, low_cut_coefficients, peak_coefficients};
use crate::dsp::distortion::waveshape;
use crate::dsp::utils::lin_to_db;
use crate::dsp::{ChannelChain, Slope, StereoCompressor, StereoDelay, StereoReverb};
use crate::settings::{ChainSettings, EffectSettings, StageKind, EFFECT_ORDER};
use crate::store::{ParamId, ParameterStore};
use assert_no_alloc::permit_alloc;
use nih_plug::prelude::*;
use std::sync::Arc;

const DEFAULT_SAMPLE_RATE: f32 = 44100.0;
// Headroom over the FFT size so the display can fall behind a little before
// the tap starts dropping samples.
const ANALYZER_TAP_CAPACITY: usize = SPECTRUM_FFT_SIZE * 4;

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------

// Host-facing mirror of the parameter store. Every control the DAW automates
// is declared here; its callback forwards the new value into the store, so
// host gestures and assistant patches land in the same place and the audio
// thread only ever reads the store.
#[derive(Params)]
pub struct GenreGenieParams {
    /// The canonical values, persisted with the plugin state so that a
    /// restored session reproduces the exact chain configuration.
    #[persist = "parameter-store"]
    pub store: Arc<ParameterStore>,

    #[id = "low_cut_freq"]
    pub low_cut_freq: FloatParam,
    #[id = "low_cut_slope"]
    pub low_cut_slope: EnumParam<Slope>,
    #[id = "low_cut_bypassed"]
    pub low_cut_bypassed: BoolParam,

    #[id = "peak_freq"]
    pub peak_freq: FloatParam,
    #[id = "peak_gain"]
    pub peak_gain: FloatParam,
    #[id = "peak_quality"]
    pub peak_quality: FloatParam,
    #[id = "peak_bypassed"]
    pub peak_bypassed: BoolParam,

    #[id = "high_cut_freq"]
    pub high_cut_freq: FloatParam,
    #[id = "high_cut_slope"]
    pub high_cut_slope: EnumParam<Slope>,
    #[id = "high_cut_bypassed"]
    pub high_cut_bypassed: BoolParam,

    #[id = "analyzer_enabled"]
    pub analyzer_enabled: BoolParam,

    #[id = "comp_threshold"]
    pub comp_threshold: FloatParam,
    #[id = "comp_ratio"]
    pub comp_ratio: FloatParam,
    #[id = "comp_attack"]
    pub comp_attack: FloatParam,
    #[id = "comp_release"]
    pub comp_release: FloatParam,
    #[id = "comp_bypassed"]
    pub comp_bypassed: BoolParam,

    #[id = "distortion_amount"]
    pub distortion_amount: FloatParam,
    #[id = "distortion_bypassed"]
    pub distortion_bypassed: BoolParam,

    #[id = "delay_time"]
    pub delay_time: FloatParam,
    #[id = "delay_feedback"]
    pub delay_feedback: FloatParam,
    #[id = "delay_mix"]
    pub delay_mix: FloatParam,
    #[id = "delay_bypassed"]
    pub delay_bypassed: BoolParam,

    #[id = "reverb_size"]
    pub reverb_size: FloatParam,
    #[id = "reverb_decay"]
    pub reverb_decay: FloatParam,
    #[id = "reverb_mix"]
    pub reverb_mix: FloatParam,
    #[id = "reverb_bypassed"]
    pub reverb_bypassed: BoolParam,
}

// Helpers to format values for the DAW display
fn format_hz(v: f32) -> String {
    if v >= 1000.0 {
        format!("{:.2} kHz", v / 1000.0)
    } else {
        format!("{:.1} Hz", v)
    }
}

fn format_db(v: f32) -> String {
    format!("{:.1} dB", v)
}

fn format_ms(v: f32) -> String {
    format!("{:.0} ms", v)
}

fn format_ratio(v: f32) -> String {
    format!("{:.1}:1", v)
}

fn format_percent(v: f32) -> String {
    format!("{:.0}%", v * 100.0)
}

fn format_plain(v: f32) -> String {
    format!("{:.2}", v)
}

fn format_seconds(v: f32) -> String {
    format!("{:.1} s", v)
}

/// Linear host range taken from the store's declared bounds.
fn linear_range(id: ParamId) -> FloatRange {
    match id.spec().kind {
        store::ParamKind::Float { min, max } => FloatRange::Linear { min, max },
        _ => FloatRange::Linear { min: 0.0, max: 1.0 },
    }
}

/// Skewed range for the frequency controls so knob travel feels
/// logarithmic across the audible band.
fn freq_range(id: ParamId) -> FloatRange {
    match id.spec().kind {
        store::ParamKind::Float { min, max } => FloatRange::Skewed {
            min,
            max,
            factor: FloatRange::skew_factor(-2.0),
        },
        _ => FloatRange::Linear { min: 0.0, max: 1.0 },
    }
}

fn linked_float(store: &Arc<ParameterStore>, id: ParamId, range: FloatRange) -> FloatParam {
    let store = store.clone();
    FloatParam::new(id.key(), id.spec().default, range)
        .with_callback(Arc::new(move |v| store.set(id, v)))
}

fn linked_bool(store: &Arc<ParameterStore>, id: ParamId) -> BoolParam {
    let store = store.clone();
    BoolParam::new(id.key(), id.spec().default > 0.5)
        .with_callback(Arc::new(move |v| store.set(id, if v { 1.0 } else { 0.0 })))
}

fn linked_slope(store: &Arc<ParameterStore>, id: ParamId) -> EnumParam<Slope> {
    let store = store.clone();
    EnumParam::new(id.key(), Slope::from_index(id.spec().default as usize))
        .with_callback(Arc::new(move |s: Slope| store.set(id, s.index() as f32)))
}

impl GenreGenieParams {
    pub fn new(store: &Arc<ParameterStore>) -> Self {
        Self {
            low_cut_freq: linked_float(store, ParamId::LowCutFreq, freq_range(ParamId::LowCutFreq))
                .with_value_to_string(Arc::new(format_hz)),
            low_cut_slope: linked_slope(store, ParamId::LowCutSlope),
            low_cut_bypassed: linked_bool(store, ParamId::LowCutBypassed),

            peak_freq: linked_float(store, ParamId::PeakFreq, freq_range(ParamId::PeakFreq))
                .with_value_to_string(Arc::new(format_hz)),
            peak_gain: linked_float(store, ParamId::PeakGain, linear_range(ParamId::PeakGain))
                .with_value_to_string(Arc::new(format_db)),
            peak_quality: linked_float(
                store,
                ParamId::PeakQuality,
                linear_range(ParamId::PeakQuality),
            )
            .with_value_to_string(Arc::new(format_plain)),
            peak_bypassed: linked_bool(store, ParamId::PeakBypassed),

            high_cut_freq: linked_float(
                store,
                ParamId::HighCutFreq,
                freq_range(ParamId::HighCutFreq),
            )
            .with_value_to_string(Arc::new(format_hz)),
            high_cut_slope: linked_slope(store, ParamId::HighCutSlope),
            high_cut_bypassed: linked_bool(store, ParamId::HighCutBypassed),

            analyzer_enabled: linked_bool(store, ParamId::AnalyzerEnabled),

            comp_threshold: linked_float(
                store,
                ParamId::CompThreshold,
                linear_range(ParamId::CompThreshold),
            )
            .with_value_to_string(Arc::new(format_db)),
            comp_ratio: linked_float(store, ParamId::CompRatio, linear_range(ParamId::CompRatio))
                .with_value_to_string(Arc::new(format_ratio)),
            comp_attack: linked_float(store, ParamId::CompAttack, linear_range(ParamId::CompAttack))
                .with_value_to_string(Arc::new(format_ms)),
            comp_release: linked_float(
                store,
                ParamId::CompRelease,
                linear_range(ParamId::CompRelease),
            )
            .with_value_to_string(Arc::new(format_ms)),
            comp_bypassed: linked_bool(store, ParamId::CompBypassed),

            distortion_amount: linked_float(
                store,
                ParamId::DistortionAmount,
                linear_range(ParamId::DistortionAmount),
            )
            .with_value_to_string(Arc::new(format_plain)),
            distortion_bypassed: linked_bool(store, ParamId::DistortionBypassed),

            delay_time: linked_float(store, ParamId::DelayTime, linear_range(ParamId::DelayTime))
                .with_value_to_string(Arc::new(format_ms)),
            delay_feedback: linked_float(
                store,
                ParamId::DelayFeedback,
                linear_range(ParamId::DelayFeedback),
            )
            .with_value_to_string(Arc::new(format_plain)),
            delay_mix: linked_float(store, ParamId::DelayMix, linear_range(ParamId::DelayMix))
                .with_value_to_string(Arc::new(format_percent)),
            delay_bypassed: linked_bool(store, ParamId::DelayBypassed),

            reverb_size: linked_float(store, ParamId::ReverbSize, linear_range(ParamId::ReverbSize))
                .with_value_to_string(Arc::new(format_plain)),
            reverb_decay: linked_float(
                store,
                ParamId::ReverbDecay,
                linear_range(ParamId::ReverbDecay),
            )
            .with_value_to_string(Arc::new(format_seconds)),
            reverb_mix: linked_float(store, ParamId::ReverbMix, linear_range(ParamId::ReverbMix))
                .with_value_to_string(Arc::new(format_percent)),
            reverb_bypassed: linked_bool(store, ParamId::ReverbBypassed),

            store: store.clone(),
        }
    }
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------
pub struct GenreGenie {
    params: Arc<GenreGenieParams>,
    store: Arc<ParameterStore>,

    // Assistant bridge: the consuming half stays here and is drained at
    // block start; the producing half is handed to the chat worker.
    patch_rx: PatchConsumer,
    assistant_bridge: Option<AssistantBridge>,

    // EQ, one chain per channel, configured in lock-step
    chain_l: ChannelChain,
    chain_r: ChannelChain,

    // Post-EQ effect stages
    compressor: StereoCompressor,
    delay: StereoDelay,
    reverb: StereoReverb,

    // Observer surfaces
    meters: Arc<Meters>,
    analyzer_tx: AnalyzerTap,
    analyzer_rx: Option<AnalyzerConsumer>,

    sample_rate: f32,
}

impl Default for GenreGenie {
    fn default() -> Self {
        let store = Arc::new(ParameterStore::new());
        let (bridge, patch_rx) = patch_queue();
        let (analyzer_tx, analyzer_rx) = analyzer_tap(ANALYZER_TAP_CAPACITY);
        Self {
            params: Arc::new(GenreGenieParams::new(&store)),
            store,
            patch_rx,
            assistant_bridge: Some(bridge),
            chain_l: ChannelChain::new(),
            chain_r: ChannelChain::new(),
            compressor: StereoCompressor::new(DEFAULT_SAMPLE_RATE),
            delay: StereoDelay::new(DEFAULT_SAMPLE_RATE),
            reverb: StereoReverb::new(DEFAULT_SAMPLE_RATE),
            meters: Arc::new(Meters::new()),
            analyzer_tx,
            analyzer_rx: Some(analyzer_rx),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl GenreGenie {
    /// Hand the write side of the parameter queue to the chat worker. The
    /// bridge owns patch validation; whatever it enqueues is committed by
    /// the next settings sync. Can be taken once.
    pub fn take_assistant_bridge(&mut self) -> Option<AssistantBridge> {
        self.assistant_bridge.take()
    }

    /// Hand the read side of the analysis tap to a visualization consumer.
    /// Invalidated (recreated) when the host renegotiates the sample rate.
    pub fn take_analyzer_consumer(&mut self) -> Option<AnalyzerConsumer> {
        self.analyzer_rx.take()
    }

    pub fn meters(&self) -> Arc<Meters> {
        self.meters.clone()
    }

    pub fn store(&self) -> Arc<ParameterStore> {
        self.store.clone()
    }

    /// The settings synchronizer. Runs to completion before any sample of
    /// the block is produced: queued assistant writes are committed first,
    /// then one snapshot drives the coefficient rebuild and every stage
    /// reconfiguration. Both channel chains see the same snapshot.
    fn sync_settings(&mut self) -> EffectSettings {
        let drained = self.patch_rx.drain_into(&self.store);
        if drained > 0 {
            gg_log!("[ASSISTANT] committed {} queued parameter writes", drained);
        }

        let eq = ChainSettings::from_store(&self.store);
        let fx = EffectSettings::from_store(&self.store);

        let low = low_cut_coefficients(self.sample_rate, eq.low_cut_freq);
        let peak = peak_coefficients(
            self.sample_rate,
            eq.peak_freq,
            eq.peak_quality,
            eq.peak_gain_db,
        );
        let high = high_cut_coefficients(self.sample_rate, eq.high_cut_freq);

        for chain in [&mut self.chain_l, &mut self.chain_r] {
            chain.configure_low_cut(low, eq.low_cut_slope, eq.low_cut_bypassed);
            chain.configure_peak(peak, eq.peak_bypassed);
            chain.configure_high_cut(high, eq.high_cut_slope, eq.high_cut_bypassed);
        }

        self.compressor.set_parameters(
            fx.comp_threshold_db,
            fx.comp_ratio,
            fx.comp_attack_ms,
            fx.comp_release_ms,
        );
        self.delay.set_time_ms(fx.delay_time_ms);
        self.reverb.set_parameters(fx.reverb_size, fx.reverb_decay);

        fx
    }

    /// Run the post-EQ stages over one stereo block, in the fixed order.
    fn process_effects(&mut self, left: &mut [f32], right: &mut [f32], fx: &EffectSettings) {
        let frames = left.len().min(right.len());
        let mut out_peak = 0.0f32;

        for idx in 0..frames {
            let mut l = left[idx];
            let mut r = right[idx];

            for stage in EFFECT_ORDER {
                match stage {
                    // The EQ stages run per channel ahead of this loop,
                    // inside ChannelChain, in the same fixed order.
                    StageKind::LowCut | StageKind::Peak | StageKind::HighCut => {}
                    StageKind::Compressor => {
                        if !fx.comp_bypassed {
                            (l, r) = self.compressor.process(l, r);
                        }
                    }
                    StageKind::Distortion => {
                        if !fx.distortion_bypassed {
                            l = waveshape(l, fx.distortion_amount);
                            r = waveshape(r, fx.distortion_amount);
                        }
                    }
                    StageKind::Delay => {
                        if !fx.delay_bypassed {
                            (l, r) = self.delay.process(l, r, fx.delay_feedback, fx.delay_mix);
                        }
                    }
                    StageKind::Reverb => {
                        if !fx.reverb_bypassed {
                            (l, r) = self.reverb.process(l, r, fx.reverb_mix);
                        }
                    }
                }
            }

            if fx.analyzer_enabled {
                self.analyzer_tx.push(l, r);
            }
            out_peak = out_peak.max(l.abs()).max(r.abs());

            left[idx] = l;
            right[idx] = r;
        }

        self.meters.set_output_peak_l(lin_to_db(out_peak));
        self.meters.set_output_peak_r(lin_to_db(out_peak));
        self.meters
            .set_comp_gain_reduction_db(self.compressor.get_gain_reduction_db());
    }

    fn process_internal(&mut self, buffer: &mut Buffer) -> ProcessStatus {
        let fx = self.sync_settings();

        let channels = buffer.as_slice();
        if channels.len() < 2 {
            return ProcessStatus::Normal;
        }
        let (first_channel, remaining) = channels.split_at_mut(1);
        let left = &mut **first_channel
            .get_mut(0)
            .expect("channel slice should contain left channel");
        let right = &mut **remaining
            .get_mut(0)
            .expect("channel slice should contain right channel");

        let mut in_peak = 0.0f32;
        for idx in 0..left.len().min(right.len()) {
            in_peak = in_peak.max(left[idx].abs()).max(right[idx].abs());
        }
        self.meters.set_input_peak_l(lin_to_db(in_peak));
        self.meters.set_input_peak_r(lin_to_db(in_peak));

        self.chain_l.process_block(left);
        self.chain_r.process_block(right);

        self.process_effects(left, right, &fx);

        ProcessStatus::Normal
    }
}

impl Plugin for GenreGenie {
    const NAME: &'static str = "GenreGenie";
    const VENDOR: &'static str = "Danny Hagenlocker";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        ..AudioIOLayout::const_default()
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        #[cfg(feature = "debug")]
        crate::debug::logger::init_logger();

        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.sample_rate = buffer_config.sample_rate;

            // Delay lines, reverb banks and detector coefficients are all
            // sized for the sample rate; rebuild them on renegotiation.
            permit_alloc(|| {
                self.delay = StereoDelay::new(self.sample_rate);
                self.reverb = StereoReverb::new(self.sample_rate);
                let (tap, rx) = analyzer_tap(ANALYZER_TAP_CAPACITY);
                self.analyzer_tx = tap;
                self.analyzer_rx = Some(rx);
            });
            self.compressor = StereoCompressor::new(self.sample_rate);
            self.chain_l.reset();
            self.chain_r.reset();
            self.meters.reset();

            #[cfg(feature = "debug")]
            crate::debug::logger::drain_to_file();

            true
        }))
        .unwrap_or(false)
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.process_internal(buffer)
        }))
        .unwrap_or(ProcessStatus::Normal)
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.chain_l.reset();
            self.chain_r.reset();
            self.compressor.reset();
            self.delay.reset();
            self.reverb.reset();
            self.meters.reset();
        }))
        .unwrap_or(());
    }
}

impl ClapPlugin for GenreGenie {
    const CLAP_ID: &'static str = "com.hagenlocker.genregenie";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Chat-assisted EQ, dynamics and effects chain");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Equalizer,
        ClapFeature::Stereo,
    ];
}

impl Vst3Plugin for GenreGenie {
    const VST3_CLASS_ID: [u8; 16] = *b"GenreGenieFxChat";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Eq];
}

nih_export_clap!(GenreGenie);
nih_export_vst3!(GenreGenie);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{parse_patch, PatchSummary};

    fn bypass_everything(store: &ParameterStore) {
        for id in [
            ParamId::LowCutBypassed,
            ParamId::PeakBypassed,
            ParamId::HighCutBypassed,
            ParamId::CompBypassed,
            ParamId::DistortionBypassed,
            ParamId::DelayBypassed,
            ParamId::ReverbBypassed,
        ] {
            store.set(id, 1.0);
        }
    }

    #[test]
    fn test_patch_applies_at_next_sync_not_before() {
        let mut plugin = GenreGenie::default();
        let mut bridge = plugin.take_assistant_bridge().unwrap();

        let patch = parse_patch(
            r#"{ "eq_parameters": [
                { "id": "Peak Gain", "type": "Peak Gain", "current": 6.0 },
                { "id": "Peak Freq", "type": "Peak Band", "current": 1000.0 },
                { "id": "Sparkle", "type": "???", "current": 1.0 }
            ] }"#,
        )
        .unwrap();
        let summary = bridge.apply_patch(&patch);
        assert_eq!(summary, PatchSummary { applied: 2, skipped: 1 });

        // Queued, not yet committed: the store still shows defaults.
        assert_eq!(plugin.store.get(ParamId::PeakGain), 0.0);

        plugin.sync_settings();
        assert_eq!(plugin.store.get(ParamId::PeakGain), 6.0);
        assert_eq!(plugin.store.get(ParamId::PeakFreq), 1000.0);

        // The chains picked up the patched bell within the same sync pass.
        let response = plugin
            .chain_l
            .peak_coefficients()
            .magnitude_db_at(1000.0, plugin.sample_rate);
        assert!((response - 6.0).abs() < 0.1, "peak response {response} dB");
    }

    #[test]
    fn test_distortion_stage_matches_contract() {
        let mut plugin = GenreGenie::default();
        bypass_everything(&plugin.store);
        plugin.store.set(ParamId::DistortionBypassed, 0.0);
        plugin.store.set(ParamId::DistortionAmount, 1.0);
        plugin.store.set(ParamId::AnalyzerEnabled, 0.0);

        let fx = plugin.sync_settings();
        let mut left = [0.5f32];
        let mut right = [0.5f32];
        plugin.chain_l.process_block(&mut left);
        plugin.chain_r.process_block(&mut right);
        plugin.process_effects(&mut left, &mut right, &fx);

        assert!((left[0] - 0.5f32.tanh()).abs() < 1e-6);
        assert_eq!(left[0], right[0]);
    }

    #[test]
    fn test_fully_bypassed_chain_is_identity() {
        let mut plugin = GenreGenie::default();
        bypass_everything(&plugin.store);
        plugin.store.set(ParamId::AnalyzerEnabled, 0.0);

        let fx = plugin.sync_settings();
        let mut left = [0.25f32, -0.5, 0.75, 0.0];
        let mut right = left;
        let expected = left;
        plugin.chain_l.process_block(&mut left);
        plugin.chain_r.process_block(&mut right);
        plugin.process_effects(&mut left, &mut right, &fx);

        assert_eq!(left, expected);
        assert_eq!(right, expected);
    }

    #[test]
    fn test_ladder_stage_counts_after_sync() {
        let mut plugin = GenreGenie::default();
        plugin.store.set(ParamId::LowCutSlope, 3.0);
        plugin.store.set(ParamId::HighCutSlope, 1.0);
        plugin.sync_settings();

        assert_eq!(plugin.chain_l.low_cut().active_stages(), 4);
        assert_eq!(plugin.chain_r.low_cut().active_stages(), 4);
        assert_eq!(plugin.chain_l.high_cut().active_stages(), 2);
        assert_eq!(plugin.chain_r.high_cut().active_stages(), 2);
    }

    #[test]
    fn test_state_restore_then_sync_reproduces_configuration() {
        let plugin = GenreGenie::default();
        plugin.store.set(ParamId::LowCutFreq, 100.0);
        plugin.store.set(ParamId::LowCutSlope, 3.0);
        plugin.store.set(ParamId::PeakGain, -3.0);
        let saved = serde_json::to_string(&plugin.store.state()).unwrap();

        let mut restored = GenreGenie::default();
        restored
            .store
            .load_state(&serde_json::from_str(&saved).unwrap());
        restored.sync_settings();

        assert_eq!(restored.chain_l.low_cut().active_stages(), 4);
        let db = restored
            .chain_l
            .peak_coefficients()
            .magnitude_db_at(750.0, restored.sample_rate);
        assert!((db + 3.0).abs() < 0.1);
    }
}
