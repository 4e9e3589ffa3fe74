//! Assistant bridge: the boundary with the chat collaborator.
//!
//! The chat side (HTTP, prompting, history) lives outside this crate. What
//! crosses the boundary is JSON in the shape the assistant is prompted with:
//!
//! ```json
//! { "eq_parameters": [
//!     { "id": "Peak Gain", "type": "Peak Gain", "unit": "dB",
//!       "range": [-24.0, 24.0], "current": 6.0 }
//! ] }
//! ```
//!
//! This module parses that JSON out of a chat reply, validates each record
//! against the parameter store's declared layout (unknown ids skipped,
//! values clamped, choice labels mapped to indices), and hands the surviving
//! writes to the audio thread over a lock-free SPSC queue. The queue is
//! drained by the settings synchronizer at block start, so a multi-record
//! patch lands as one unit and never tears across a block. If no reply ever
//! arrives, nothing here runs and the audio path is unaffected.

use crate::store::{ParamId, ParamKind, ParameterStore};
use ringbuf::{Consumer, Producer, RingBuffer};
use serde::{Deserialize, Serialize};

/// Capacity of the bridge-to-audio write queue. A patch touches at most one
/// record per parameter, so this holds many patches' worth of writes.
const WRITE_QUEUE_CAPACITY: usize = 256;

/// One validated parameter write, sized for the lock-free queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamWrite {
    pub id: ParamId,
    pub value: f32,
}

/// One record of an assistant patch. `type`/`unit` are display hints; only
/// `id` and `current` drive the application.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchEntry {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub current: f32,
}

/// A parsed patch plus a count of records that did not even decode.
#[derive(Debug, Default)]
pub struct AssistantPatch {
    pub entries: Vec<PatchEntry>,
    pub malformed: usize,
}

/// Outcome summary of applying one patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Deserialize)]
struct RawPatch {
    #[serde(rename = "eq_parameters")]
    parameters: Vec<serde_json::Value>,
}

/// Pull the fenced ```json block out of a chat reply. Falls back to the
/// whole reply when the assistant skipped the fence but sent bare JSON.
pub fn extract_json_block(reply: &str) -> Option<&str> {
    if let Some(start) = reply.find("```") {
        let after_fence = &reply[start + 3..];
        let body = after_fence.strip_prefix("json").unwrap_or(after_fence);
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }
    let trimmed = reply.trim();
    trimmed.starts_with('{').then_some(trimmed)
}

/// Parse a patch from the assistant's JSON. Records that fail to decode are
/// counted and dropped; one bad record never aborts the rest.
pub fn parse_patch(json: &str) -> Result<AssistantPatch, serde_json::Error> {
    let raw: RawPatch = serde_json::from_str(json)?;
    let mut patch = AssistantPatch::default();
    for value in raw.parameters {
        match serde_json::from_value::<PatchEntry>(value) {
            Ok(entry) => patch.entries.push(entry),
            Err(err) => {
                patch.malformed += 1;
                log::warn!("dropping malformed patch record: {err}");
            }
        }
    }
    Ok(patch)
}

/// Validate one record against the declared layout. Unknown ids yield
/// `None`; out-of-range values come back clamped. Choice parameters accept
/// either an index or the numeric label the assistant was shown (e.g. a
/// slope of `48` means the fourth choice, not index 48).
pub fn validate_entry(entry: &PatchEntry) -> Option<ParamWrite> {
    let id = ParamId::from_key(&entry.id)?;
    let spec = id.spec();
    let value = match spec.kind {
        ParamKind::Choice { labels } => labels
            .iter()
            .position(|label| label.parse::<f32>() == Ok(entry.current))
            .map(|index| index as f32)
            .unwrap_or_else(|| spec.clamp(entry.current)),
        _ => spec.clamp(entry.current),
    };
    Some(ParamWrite { id, value })
}

/// Create the bridge pair: the producing half lives with the chat worker,
/// the consuming half with the audio thread's settings synchronizer.
pub fn patch_queue() -> (AssistantBridge, PatchConsumer) {
    let (producer, consumer) = RingBuffer::<ParamWrite>::new(WRITE_QUEUE_CAPACITY).split();
    (
        AssistantBridge { producer },
        PatchConsumer { consumer },
    )
}

/// Producing half of the bridge. Owned by the chat worker context; never
/// touched by the audio thread.
pub struct AssistantBridge {
    producer: Producer<ParamWrite>,
}

impl AssistantBridge {
    /// Validate and enqueue a patch. Returns how many records were applied
    /// versus skipped (unknown id, undecodable, or queue full).
    pub fn apply_patch(&mut self, patch: &AssistantPatch) -> PatchSummary {
        let mut summary = PatchSummary {
            applied: 0,
            skipped: patch.malformed,
        };
        for entry in &patch.entries {
            match validate_entry(entry) {
                Some(write) => {
                    if self.producer.push(write).is_ok() {
                        summary.applied += 1;
                    } else {
                        summary.skipped += 1;
                        log::warn!("parameter write queue full, dropping '{}'", entry.id);
                    }
                }
                None => {
                    summary.skipped += 1;
                    log::warn!("ignoring unknown parameter '{}' in patch", entry.id);
                }
            }
        }
        summary
    }

    /// Convenience: extract, parse and apply straight from a chat reply.
    pub fn apply_reply(&mut self, reply: &str) -> PatchSummary {
        let Some(json) = extract_json_block(reply) else {
            log::warn!("assistant reply contained no JSON block");
            return PatchSummary::default();
        };
        match parse_patch(json) {
            Ok(patch) => self.apply_patch(&patch),
            Err(err) => {
                log::warn!("assistant patch failed to parse: {err}");
                PatchSummary::default()
            }
        }
    }
}

/// Consuming half of the bridge. Owned by the audio thread; drained once
/// per block before the settings snapshot is taken.
pub struct PatchConsumer {
    consumer: Consumer<ParamWrite>,
}

impl PatchConsumer {
    /// Commit every queued write into the store, in arrival order. Lock-free
    /// and allocation-free; safe on the audio thread.
    pub fn drain_into(&mut self, store: &ParameterStore) -> usize {
        let mut drained = 0;
        while let Some(write) = self.consumer.pop() {
            store.set(write.id, write.value);
            drained += 1;
        }
        drained
    }
}

#[derive(Serialize)]
struct ParamDescriptor {
    id: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    unit: &'static str,
    current: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<f32>>,
}

#[derive(Serialize)]
struct ParameterDescription {
    eq_parameters: Vec<ParamDescriptor>,
}

/// Display hints the assistant prompt embeds alongside each identifier.
fn descriptor_hints(id: ParamId) -> (&'static str, &'static str) {
    match id {
        ParamId::LowCutFreq => ("Low Cut", "Hz"),
        ParamId::LowCutSlope => ("Low Cut Slope", "dB/Oct"),
        ParamId::PeakFreq => ("Peak Band", "Hz"),
        ParamId::PeakGain => ("Peak Gain", "dB"),
        ParamId::PeakQuality => ("Q (Bandwidth)", "Q"),
        ParamId::HighCutFreq => ("High Cut", "Hz"),
        ParamId::HighCutSlope => ("High Cut Slope", "dB/Oct"),
        ParamId::CompThreshold => ("Compressor", "dB"),
        ParamId::CompRatio => ("Compressor", ":1"),
        ParamId::CompAttack => ("Compressor", "ms"),
        ParamId::CompRelease => ("Compressor", "ms"),
        ParamId::DistortionAmount => ("Distortion", ""),
        ParamId::DelayTime => ("Delay", "ms"),
        ParamId::DelayFeedback => ("Delay", ""),
        ParamId::DelayMix => ("Delay", "%"),
        ParamId::ReverbSize => ("Reverb", ""),
        ParamId::ReverbDecay => ("Reverb", "s"),
        ParamId::ReverbMix => ("Reverb", "%"),
        _ => ("Bypass", ""),
    }
}

/// Render the current state as the JSON the chat prompt embeds. The
/// `Analyzer Enabled` toggle is UI plumbing the assistant has no business
/// with, so it is not advertised.
pub fn describe_parameters(store: &ParameterStore) -> String {
    let eq_parameters = ParamId::ALL
        .iter()
        .filter(|&&id| id != ParamId::AnalyzerEnabled)
        .map(|&id| {
            let (kind, unit) = descriptor_hints(id);
            let (range, choices) = match id.spec().kind {
                ParamKind::Float { min, max } => (Some([min, max]), None),
                ParamKind::Choice { labels } => (
                    None,
                    Some(labels.iter().filter_map(|l| l.parse().ok()).collect()),
                ),
                ParamKind::Toggle => (None, Some(vec![0.0, 1.0])),
            };
            // Choice parameters are shown by label, not by internal index.
            let current = match id.spec().kind {
                ParamKind::Choice { labels } => labels[store.get_choice(id).min(labels.len() - 1)]
                    .parse()
                    .unwrap_or(0.0),
                _ => store.get(id),
            };
            ParamDescriptor {
                id: id.key(),
                kind,
                unit,
                current,
                range,
                choices,
            }
        })
        .collect();

    serde_json::to_string_pretty(&ParameterDescription { eq_parameters })
        .expect("parameter description serializes")
}
