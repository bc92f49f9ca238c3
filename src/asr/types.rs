//! Request, response, and outcome records for the worker protocol.
//!
//! Wire records use camelCase field names. Unknown request fields are
//! ignored so hosts can add fields without breaking older workers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants;
use crate::engine::DecodeOptions;
use crate::types::{BackendDecision, ComputeTypeDecision};

// Serde default helpers
fn default_command() -> String {
    "transcribe".to_string()
}
fn default_sample_rate() -> u32 {
    constants::audio::SAMPLE_RATE_HZ
}
fn default_compute_type() -> String {
    constants::model::DEFAULT_COMPUTE_TYPE.to_string()
}
fn default_true() -> bool {
    true
}
fn default_beam_size() -> u32 {
    constants::decode::DEFAULT_BEAM_SIZE
}
fn default_best_of() -> u32 {
    constants::decode::DEFAULT_BEST_OF
}
fn default_language() -> String {
    constants::decode::DEFAULT_LANGUAGE.to_string()
}

/// One request line from the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    /// Operation to perform. A missing field means transcribe.
    #[serde(default = "default_command")]
    pub command: String,

    /// Opaque correlation id, echoed back verbatim in the response.
    #[serde(default)]
    pub id: Value,

    #[serde(default)]
    pub model_id: Option<String>,

    #[serde(default)]
    pub audio_path: Option<String>,

    /// Base64-encoded little-endian 16-bit PCM. Takes precedence over
    /// `audio_path` when non-blank.
    #[serde(default)]
    pub audio_pcm16_b64: Option<String>,

    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,

    #[serde(default = "default_compute_type")]
    pub compute_type: String,

    /// Desired backend; anything but `cpu`/`cuda` means automatic.
    #[serde(default)]
    pub backend_preference: Option<String>,

    /// Permit one CPU retry when a CUDA attempt fails.
    #[serde(default = "default_true")]
    pub allow_backend_fallback: bool,

    #[serde(default = "default_beam_size")]
    pub beam_size: u32,

    #[serde(default = "default_best_of")]
    pub best_of: u32,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_true")]
    pub vad_filter: bool,

    #[serde(default)]
    pub condition_on_previous_text: bool,

    #[serde(default)]
    pub without_timestamps: bool,

    #[serde(default)]
    pub initial_prompt: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub no_speech_threshold: Option<f32>,

    #[serde(default)]
    pub log_prob_threshold: Option<f32>,

    #[serde(default)]
    pub compression_ratio_threshold: Option<f32>,
}

impl WorkerRequest {
    /// Decode tuning for this request.
    ///
    /// Optional thresholds pass through only when the caller set them; a
    /// blank initial prompt is treated as absent.
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            beam_size: self.beam_size,
            best_of: self.best_of,
            language: self.language.clone(),
            vad_filter: self.vad_filter,
            condition_on_previous_text: self.condition_on_previous_text,
            without_timestamps: self.without_timestamps,
            initial_prompt: self
                .initial_prompt
                .as_deref()
                .map(str::trim)
                .filter(|prompt| !prompt.is_empty())
                .map(String::from),
            temperature: self.temperature,
            no_speech_threshold: self.no_speech_threshold,
            log_prob_threshold: self.log_prob_threshold,
            compression_ratio_threshold: self.compression_ratio_threshold,
        }
    }
}

/// Aggregated result of a successful transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOutcome {
    pub text: String,
    pub model_init_ms: u64,
    pub decode_compute_ms: u64,
    pub runtime_cache_hit: bool,
    pub segment_count: usize,
    pub avg_log_prob: f32,
    pub no_speech_prob: f32,
    pub compression_ratio: f32,
    pub backend: BackendDecision,
    pub compute_type: ComputeTypeDecision,
}

/// Result of a successful model prefetch.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchOutcome {
    pub model_init_ms: u64,
    pub runtime_cache_hit: bool,
    pub backend: BackendDecision,
    pub compute_type: ComputeTypeDecision,
}

/// One response line to the host.
///
/// A single flat record covers every envelope; fields that do not apply to
/// an envelope stay `None` and are skipped during serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_init_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_compute_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_cache_hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_log_prob: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_speech_prob: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_requested: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_type_requested: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_type_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<bool>,
}

impl WorkerResponse {
    fn envelope(id: Option<Value>, ok: bool) -> Self {
        Self {
            id,
            ok,
            text: None,
            model_init_ms: None,
            decode_compute_ms: None,
            runtime_cache_hit: None,
            segment_count: None,
            avg_log_prob: None,
            no_speech_prob: None,
            compression_ratio: None,
            backend_requested: None,
            backend_used: None,
            backend_fallback: None,
            compute_type_requested: None,
            compute_type_used: None,
            error: None,
            traceback: None,
            shutdown: None,
        }
    }

    /// Success envelope for a completed transcription.
    pub fn transcription(id: Value, outcome: TranscriptionOutcome) -> Self {
        Self {
            text: Some(outcome.text),
            model_init_ms: Some(outcome.model_init_ms),
            decode_compute_ms: Some(outcome.decode_compute_ms),
            runtime_cache_hit: Some(outcome.runtime_cache_hit),
            segment_count: Some(outcome.segment_count),
            avg_log_prob: Some(outcome.avg_log_prob),
            no_speech_prob: Some(outcome.no_speech_prob),
            compression_ratio: Some(outcome.compression_ratio),
            backend_requested: Some(outcome.backend.requested.as_str().to_string()),
            backend_used: Some(outcome.backend.used.as_str().to_string()),
            backend_fallback: Some(outcome.backend.fallback),
            compute_type_requested: Some(outcome.compute_type.requested),
            compute_type_used: Some(outcome.compute_type.used),
            ..Self::envelope(Some(id), true)
        }
    }

    /// Success envelope for a completed prefetch.
    pub fn prefetch(id: Value, outcome: PrefetchOutcome) -> Self {
        Self {
            model_init_ms: Some(outcome.model_init_ms),
            runtime_cache_hit: Some(outcome.runtime_cache_hit),
            backend_requested: Some(outcome.backend.requested.as_str().to_string()),
            backend_used: Some(outcome.backend.used.as_str().to_string()),
            backend_fallback: Some(outcome.backend.fallback),
            compute_type_requested: Some(outcome.compute_type.requested),
            compute_type_used: Some(outcome.compute_type.used),
            ..Self::envelope(Some(id), true)
        }
    }

    /// Failure envelope echoing the request id.
    pub fn failure(id: Value, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::envelope(Some(id), false)
        }
    }

    /// Failure envelope for input the worker could not attribute to a
    /// request; the id is reported as null and a diagnostic trace is
    /// attached.
    pub fn exception(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            traceback: Some(traceback.into()),
            ..Self::envelope(Some(Value::Null), false)
        }
    }

    /// Acknowledgement sent immediately before the worker exits.
    pub fn shutdown_ack() -> Self {
        Self {
            shutdown: Some(true),
            ..Self::envelope(None, true)
        }
    }
}
