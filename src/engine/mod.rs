//! Inference engine abstraction.
//!
//! The worker's domain logic never talks to a concrete speech engine
//! directly; everything goes through the traits in this module. The
//! `whisper` cargo feature supplies the production implementation.

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants;
use crate::types::Backend;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(feature = "whisper")]
pub mod whisper;

/// Errors produced by a speech engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Loading model weights or creating an execution context failed.
    #[error("model load failed: {0}")]
    Load(String),

    /// Running decode over audio failed.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Querying device capabilities failed.
    #[error("capability probe failed: {0}")]
    Probe(String),
}

/// One decoded span of audio with its quality measures.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub avg_logprob: f32,
    pub no_speech_prob: f32,
    pub compression_ratio: f32,
}

impl Segment {
    /// Segment carrying text only, with neutral quality measures.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            avg_logprob: 0.0,
            no_speech_prob: 0.0,
            compression_ratio: 0.0,
        }
    }
}

/// Audio handed to an engine for one decode.
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// Decoded PCM samples: 16 kHz mono f32 in [-1.0, 1.0].
    Samples(Vec<f32>),
    /// Path to an audio file the engine reads itself.
    File(PathBuf),
}

/// Decode tuning for a single request.
///
/// The optional fields are handed to the engine only when set; unset fields
/// keep the engine's own defaults rather than pinning ours.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    pub beam_size: u32,
    pub best_of: u32,
    pub language: String,
    pub vad_filter: bool,
    pub condition_on_previous_text: bool,
    pub without_timestamps: bool,
    pub initial_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub no_speech_threshold: Option<f32>,
    pub log_prob_threshold: Option<f32>,
    pub compression_ratio_threshold: Option<f32>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            beam_size: constants::decode::DEFAULT_BEAM_SIZE,
            best_of: constants::decode::DEFAULT_BEST_OF,
            language: constants::decode::DEFAULT_LANGUAGE.to_string(),
            vad_filter: true,
            condition_on_previous_text: false,
            without_timestamps: false,
            initial_prompt: None,
            temperature: None,
            no_speech_threshold: None,
            log_prob_threshold: None,
            compression_ratio_threshold: None,
        }
    }
}

/// Defines the contract between the worker and a speech engine.
pub trait SpeechEngine: Send + Sync {
    /// Engine name used in logs and startup reporting.
    fn name(&self) -> &'static str;

    /// Number of CUDA devices visible to the engine.
    fn cuda_device_count(&self) -> Result<u32, EngineError>;

    /// Whether the engine's GPU runtime libraries can actually be loaded.
    ///
    /// A device can be present while the runtime is broken (driver mismatch,
    /// missing shared libraries); both answers must be yes before the
    /// resolver picks CUDA on its own.
    fn cuda_runtime_ready(&self) -> Result<bool, EngineError>;

    /// Compute types the engine supports on `backend`.
    ///
    /// An empty set means the engine cannot enumerate precisions; callers
    /// treat that as "unknown", not as "none supported".
    fn supported_compute_types(&self, backend: Backend) -> Result<BTreeSet<String>, EngineError>;

    /// Load a model for the given backend and compute type.
    fn load_model(
        &self,
        model_id: &str,
        backend: Backend,
        compute_type: &str,
    ) -> Result<Box<dyn LoadedModel>, EngineError>;
}

/// A model instance ready to decode audio.
pub trait LoadedModel: Send + Sync {
    /// Decode `audio` into ordered segments.
    fn transcribe(&self, audio: &AudioInput, options: &DecodeOptions)
        -> Result<Vec<Segment>, EngineError>;
}
