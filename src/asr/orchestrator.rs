//! One-request coordination: validation, backend and precision
//! resolution, model acquisition, decode, and result aggregation.
//!
//! A request makes at most two engine attempts: the resolved backend
//! first, then one CPU retry when that backend was CUDA and the request
//! permits fallback. Nothing else is retried.

use std::time::Instant;

use tracing::{info, warn};

use crate::config::BackendOverrides;
use crate::constants::audio::SAMPLE_RATE_HZ;
use crate::constants::model::ALLOWED_MODEL_IDS;
use crate::engine::{AudioInput, DecodeOptions, EngineError, Segment, SpeechEngine};
use crate::error::{Result, WorkerError};
use crate::types::{Backend, BackendDecision, BackendPreference, ComputeTypeDecision, ModelKey};

use super::audio::resolve_audio_source;
use super::backend::resolve_backend;
use super::cache::ModelCache;
use super::capabilities::CapabilityCache;
use super::compute::negotiate_compute_type;
use super::types::{PrefetchOutcome, TranscriptionOutcome, WorkerRequest};

const TRANSCRIPTION: &str = "Transcription";
const PREFETCH: &str = "Prefetch";

/// Owns the engine, the model cache, and the capability probes for the
/// life of the worker process.
pub struct TranscriptionOrchestrator {
    engine: Box<dyn SpeechEngine>,
    cache: ModelCache,
    capabilities: CapabilityCache,
    overrides: BackendOverrides,
}

/// One completed engine attempt.
struct AttemptSuccess {
    segments: Vec<Segment>,
    cache_hit: bool,
    load_ms: u64,
    decode_ms: u64,
}

/// One failed engine attempt. Load bookkeeping is zero when the load
/// itself failed; a decode failure keeps the load's numbers so fallback
/// accounting can accumulate them.
struct AttemptFailure {
    error: EngineError,
    cache_hit: bool,
    load_ms: u64,
}

impl TranscriptionOrchestrator {
    pub fn new(engine: Box<dyn SpeechEngine>, overrides: BackendOverrides) -> Self {
        Self {
            engine,
            cache: ModelCache::new(),
            capabilities: CapabilityCache::new(),
            overrides,
        }
    }

    /// Number of models currently held by the cache.
    pub fn cached_models(&self) -> usize {
        self.cache.len()
    }

    /// Run one transcription request end to end.
    ///
    /// Validation failures surface before any model or engine work.
    /// Model load time accumulates across attempts, while decode time
    /// covers only the attempt that produced the result.
    pub fn transcribe(&mut self, request: &WorkerRequest) -> Result<TranscriptionOutcome> {
        let model_id = validate_model_id(request)?;
        if request.sample_rate_hz != SAMPLE_RATE_HZ {
            return Err(WorkerError::Validation(format!(
                "Unsupported sample rate: {}. Expected 16000 Hz.",
                request.sample_rate_hz
            )));
        }
        let audio = resolve_audio_source(request)?;
        let options = request.decode_options();

        let preference = BackendPreference::parse(request.backend_preference.as_deref());
        let backend = resolve_backend(
            preference,
            &self.overrides,
            &self.capabilities,
            self.engine.as_ref(),
        );
        let decision = BackendDecision::initial(backend);
        let compute = negotiate_compute_type(
            backend,
            &request.compute_type,
            &self.capabilities,
            self.engine.as_ref(),
        );

        let outcome = match self.attempt_decode(model_id, backend, &compute.used, &audio, &options)
        {
            Ok(attempt) => assemble(
                attempt.segments,
                attempt.load_ms,
                attempt.decode_ms,
                attempt.cache_hit,
                decision,
                compute,
            ),
            Err(failed) => {
                if backend != Backend::Cuda || !request.allow_backend_fallback {
                    return Err(WorkerError::Backend {
                        operation: TRANSCRIPTION,
                        backend,
                        compute_type: compute.used,
                        source: failed.error,
                    });
                }
                warn!(
                    backend = %backend,
                    compute_type = %compute.used,
                    error = %failed.error,
                    "cuda attempt failed, retrying on cpu"
                );
                let decision = decision.with_fallback(Backend::Cpu);
                let fallback_compute = negotiate_compute_type(
                    Backend::Cpu,
                    &request.compute_type,
                    &self.capabilities,
                    self.engine.as_ref(),
                );
                match self.attempt_decode(
                    model_id,
                    Backend::Cpu,
                    &fallback_compute.used,
                    &audio,
                    &options,
                ) {
                    Ok(retry) => assemble(
                        retry.segments,
                        failed.load_ms + retry.load_ms,
                        retry.decode_ms,
                        failed.cache_hit && retry.cache_hit,
                        decision,
                        ComputeTypeDecision {
                            requested: compute.requested,
                            used: fallback_compute.used,
                        },
                    ),
                    Err(second) => {
                        return Err(WorkerError::BackendFallback {
                            operation: TRANSCRIPTION,
                            requested_backend: backend,
                            requested_compute: compute.requested,
                            used_backend: Backend::Cpu,
                            used_compute: fallback_compute.used,
                            source: second.error,
                        })
                    }
                }
            }
        };

        info!(
            model = model_id,
            backend = %outcome.backend.used,
            fallback = outcome.backend.fallback,
            cache_hit = outcome.runtime_cache_hit,
            decode_ms = outcome.decode_compute_ms,
            segments = outcome.segment_count,
            "transcription complete"
        );
        Ok(outcome)
    }

    /// Warm the cache for a model without decoding anything.
    ///
    /// Prefetch skips every audio check and follows the same backend,
    /// precision, and fallback protocol as transcription.
    pub fn prefetch(&mut self, request: &WorkerRequest) -> Result<PrefetchOutcome> {
        let model_id = validate_model_id(request)?;

        let preference = BackendPreference::parse(request.backend_preference.as_deref());
        let backend = resolve_backend(
            preference,
            &self.overrides,
            &self.capabilities,
            self.engine.as_ref(),
        );
        let decision = BackendDecision::initial(backend);
        let compute = negotiate_compute_type(
            backend,
            &request.compute_type,
            &self.capabilities,
            self.engine.as_ref(),
        );

        let outcome = match self.attempt_load(model_id, backend, &compute.used) {
            Ok((cache_hit, load_ms)) => PrefetchOutcome {
                model_init_ms: load_ms,
                runtime_cache_hit: cache_hit,
                backend: decision,
                compute_type: compute,
            },
            Err(error) => {
                if backend != Backend::Cuda || !request.allow_backend_fallback {
                    return Err(WorkerError::Backend {
                        operation: PREFETCH,
                        backend,
                        compute_type: compute.used,
                        source: error,
                    });
                }
                warn!(
                    backend = %backend,
                    compute_type = %compute.used,
                    error = %error,
                    "cuda prefetch failed, retrying on cpu"
                );
                let decision = decision.with_fallback(Backend::Cpu);
                let fallback_compute = negotiate_compute_type(
                    Backend::Cpu,
                    &request.compute_type,
                    &self.capabilities,
                    self.engine.as_ref(),
                );
                match self.attempt_load(model_id, Backend::Cpu, &fallback_compute.used) {
                    Ok((_, load_ms)) => PrefetchOutcome {
                        model_init_ms: load_ms,
                        // The CUDA load failed, so this request did real
                        // load work no matter what the CPU cache held.
                        runtime_cache_hit: false,
                        backend: decision,
                        compute_type: ComputeTypeDecision {
                            requested: compute.requested,
                            used: fallback_compute.used,
                        },
                    },
                    Err(second) => {
                        return Err(WorkerError::BackendFallback {
                            operation: PREFETCH,
                            requested_backend: backend,
                            requested_compute: compute.requested,
                            used_backend: Backend::Cpu,
                            used_compute: fallback_compute.used,
                            source: second,
                        })
                    }
                }
            }
        };

        info!(
            model = model_id,
            backend = %outcome.backend.used,
            fallback = outcome.backend.fallback,
            cache_hit = outcome.runtime_cache_hit,
            init_ms = outcome.model_init_ms,
            "prefetch complete"
        );
        Ok(outcome)
    }

    fn attempt_decode(
        &mut self,
        model_id: &str,
        backend: Backend,
        compute_type: &str,
        audio: &AudioInput,
        options: &DecodeOptions,
    ) -> std::result::Result<AttemptSuccess, AttemptFailure> {
        let key = ModelKey::new(model_id, backend, compute_type);
        let loaded = match self.cache.get_or_load(self.engine.as_ref(), &key) {
            Ok(loaded) => loaded,
            Err(error) => {
                return Err(AttemptFailure {
                    error,
                    cache_hit: false,
                    load_ms: 0,
                })
            }
        };

        let started = Instant::now();
        match loaded.model.transcribe(audio, options) {
            Ok(segments) => Ok(AttemptSuccess {
                segments,
                cache_hit: loaded.cache_hit,
                load_ms: loaded.load_ms,
                decode_ms: started.elapsed().as_millis() as u64,
            }),
            Err(error) => Err(AttemptFailure {
                error,
                cache_hit: loaded.cache_hit,
                load_ms: loaded.load_ms,
            }),
        }
    }

    fn attempt_load(
        &mut self,
        model_id: &str,
        backend: Backend,
        compute_type: &str,
    ) -> std::result::Result<(bool, u64), EngineError> {
        let key = ModelKey::new(model_id, backend, compute_type);
        let loaded = self.cache.get_or_load(self.engine.as_ref(), &key)?;
        Ok((loaded.cache_hit, loaded.load_ms))
    }
}

fn validate_model_id(request: &WorkerRequest) -> Result<&str> {
    let model_id = request.model_id.as_deref().unwrap_or_default();
    if model_id.is_empty() {
        return Err(WorkerError::Validation("Model ID is required.".to_string()));
    }
    if !ALLOWED_MODEL_IDS.contains(&model_id) {
        return Err(WorkerError::Validation(format!(
            "Unsupported model ID: {model_id}. Allowed: {}",
            ALLOWED_MODEL_IDS.join(", ")
        )));
    }
    Ok(model_id)
}

fn assemble(
    segments: Vec<Segment>,
    model_init_ms: u64,
    decode_compute_ms: u64,
    runtime_cache_hit: bool,
    backend: BackendDecision,
    compute_type: ComputeTypeDecision,
) -> TranscriptionOutcome {
    let text = segments
        .iter()
        .map(|segment| segment.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    TranscriptionOutcome {
        text,
        model_init_ms,
        decode_compute_ms,
        runtime_cache_hit,
        segment_count: segments.len(),
        avg_log_prob: mean(&segments, |s| s.avg_logprob),
        no_speech_prob: mean(&segments, |s| s.no_speech_prob),
        compression_ratio: mean(&segments, |s| s.compression_ratio),
        backend,
        compute_type,
    }
}

fn mean(segments: &[Segment], value: impl Fn(&Segment) -> f32) -> f32 {
    if segments.is_empty() {
        return 0.0;
    }
    segments.iter().map(value).sum::<f32>() / segments.len() as f32
}
