//! Core transcription functionality.
//!
//! This module contains the per-request pipeline: audio payload
//! resolution, backend and compute-type decisions, the model cache, and
//! the orchestrator that ties them together with GPU-to-CPU fallback.

mod audio;
mod backend;
mod cache;
mod capabilities;
mod compute;
mod orchestrator;
mod types;

pub use audio::{bytes_to_f32_samples, resolve_audio_source};
pub use backend::resolve_backend;
pub use cache::{LoadOutcome, ModelCache};
pub use capabilities::CapabilityCache;
pub use compute::negotiate_compute_type;
pub use orchestrator::TranscriptionOrchestrator;
pub use types::{PrefetchOutcome, TranscriptionOutcome, WorkerRequest, WorkerResponse};
