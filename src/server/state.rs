//! Worker state threaded through the request loop.
//!
//! This module provides the state that every dispatched request
//! operates on: the orchestrator and the metrics counters.

use crate::asr::TranscriptionOrchestrator;
use crate::config::BackendOverrides;
use crate::engine::SpeechEngine;
use crate::server::metrics::WorkerMetrics;

/// Worker state containing dependencies.
pub struct WorkerState {
    /// The transcription pipeline, model cache, and capability probes
    pub orchestrator: TranscriptionOrchestrator,

    /// Request counters for the exit summary
    pub metrics: WorkerMetrics,
}

impl WorkerState {
    /// Create worker state around a speech engine.
    ///
    /// # Arguments
    /// * `engine` - The speech engine implementation
    /// * `overrides` - Backend overrides read from the environment
    ///
    /// # Returns
    /// A new worker state
    pub fn new(engine: Box<dyn SpeechEngine>, overrides: BackendOverrides) -> Self {
        Self {
            orchestrator: TranscriptionOrchestrator::new(engine, overrides),
            metrics: WorkerMetrics::new(),
        }
    }
}
