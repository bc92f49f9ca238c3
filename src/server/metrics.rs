//! Worker metrics tracking.
//!
//! This module provides request counters for the worker process. The
//! request loop is single-threaded, so plain integers suffice; the
//! summary is logged when the loop exits.

use std::time::Instant;

/// Tracks request counts over the life of the worker.
#[derive(Debug)]
pub struct WorkerMetrics {
    /// Total request lines dispatched (valid or not)
    requests: u64,

    /// Completed transcriptions
    transcriptions: u64,

    /// Transcription requests that returned a failure envelope
    transcription_failures: u64,

    /// Completed prefetches
    prefetches: u64,

    /// Prefetch requests that returned a failure envelope
    prefetch_failures: u64,

    /// Successful requests that needed the CPU fallback
    fallbacks: u64,

    /// Requests naming a command the worker does not implement
    unsupported_commands: u64,

    /// Lines that could not be handled as a request at all
    protocol_errors: u64,

    /// Worker start time
    start_time: Instant,
}

impl WorkerMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            requests: 0,
            transcriptions: 0,
            transcription_failures: 0,
            prefetches: 0,
            prefetch_failures: 0,
            fallbacks: 0,
            unsupported_commands: 0,
            protocol_errors: 0,
            start_time: Instant::now(),
        }
    }

    /// Count one dispatched request line.
    pub fn record_request(&mut self) {
        self.requests += 1;
    }

    /// Record a completed transcription.
    pub fn record_transcription(&mut self, fallback: bool) {
        self.transcriptions += 1;
        if fallback {
            self.fallbacks += 1;
        }
    }

    /// Record a transcription failure envelope.
    pub fn record_transcription_failure(&mut self) {
        self.transcription_failures += 1;
    }

    /// Record a completed prefetch.
    pub fn record_prefetch(&mut self, fallback: bool) {
        self.prefetches += 1;
        if fallback {
            self.fallbacks += 1;
        }
    }

    /// Record a prefetch failure envelope.
    pub fn record_prefetch_failure(&mut self) {
        self.prefetch_failures += 1;
    }

    /// Record a request naming an unknown command.
    pub fn record_unsupported_command(&mut self) {
        self.unsupported_commands += 1;
    }

    /// Record a line the loop could not handle as a request.
    pub fn record_protocol_error(&mut self) {
        self.protocol_errors += 1;
    }

    /// Get all metrics as a serde_json::Value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_seconds": self.start_time.elapsed().as_secs(),
            "requests": self.requests,
            "transcriptions": self.transcriptions,
            "transcription_failures": self.transcription_failures,
            "prefetches": self.prefetches,
            "prefetch_failures": self.prefetch_failures,
            "fallbacks": self.fallbacks,
            "unsupported_commands": self.unsupported_commands,
            "protocol_errors": self.protocol_errors,
        })
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
