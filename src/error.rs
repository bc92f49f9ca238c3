//! Custom error types for the transcription worker.
//!
//! This module provides a centralized error handling system using the `thiserror`
//! crate to define structured, typed errors. The `Display` text of request-level
//! variants is the exact `error` string callers see in failure responses.

use std::io;
use thiserror::Error;

use crate::engine::EngineError;
use crate::types::Backend;

/// Primary error type for the worker, covering all possible error cases.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A request was rejected before any engine work started.
    #[error("{0}")]
    Validation(String),

    /// An inference attempt failed on the backend it ran on, with no
    /// fallback attempted.
    #[error("{operation} failed ({backend}/{compute_type}): {source}")]
    Backend {
        operation: &'static str,
        backend: Backend,
        compute_type: String,
        #[source]
        source: EngineError,
    },

    /// The requested backend failed and the CPU fallback failed too.
    #[error("{operation} failed ({requested_backend}/{requested_compute}) with fallback ({used_backend}/{used_compute}): {source}")]
    BackendFallback {
        operation: &'static str,
        requested_backend: Backend,
        requested_compute: String,
        used_backend: Backend,
        used_compute: String,
        #[source]
        source: EngineError,
    },

    /// A request named a command the worker does not implement.
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    /// Errors from invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors on the protocol stream.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors from the underlying IO system.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience type alias for Results with WorkerError.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Render an error and its source chain as a single diagnostic line.
///
/// Failure responses for malformed input carry this in their `traceback`
/// field so the host can log something more useful than the top message.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
