//! Compute type negotiation against probed engine support.
//!
//! The requested type is normalized, then checked against what the engine
//! reports for the chosen backend. An engine that reports nothing (probe
//! failure, or no compute-type concept) leaves the request untouched.

use tracing::debug;

use crate::constants::compute::{CPU_PRIORITY, CUDA_PRIORITY};
use crate::constants::model::DEFAULT_COMPUTE_TYPE;
use crate::engine::SpeechEngine;
use crate::types::{Backend, ComputeTypeDecision};

use super::capabilities::CapabilityCache;

/// Settle the compute type to load a model with.
///
/// The decision echoes the caller's requested type untouched next to the
/// type actually used; matching happens on a trimmed, lowercased copy.
/// When the requested type is unsupported, the best supported type from
/// the backend's preference order replaces it; when nothing in that order
/// is supported either, the normalized request goes through unchanged and
/// the engine reports its own error.
pub fn negotiate_compute_type(
    backend: Backend,
    requested: &str,
    capabilities: &CapabilityCache,
    engine: &dyn SpeechEngine,
) -> ComputeTypeDecision {
    let normalized = normalize(requested);
    let supported = capabilities.supported_compute_types(engine, backend);

    let used = if supported.is_empty() || supported.contains(&normalized) {
        normalized
    } else {
        let priority = match backend {
            Backend::Cuda => CUDA_PRIORITY,
            Backend::Cpu => CPU_PRIORITY,
        };
        let used = priority
            .iter()
            .find(|candidate| supported.contains(**candidate))
            .map(|candidate| candidate.to_string())
            .unwrap_or(normalized);
        debug!(
            backend = %backend,
            requested,
            used = %used,
            "compute type rewritten"
        );
        used
    };

    ComputeTypeDecision {
        requested: requested.to_string(),
        used,
    }
}

fn normalize(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        DEFAULT_COMPUTE_TYPE.to_string()
    } else {
        trimmed
    }
}
