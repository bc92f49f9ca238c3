//! Backend selection for a single request.
//!
//! Operator environment overrides outrank the request, and an explicit
//! request outranks automatic probing. The CUDA probe only runs on the
//! automatic path; an explicit `cuda` request is trusted as stated and any
//! GPU trouble surfaces later as a load or decode failure with its own
//! fallback handling.

use tracing::debug;

use crate::config::BackendOverrides;
use crate::engine::SpeechEngine;
use crate::types::{Backend, BackendPreference};

use super::capabilities::CapabilityCache;

/// Pick the backend for a request.
pub fn resolve_backend(
    preference: BackendPreference,
    overrides: &BackendOverrides,
    capabilities: &CapabilityCache,
    engine: &dyn SpeechEngine,
) -> Backend {
    let (backend, reason) = if overrides.force_cpu {
        (Backend::Cpu, "force-cpu override")
    } else if overrides.force_gpu {
        (Backend::Cuda, "force-gpu override")
    } else {
        match preference {
            BackendPreference::Cpu => (Backend::Cpu, "explicit request"),
            BackendPreference::Cuda => (Backend::Cuda, "explicit request"),
            BackendPreference::Auto => {
                if !overrides.auto_gpu {
                    (Backend::Cpu, "auto-gpu disabled")
                } else if capabilities.gpu_available(engine) {
                    (Backend::Cuda, "gpu probe")
                } else {
                    (Backend::Cpu, "gpu probe")
                }
            }
        }
    };
    debug!(backend = %backend, reason, "backend resolved");
    backend
}
