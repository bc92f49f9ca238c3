//! Memoized capability probes for the active engine.
//!
//! Probes run at most once per worker process. A failed probe is recorded
//! as a negative answer and never retried, so a flaky driver cannot flip
//! the backend choice between requests.

use std::collections::BTreeSet;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::engine::SpeechEngine;
use crate::types::Backend;

/// Process-wide cache of engine capability probe results.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    gpu_available: OnceCell<bool>,
    cpu_compute_types: OnceCell<BTreeSet<String>>,
    cuda_compute_types: OnceCell<BTreeSet<String>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a usable CUDA setup is present.
    ///
    /// True only when the engine reports at least one device and a ready
    /// runtime. A probe error on either step counts as no GPU.
    pub fn gpu_available(&self, engine: &dyn SpeechEngine) -> bool {
        *self.gpu_available.get_or_init(|| probe_gpu(engine))
    }

    /// Compute types the engine accepts on `backend`.
    ///
    /// An empty set means the probe failed or the engine does not
    /// constrain compute types; callers pass the request through as-is.
    pub fn supported_compute_types(
        &self,
        engine: &dyn SpeechEngine,
        backend: Backend,
    ) -> &BTreeSet<String> {
        let cell = match backend {
            Backend::Cpu => &self.cpu_compute_types,
            Backend::Cuda => &self.cuda_compute_types,
        };
        cell.get_or_init(|| probe_compute_types(engine, backend))
    }
}

fn probe_gpu(engine: &dyn SpeechEngine) -> bool {
    let devices = match engine.cuda_device_count() {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "CUDA device probe failed, treating GPU as unavailable");
            return false;
        }
    };
    if devices == 0 {
        debug!("no CUDA devices detected");
        return false;
    }
    match engine.cuda_runtime_ready() {
        Ok(ready) => {
            debug!(devices, ready, "CUDA probe complete");
            ready
        }
        Err(e) => {
            warn!(error = %e, "CUDA runtime probe failed, treating GPU as unavailable");
            false
        }
    }
}

fn probe_compute_types(engine: &dyn SpeechEngine, backend: Backend) -> BTreeSet<String> {
    match engine.supported_compute_types(backend) {
        Ok(types) => {
            debug!(backend = %backend, count = types.len(), "compute type probe complete");
            types
        }
        Err(e) => {
            warn!(backend = %backend, error = %e, "compute type probe failed, assuming unconstrained");
            BTreeSet::new()
        }
    }
}
