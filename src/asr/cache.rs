//! Process-lifetime cache of loaded models.
//!
//! Model weights are the dominant startup cost, so every successfully
//! loaded model is kept for the life of the worker. Entries are keyed by
//! model, backend, and compute type; the same weights loaded for CUDA and
//! CPU are two entries. Nothing is ever evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::engine::{EngineError, LoadedModel, SpeechEngine};
use crate::types::ModelKey;

/// Result of a cache lookup, loading on miss.
pub struct LoadOutcome {
    pub model: Arc<dyn LoadedModel>,
    pub cache_hit: bool,
    /// Wall time spent loading; zero on a hit.
    pub load_ms: u64,
}

#[derive(Default)]
pub struct ModelCache {
    models: HashMap<ModelKey, Arc<dyn LoadedModel>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Return the cached model for `key`, loading and storing it on miss.
    ///
    /// A failed load leaves the cache untouched so a later request can
    /// retry (for example after a missing model file appears).
    pub fn get_or_load(
        &mut self,
        engine: &dyn SpeechEngine,
        key: &ModelKey,
    ) -> Result<LoadOutcome, EngineError> {
        if let Some(model) = self.models.get(key) {
            debug!(model = %key, "model cache hit");
            return Ok(LoadOutcome {
                model: Arc::clone(model),
                cache_hit: true,
                load_ms: 0,
            });
        }

        let started = Instant::now();
        let model: Arc<dyn LoadedModel> =
            Arc::from(engine.load_model(&key.model_id, key.backend, &key.compute_type)?);
        let load_ms = started.elapsed().as_millis() as u64;
        info!(model = %key, load_ms, "model loaded");

        self.models.insert(key.clone(), Arc::clone(&model));
        Ok(LoadOutcome {
            model,
            cache_hit: false,
            load_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::types::Backend;

    fn key(model_id: &str, backend: Backend, compute_type: &str) -> ModelKey {
        ModelKey::new(model_id, backend, compute_type)
    }

    #[test]
    fn test_miss_loads_then_hit_reuses() {
        let engine = MockEngine::cpu_only();
        let mut cache = ModelCache::new();
        let k = key("small.en", Backend::Cpu, "int8");

        let first = cache.get_or_load(&engine, &k).unwrap();
        assert!(!first.cache_hit);

        let second = cache.get_or_load(&engine, &k).unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.load_ms, 0);
        assert_eq!(engine.load_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_keys_load_separately() {
        let engine = MockEngine::with_cuda();
        let mut cache = ModelCache::new();

        cache
            .get_or_load(&engine, &key("small.en", Backend::Cpu, "int8"))
            .unwrap();
        cache
            .get_or_load(&engine, &key("large-v3", Backend::Cpu, "int8"))
            .unwrap();
        cache
            .get_or_load(&engine, &key("small.en", Backend::Cuda, "int8"))
            .unwrap();
        cache
            .get_or_load(&engine, &key("small.en", Backend::Cpu, "float32"))
            .unwrap();

        assert_eq!(engine.load_calls.load(Ordering::SeqCst), 4);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_failed_load_caches_nothing() {
        let engine = MockEngine::cpu_only().with_load_failure(Backend::Cpu);
        let mut cache = ModelCache::new();
        let k = key("small.en", Backend::Cpu, "int8");

        assert!(cache.get_or_load(&engine, &k).is_err());
        assert!(cache.get_or_load(&engine, &k).is_err());
        assert_eq!(engine.load_calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_are_never_evicted() {
        let engine = MockEngine::cpu_only();
        let mut cache = ModelCache::new();
        for compute_type in ["int8", "int8_float32", "float32", "float16"] {
            cache
                .get_or_load(&engine, &key("small.en", Backend::Cpu, compute_type))
                .unwrap();
        }
        assert_eq!(cache.len(), 4);
    }
}
