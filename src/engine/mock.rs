//! Scripted speech engine for unit tests.
//!
//! Probe answers, load/decode failures, and decode output are all
//! configurable per backend, and every call is counted so tests can assert
//! on memoization and cache behavior.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{AudioInput, DecodeOptions, EngineError, LoadedModel, Segment, SpeechEngine};
use crate::types::Backend;

pub(crate) struct MockEngine {
    cuda_devices: Result<u32, String>,
    runtime_ready: Result<bool, String>,
    cpu_types: BTreeSet<String>,
    cuda_types: BTreeSet<String>,
    compute_probe_error: bool,
    load_failures: HashSet<Backend>,
    decode_failures: HashSet<Backend>,
    segments: Vec<Segment>,
    pub device_probe_calls: Arc<AtomicUsize>,
    pub runtime_probe_calls: Arc<AtomicUsize>,
    pub compute_probe_calls: Arc<AtomicUsize>,
    pub load_calls: Arc<AtomicUsize>,
    pub decode_calls: Arc<AtomicUsize>,
}

fn type_set(types: &[&str]) -> BTreeSet<String> {
    types.iter().map(|t| t.to_string()).collect()
}

impl MockEngine {
    /// Engine on a host with no usable GPU.
    pub fn cpu_only() -> Self {
        Self {
            cuda_devices: Ok(0),
            runtime_ready: Ok(false),
            cpu_types: type_set(&["int8", "int8_float32", "float32"]),
            cuda_types: BTreeSet::new(),
            compute_probe_error: false,
            load_failures: HashSet::new(),
            decode_failures: HashSet::new(),
            segments: vec![Segment {
                text: "hello world".to_string(),
                avg_logprob: -0.25,
                no_speech_prob: 0.05,
                compression_ratio: 1.4,
            }],
            device_probe_calls: Arc::new(AtomicUsize::new(0)),
            runtime_probe_calls: Arc::new(AtomicUsize::new(0)),
            compute_probe_calls: Arc::new(AtomicUsize::new(0)),
            load_calls: Arc::new(AtomicUsize::new(0)),
            decode_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Engine on a host with one healthy CUDA device.
    pub fn with_cuda() -> Self {
        let mut engine = Self::cpu_only();
        engine.cuda_devices = Ok(1);
        engine.runtime_ready = Ok(true);
        engine.cuda_types = type_set(&["int8_float16", "float16", "int8", "float32"]);
        engine
    }

    pub fn with_device_probe_error(mut self) -> Self {
        self.cuda_devices = Err("scripted device probe failure".to_string());
        self
    }

    pub fn with_runtime_probe_error(mut self) -> Self {
        self.runtime_ready = Err("scripted runtime probe failure".to_string());
        self
    }

    pub fn with_runtime_ready(mut self, ready: bool) -> Self {
        self.runtime_ready = Ok(ready);
        self
    }

    pub fn with_compute_types(mut self, backend: Backend, types: &[&str]) -> Self {
        match backend {
            Backend::Cpu => self.cpu_types = type_set(types),
            Backend::Cuda => self.cuda_types = type_set(types),
        }
        self
    }

    pub fn with_compute_probe_error(mut self) -> Self {
        self.compute_probe_error = true;
        self
    }

    pub fn with_load_failure(mut self, backend: Backend) -> Self {
        self.load_failures.insert(backend);
        self
    }

    pub fn with_decode_failure(mut self, backend: Backend) -> Self {
        self.decode_failures.insert(backend);
        self
    }

    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }
}

impl SpeechEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn cuda_device_count(&self) -> Result<u32, EngineError> {
        self.device_probe_calls.fetch_add(1, Ordering::SeqCst);
        self.cuda_devices.clone().map_err(EngineError::Probe)
    }

    fn cuda_runtime_ready(&self) -> Result<bool, EngineError> {
        self.runtime_probe_calls.fetch_add(1, Ordering::SeqCst);
        self.runtime_ready.clone().map_err(EngineError::Probe)
    }

    fn supported_compute_types(&self, backend: Backend) -> Result<BTreeSet<String>, EngineError> {
        self.compute_probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.compute_probe_error {
            return Err(EngineError::Probe(
                "scripted compute probe failure".to_string(),
            ));
        }
        Ok(match backend {
            Backend::Cpu => self.cpu_types.clone(),
            Backend::Cuda => self.cuda_types.clone(),
        })
    }

    fn load_model(
        &self,
        _model_id: &str,
        backend: Backend,
        _compute_type: &str,
    ) -> Result<Box<dyn LoadedModel>, EngineError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.load_failures.contains(&backend) {
            return Err(EngineError::Load(format!(
                "scripted {} load failure",
                backend
            )));
        }
        Ok(Box::new(MockModel {
            fail_decode: self.decode_failures.contains(&backend),
            backend,
            segments: self.segments.clone(),
            decode_calls: Arc::clone(&self.decode_calls),
        }))
    }
}

struct MockModel {
    fail_decode: bool,
    backend: Backend,
    segments: Vec<Segment>,
    decode_calls: Arc<AtomicUsize>,
}

impl LoadedModel for MockModel {
    fn transcribe(
        &self,
        _audio: &AudioInput,
        _options: &DecodeOptions,
    ) -> Result<Vec<Segment>, EngineError> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_decode {
            return Err(EngineError::Decode(format!(
                "scripted {} decode failure",
                self.backend
            )));
        }
        Ok(self.segments.clone())
    }
}
