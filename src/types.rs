//! Strong typing for backend selection and model identity.
//!
//! This module provides the small vocabulary of domain types the resolver,
//! negotiator, cache, and orchestrator pass between each other.

use serde::{Deserialize, Serialize};

/// Compute backend an inference attempt runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Host CPU execution.
    Cpu,
    /// NVIDIA GPU execution.
    Cuda,
}

impl Backend {
    /// Wire-format name of the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Cuda => "cuda",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller's backend wish, before resolution.
///
/// Anything other than a literal `cpu` or `cuda` request (absent field, empty
/// string, unknown token) collapses to automatic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl BackendPreference {
    /// Normalize a raw preference string from a request.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("cpu") => BackendPreference::Cpu,
            Some("cuda") => BackendPreference::Cuda,
            _ => BackendPreference::Auto,
        }
    }

    /// Name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendPreference::Auto => "auto",
            BackendPreference::Cpu => "cpu",
            BackendPreference::Cuda => "cuda",
        }
    }
}

impl std::fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of backend resolution for one request.
///
/// `requested` is the backend the resolver first settled on; `used` diverges
/// from it only when the GPU-to-CPU fallback rewrites the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendDecision {
    pub requested: Backend,
    pub used: Backend,
    pub fallback: bool,
}

impl BackendDecision {
    /// Decision before any fallback: requested and used agree.
    pub fn initial(backend: Backend) -> Self {
        Self {
            requested: backend,
            used: backend,
            fallback: false,
        }
    }

    /// Rewrite the decision after a fallback attempt on `used`.
    pub fn with_fallback(self, used: Backend) -> Self {
        Self {
            used,
            fallback: true,
            ..self
        }
    }
}

/// Requested versus actually-used compute type for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeTypeDecision {
    pub requested: String,
    pub used: String,
}

/// Cache key for loaded models. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub model_id: String,
    pub backend: Backend,
    pub compute_type: String,
}

impl ModelKey {
    pub fn new(
        model_id: impl Into<String>,
        backend: Backend,
        compute_type: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            backend,
            compute_type: compute_type.into(),
        }
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.model_id, self.backend, self.compute_type)
    }
}
