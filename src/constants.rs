//! Domain constants for the transcription worker.
//!
//! This module contains compile-time constants used throughout the worker.
//! These are separated from runtime configuration to provide clear distinction
//! between values that never change and those that can be configured.

/// Model-related constants.
pub mod model {
    /// Model identifiers the worker will load.
    ///
    /// Order matters: this is the order the allow-list is rendered in
    /// validation error messages.
    pub const ALLOWED_MODEL_IDS: &[&str] = &["small.en", "large-v3"];

    /// Compute type assumed when a request omits or blanks the field.
    pub const DEFAULT_COMPUTE_TYPE: &str = "int8";
}

/// Audio payload constants.
pub mod audio {
    /// The only sample rate the worker accepts.
    pub const SAMPLE_RATE_HZ: u32 = 16_000;

    /// Bytes per sample for 16-bit PCM.
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Divisor mapping i16 sample values into [-1.0, 1.0].
    pub const PCM_SCALE: f32 = 32_768.0;
}

/// Compute-type negotiation tables.
pub mod compute {
    /// Fallback precisions for CUDA devices, most preferred first.
    pub const CUDA_PRIORITY: &[&str] =
        &["int8_float16", "float16", "int8", "float32", "int8_float32"];

    /// Fallback precisions for CPU execution, most preferred first.
    pub const CPU_PRIORITY: &[&str] = &["int8", "int8_float32", "float32"];
}

/// Decode parameter defaults applied when a request omits a field.
pub mod decode {
    /// Default beam width.
    pub const DEFAULT_BEAM_SIZE: u32 = 2;

    /// Default number of candidates for greedy sampling.
    pub const DEFAULT_BEST_OF: u32 = 1;

    /// Default transcription language.
    pub const DEFAULT_LANGUAGE: &str = "en";
}

/// Engine tuning constants.
pub mod engine {
    /// Minimum intra-op thread count handed to the engine.
    pub const MIN_THREADS: usize = 2;

    /// Maximum intra-op thread count handed to the engine.
    pub const MAX_THREADS: usize = 8;

    /// Default CUDA device ordinal.
    pub const DEFAULT_GPU_DEVICE: i32 = 0;
}

/// Environment variable names.
pub mod env {
    /// Prefix for all worker configuration variables.
    pub const PREFIX: &str = "ASR_WORKER_";

    /// Tri-state flag: pin every request to the CPU backend.
    pub const FORCE_CPU: &str = "ASR_WORKER_FORCE_CPU";

    /// Tri-state flag: pin every request to the CUDA backend.
    pub const FORCE_GPU: &str = "ASR_WORKER_FORCE_GPU";

    /// Tri-state flag: allow automatic GPU selection (default on).
    pub const AUTO_GPU: &str = "ASR_WORKER_AUTO_GPU";
}

/// File system constants.
pub mod fs {
    /// Default configuration file name.
    pub const DEFAULT_CONFIG_FILE: &str = "asr-worker.toml";
}
