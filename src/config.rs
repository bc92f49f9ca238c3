//! Worker configuration.
//!
//! This module centralizes runtime configuration. General settings load
//! through figment with the usual precedence (environment over file over
//! defaults); the three backend override flags are plain environment
//! variables with tri-state parsing, read once at startup and never again.

use std::env;
use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, WorkerError};

// Default value functions for serde defaults
fn default_engine() -> String {
    "whisper".to_string()
}
fn default_gpu_device() -> i32 {
    constants::engine::DEFAULT_GPU_DEVICE
}
fn default_engine_threads() -> usize {
    num_cpus::get().clamp(constants::engine::MIN_THREADS, constants::engine::MAX_THREADS)
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Worker configuration loaded from multiple sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Inference engine to run requests on. `whisper` is the only engine
    /// this build tree knows about.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// CUDA device ordinal handed to the engine for GPU attempts.
    #[serde(default = "default_gpu_device")]
    pub gpu_device: i32,

    /// Intra-op thread count handed to the engine for CPU decoding.
    #[serde(default = "default_engine_threads")]
    pub engine_threads: usize,

    /// Directory holding engine model files. Engine default when unset.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Backend override flags, read from the environment once at startup.
    #[serde(skip)]
    pub overrides: BackendOverrides,
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables prefixed `ASR_WORKER_` (highest priority)
    /// 2. asr-worker.toml (if exists)
    /// 3. Built-in defaults (lowest priority)
    pub fn load() -> Result<Self> {
        let mut config: Config = Figment::new()
            .merge(Self::default_figment())
            .merge(Toml::file(constants::fs::DEFAULT_CONFIG_FILE))
            .merge(Env::prefixed(constants::env::PREFIX))
            .extract()
            .map_err(|e| WorkerError::Config(format!("Failed to load configuration: {}", e)))?;

        config.overrides = BackendOverrides::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Generate default configuration values
    fn default_figment() -> Figment {
        Figment::from(Serialized::defaults(Config {
            engine: default_engine(),
            gpu_device: default_gpu_device(),
            engine_threads: default_engine_threads(),
            model_dir: None,
            log_level: default_log_level(),
            overrides: BackendOverrides::default(),
        }))
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.engine != "whisper" {
            return Err(WorkerError::Config(format!(
                "Unknown engine \"{}\" (expected \"whisper\")",
                self.engine
            )));
        }

        if self.engine_threads == 0 {
            return Err(WorkerError::Config(
                "engine_threads must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Backend override flags controlling the resolver.
///
/// Force-CPU wins over force-GPU; auto-GPU gates only the automatic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOverrides {
    pub force_cpu: bool,
    pub force_gpu: bool,
    pub auto_gpu: bool,
}

impl Default for BackendOverrides {
    fn default() -> Self {
        Self {
            force_cpu: false,
            force_gpu: false,
            auto_gpu: true,
        }
    }
}

impl BackendOverrides {
    /// Read the three override flags from the environment.
    pub fn from_env() -> Self {
        Self {
            force_cpu: env_flag(constants::env::FORCE_CPU, false),
            force_gpu: env_flag(constants::env::FORCE_GPU, false),
            auto_gpu: env_flag(constants::env::AUTO_GPU, true),
        }
    }
}

/// Parse a tri-state boolean environment flag.
///
/// Truthy tokens are `1`, `true`, `yes`, `on`; falsy tokens are `0`, `false`,
/// `no`, `off` (ASCII case-insensitive, surrounding whitespace ignored).
/// Unset variables and unrecognized tokens yield `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => parse_flag(&raw).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_tokens() {
        for token in ["1", "true", "YES", " on "] {
            assert_eq!(parse_flag(token), Some(true), "token {:?}", token);
        }
        for token in ["0", "false", "No", "OFF"] {
            assert_eq!(parse_flag(token), Some(false), "token {:?}", token);
        }
        for token in ["", "2", "enabled", "tru e"] {
            assert_eq!(parse_flag(token), None, "token {:?}", token);
        }
    }

    #[test]
    fn test_env_flag_unset_uses_default() {
        assert!(env_flag("ASR_WORKER_TEST_FLAG_UNSET", true));
        assert!(!env_flag("ASR_WORKER_TEST_FLAG_UNSET", false));
    }

    #[test]
    fn test_env_flag_garbage_uses_default() {
        env::set_var("ASR_WORKER_TEST_FLAG_GARBAGE", "maybe");
        assert!(env_flag("ASR_WORKER_TEST_FLAG_GARBAGE", true));
        assert!(!env_flag("ASR_WORKER_TEST_FLAG_GARBAGE", false));
        env::remove_var("ASR_WORKER_TEST_FLAG_GARBAGE");
    }

    #[test]
    fn test_env_flag_reads_tokens() {
        env::set_var("ASR_WORKER_TEST_FLAG_TOKENS", "On");
        assert!(env_flag("ASR_WORKER_TEST_FLAG_TOKENS", false));
        env::set_var("ASR_WORKER_TEST_FLAG_TOKENS", "off");
        assert!(!env_flag("ASR_WORKER_TEST_FLAG_TOKENS", true));
        env::remove_var("ASR_WORKER_TEST_FLAG_TOKENS");
    }

    #[test]
    fn test_overrides_default_allows_auto_gpu() {
        let overrides = BackendOverrides::default();
        assert!(!overrides.force_cpu);
        assert!(!overrides.force_gpu);
        assert!(overrides.auto_gpu);
    }

    #[test]
    fn test_default_engine_threads_in_range() {
        let threads = default_engine_threads();
        assert!(threads >= constants::engine::MIN_THREADS);
        assert!(threads <= constants::engine::MAX_THREADS);
    }
}
