//! Speech transcription worker over standard input/output.
//!
//! This is the entry point for the worker. It initializes the configuration,
//! sets up the speech engine and worker state, emits the ready signal, and
//! runs the blocking request loop until shutdown or end of input.

use std::io;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use asr_worker::{
    config::Config,
    engine::SpeechEngine,
    error::Result,
    server::{run, WorkerState},
};

#[cfg(feature = "whisper")]
use asr_worker::engine::whisper::WhisperEngine;

fn main() -> Result<()> {
    let config = Config::load()?;

    // Responses own stdout, so all diagnostics go to stderr.
    fmt()
        .with_target(false)
        .with_level(true)
        .json()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let engine: Box<dyn SpeechEngine> = {
        #[cfg(feature = "whisper")]
        {
            Box::new(WhisperEngine::new(
                config.model_dir.as_deref(),
                config.gpu_device,
                config.engine_threads,
            ))
        }
        #[cfg(not(feature = "whisper"))]
        {
            return Err(asr_worker::error::WorkerError::Config(
                "engine \"whisper\" requested but the whisper feature is not enabled. \
                 Build with --features whisper"
                    .to_string(),
            ));
        }
    };

    info!(
        engine = engine.name(),
        threads = config.engine_threads,
        gpu_device = config.gpu_device,
        "worker starting"
    );

    let mut state = WorkerState::new(engine, config.overrides);
    run(&mut state, io::stdin().lock(), &mut io::stdout().lock())
}
