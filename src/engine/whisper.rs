//! whisper.cpp engine adapter, enabled by the `whisper` cargo feature.
//!
//! Maps the engine traits onto `whisper-rs`. whisper.cpp cannot enumerate
//! supported precisions, so the capability report is intentionally thin:
//! compute types come back empty (the negotiator passes requests through)
//! and GPU readiness reflects whether the CUDA kernels were compiled in.

use std::fs;
use std::path::{Path, PathBuf};

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{AudioInput, DecodeOptions, EngineError, LoadedModel, Segment, SpeechEngine};
use crate::asr::bytes_to_f32_samples;
use crate::types::Backend;

/// Default directory for ggml model files when none is configured.
const DEFAULT_MODEL_DIR: &str = "models";

/// Speech engine backed by whisper.cpp.
pub struct WhisperEngine {
    model_dir: PathBuf,
    gpu_device: i32,
    threads: usize,
}

impl WhisperEngine {
    pub fn new(model_dir: Option<&Path>, gpu_device: i32, threads: usize) -> Self {
        Self {
            model_dir: model_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            gpu_device,
            threads,
        }
    }

    fn model_path(&self, model_id: &str) -> PathBuf {
        self.model_dir.join(format!("ggml-{}.bin", model_id))
    }
}

fn cuda_compiled() -> bool {
    cfg!(feature = "cuda")
}

impl SpeechEngine for WhisperEngine {
    fn name(&self) -> &'static str {
        "whisper"
    }

    fn cuda_device_count(&self) -> Result<u32, EngineError> {
        // whisper.cpp has no device enumeration API. A CUDA build reports one
        // device; a context-load failure on it drives the CPU fallback.
        Ok(if cuda_compiled() { 1 } else { 0 })
    }

    fn cuda_runtime_ready(&self) -> Result<bool, EngineError> {
        Ok(cuda_compiled())
    }

    fn supported_compute_types(
        &self,
        _backend: Backend,
    ) -> Result<std::collections::BTreeSet<String>, EngineError> {
        // Precision is baked into the ggml file; nothing to negotiate.
        Ok(std::collections::BTreeSet::new())
    }

    fn load_model(
        &self,
        model_id: &str,
        backend: Backend,
        _compute_type: &str,
    ) -> Result<Box<dyn LoadedModel>, EngineError> {
        let path = self.model_path(model_id);
        if !path.is_file() {
            return Err(EngineError::Load(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| EngineError::Load(format!("non-UTF-8 model path: {}", path.display())))?;

        let mut params = WhisperContextParameters::default();
        params.use_gpu(backend == Backend::Cuda && cuda_compiled());
        params.gpu_device(self.gpu_device);
        let context = WhisperContext::new_with_params(path_str, params)
            .map_err(|e| EngineError::Load(e.to_string()))?;

        Ok(Box::new(WhisperModel {
            context,
            threads: self.threads,
        }))
    }
}

struct WhisperModel {
    context: WhisperContext,
    threads: usize,
}

impl LoadedModel for WhisperModel {
    fn transcribe(
        &self,
        audio: &AudioInput,
        options: &DecodeOptions,
    ) -> Result<Vec<Segment>, EngineError> {
        let samples = match audio {
            AudioInput::Samples(samples) => samples.clone(),
            AudioInput::File(path) => read_wav_samples(path)?,
        };

        let mut state = self
            .context
            .create_state()
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        let strategy = if options.beam_size > 1 {
            SamplingStrategy::BeamSearch {
                beam_size: options.beam_size as i32,
                patience: -1.0,
            }
        } else {
            SamplingStrategy::Greedy {
                best_of: options.best_of as i32,
            }
        };

        let mut params = FullParams::new(strategy);
        params.set_n_threads(self.threads as i32);
        params.set_translate(false);
        params.set_language(Some(&options.language));
        params.set_no_context(!options.condition_on_previous_text);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        if let Some(prompt) = &options.initial_prompt {
            params.set_initial_prompt(prompt);
        }
        if let Some(temperature) = options.temperature {
            params.set_temperature(temperature);
        }
        if let Some(threshold) = options.no_speech_threshold {
            params.set_no_speech_thold(threshold);
        }
        if let Some(threshold) = options.log_prob_threshold {
            params.set_logprob_thold(threshold);
        }
        // vad_filter, without_timestamps, and the compression ratio threshold
        // have no whisper.cpp counterpart that changes extracted text.

        state
            .full(params, &samples)
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        let segment_count = state
            .full_n_segments()
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        let mut segments = Vec::with_capacity(segment_count.max(0) as usize);
        for i in 0..segment_count {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| EngineError::Decode(e.to_string()))?;
            // whisper.cpp does not report per-segment quality measures.
            segments.push(Segment::text_only(text));
        }
        Ok(segments)
    }
}

/// Read a 16 kHz mono PCM16 WAV file into normalized samples.
fn read_wav_samples(path: &Path) -> Result<Vec<f32>, EngineError> {
    let bytes =
        fs::read(path).map_err(|e| EngineError::Decode(format!("{}: {}", path.display(), e)))?;
    let data = wav_data_chunk(&bytes)
        .ok_or_else(|| EngineError::Decode(format!("unsupported WAV file: {}", path.display())))?;
    Ok(bytes_to_f32_samples(data))
}

/// Locate the data chunk of a PCM16 mono RIFF/WAVE payload.
fn wav_data_chunk(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }
    let mut offset = 12;
    let mut pcm16_mono = false;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().ok()?) as usize;
        let body = bytes.get(offset + 8..offset + 8 + size)?;
        match id {
            b"fmt " => {
                if body.len() < 16 {
                    return None;
                }
                let format = u16::from_le_bytes([body[0], body[1]]);
                let channels = u16::from_le_bytes([body[2], body[3]]);
                let bits = u16::from_le_bytes([body[14], body[15]]);
                pcm16_mono = format == 1 && channels == 1 && bits == 16;
            }
            b"data" => {
                return if pcm16_mono { Some(body) } else { None };
            }
            _ => {}
        }
        // Chunks are word aligned.
        offset += 8 + size + (size & 1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_fixture(samples: &[i16]) -> Vec<u8> {
        let data_len = samples.len() * 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&16_000u32.to_le_bytes());
        bytes.extend_from_slice(&32_000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data_len as u32).to_le_bytes());
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_wav_data_chunk_extracts_pcm16_mono() {
        let bytes = wav_fixture(&[0, 16_384, -16_384]);
        let data = wav_data_chunk(&bytes).expect("data chunk");
        assert_eq!(data.len(), 6);
    }

    #[test]
    fn test_wav_data_chunk_rejects_non_riff() {
        assert!(wav_data_chunk(b"not a wav file").is_none());
    }

    #[test]
    fn test_model_path_layout() {
        let engine = WhisperEngine::new(Some(Path::new("/opt/models")), 0, 4);
        assert_eq!(
            engine.model_path("small.en"),
            PathBuf::from("/opt/models/ggml-small.en.bin")
        );
    }
}
