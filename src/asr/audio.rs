//! Audio payload resolution and PCM sample conversion.
//!
//! Requests carry audio either inline (base64-encoded 16-bit PCM) or as a
//! filesystem path. Inline audio wins whenever it is non-blank; a malformed
//! inline payload is an error even when a usable path is also present.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::constants::audio::{BYTES_PER_SAMPLE, PCM_SCALE};
use crate::engine::AudioInput;
use crate::error::{Result, WorkerError};

use super::types::WorkerRequest;

/// Select the audio source for a request.
///
/// Base64 payloads are whitespace-tolerant (hosts often wrap long lines)
/// but otherwise strict. Paths are used exactly as sent and must exist.
pub fn resolve_audio_source(request: &WorkerRequest) -> Result<AudioInput> {
    if let Some(encoded) = request.audio_pcm16_b64.as_deref() {
        if !encoded.trim().is_empty() {
            return decode_pcm_payload(encoded).map(AudioInput::Samples);
        }
    }

    if let Some(path) = request.audio_path.as_deref() {
        if !path.is_empty() && Path::new(path).exists() {
            return Ok(AudioInput::File(PathBuf::from(path)));
        }
    }

    Err(WorkerError::Validation(
        "Audio payload is missing. Provide audioPcm16B64 or a valid audioPath.".to_string(),
    ))
}

fn decode_pcm_payload(encoded: &str) -> Result<Vec<f32>> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| WorkerError::Validation(format!("Invalid in-memory PCM payload: {e}")))?;

    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(WorkerError::Validation(
            "Invalid in-memory PCM payload length.".to_string(),
        ));
    }

    Ok(bytes_to_f32_samples(&bytes))
}

/// Convert little-endian 16-bit PCM bytes to normalized f32 samples.
pub fn bytes_to_f32_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            sample as f32 / PCM_SCALE
        })
        .collect()
}
