//! The blocking read/dispatch/write loop over the worker's message
//! channel.
//!
//! One line in, one line out: each input line is a JSON request, each
//! output line a JSON response, flushed immediately. A request failure of
//! any kind produces a failure envelope and the loop keeps reading; the
//! loop only ends on a `shutdown` command or end of input.

use std::io::{BufRead, Write};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::asr::{WorkerRequest, WorkerResponse};
use crate::error::{error_chain, Result, WorkerError};
use crate::server::state::WorkerState;

enum Dispatch {
    Respond(WorkerResponse),
    Shutdown,
}

/// Emit the ready signal, then process request lines until shutdown or
/// end of input.
///
/// Errors escape only when the channel itself breaks; anything that goes
/// wrong while handling a single line is reported as a response on the
/// channel instead.
pub fn run<R: BufRead, W: Write>(state: &mut WorkerState, input: R, output: &mut W) -> Result<()> {
    emit(output, &serde_json::json!({"ready": true}))?;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match dispatch(state, line) {
            Ok(Dispatch::Respond(response)) => emit(output, &response)?,
            Ok(Dispatch::Shutdown) => {
                emit(output, &WorkerResponse::shutdown_ack())?;
                info!(
                    summary = %state.metrics.to_json(),
                    cached_models = state.orchestrator.cached_models(),
                    "shutdown acknowledged"
                );
                return Ok(());
            }
            Err(err) => {
                state.metrics.record_protocol_error();
                error!(error = %err, "request line could not be handled");
                let response = WorkerResponse::exception(
                    format!("Worker exception: {err}"),
                    error_chain(&err),
                );
                emit(output, &response)?;
            }
        }
    }

    info!(summary = %state.metrics.to_json(), "input closed, exiting");
    Ok(())
}

fn dispatch(state: &mut WorkerState, line: &str) -> Result<Dispatch> {
    state.metrics.record_request();
    let value: Value = serde_json::from_str(line)?;
    let command = command_of(&value);

    match command.as_str() {
        "shutdown" => Ok(Dispatch::Shutdown),
        "prefetch" => {
            let request: WorkerRequest = serde_json::from_value(value)?;
            let id = request.id.clone();
            let response = match state.orchestrator.prefetch(&request) {
                Ok(outcome) => {
                    state.metrics.record_prefetch(outcome.backend.fallback);
                    WorkerResponse::prefetch(id, outcome)
                }
                Err(err) => {
                    state.metrics.record_prefetch_failure();
                    WorkerResponse::failure(id, err.to_string())
                }
            };
            Ok(Dispatch::Respond(response))
        }
        "transcribe" => {
            let request: WorkerRequest = serde_json::from_value(value)?;
            let id = request.id.clone();
            let response = match state.orchestrator.transcribe(&request) {
                Ok(outcome) => {
                    state.metrics.record_transcription(outcome.backend.fallback);
                    WorkerResponse::transcription(id, outcome)
                }
                Err(err) => {
                    state.metrics.record_transcription_failure();
                    WorkerResponse::failure(id, err.to_string())
                }
            };
            Ok(Dispatch::Respond(response))
        }
        other => {
            state.metrics.record_unsupported_command();
            let err = WorkerError::UnsupportedCommand(other.to_string());
            Ok(Dispatch::Respond(WorkerResponse::failure(
                request_id(&value),
                err.to_string(),
            )))
        }
    }
}

/// The command named by a request. A missing field means transcribe; a
/// non-string value is kept in JSON form so the rejection can echo it.
fn command_of(value: &Value) -> String {
    match value.get("command") {
        None => "transcribe".to_string(),
        Some(Value::String(command)) => command.clone(),
        Some(other) => other.to_string(),
    }
}

fn request_id(value: &Value) -> Value {
    value.get("id").cloned().unwrap_or(Value::Null)
}

fn emit<W: Write>(output: &mut W, payload: &impl Serialize) -> Result<()> {
    serde_json::to_writer(&mut *output, payload)?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::config::BackendOverrides;
    use crate::engine::mock::MockEngine;

    // Base64 of four zero bytes, two silent samples.
    const SILENCE_B64: &str = "AAAAAA==";

    fn run_lines(engine: MockEngine, input: &str) -> Vec<Value> {
        let mut state = WorkerState::new(Box::new(engine), BackendOverrides::default());
        let mut output = Vec::new();
        run(&mut state, Cursor::new(input.to_string()), &mut output).expect("loop should not fail");
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn transcribe_line(id: Value) -> String {
        json!({
            "command": "transcribe",
            "id": id,
            "modelId": "small.en",
            "audioPcm16B64": SILENCE_B64
        })
        .to_string()
    }

    #[test]
    fn test_ready_signal_comes_first() {
        let lines = run_lines(MockEngine::cpu_only(), "");
        assert_eq!(lines, vec![json!({"ready": true})]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let lines = run_lines(MockEngine::cpu_only(), "\n   \n\t\n");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_transcribe_round_trip() {
        let input = transcribe_line(json!("req-7")) + "\n";
        let lines = run_lines(MockEngine::cpu_only(), &input);

        assert_eq!(lines.len(), 2);
        let response = &lines[1];
        assert_eq!(response["id"], "req-7");
        assert_eq!(response["ok"], true);
        assert_eq!(response["text"], "hello world");
        assert_eq!(response["backendUsed"], "cpu");
        assert_eq!(response["backendFallback"], false);
        assert!(response.get("modelInitMs").is_some());
        assert!(response.get("decodeComputeMs").is_some());
    }

    #[test]
    fn test_numeric_id_round_trips() {
        let input = transcribe_line(json!(42)) + "\n";
        let lines = run_lines(MockEngine::cpu_only(), &input);
        assert_eq!(lines[1]["id"], 42);
    }

    #[test]
    fn test_missing_command_defaults_to_transcribe() {
        let input = json!({"modelId": "small.en", "audioPcm16B64": SILENCE_B64}).to_string() + "\n";
        let lines = run_lines(MockEngine::cpu_only(), &input);
        assert_eq!(lines[1]["ok"], true);
        assert_eq!(lines[1]["text"], "hello world");
    }

    #[test]
    fn test_validation_failure_envelope() {
        let input = json!({"id": 1, "modelId": "ghost-model", "audioPcm16B64": SILENCE_B64})
            .to_string()
            + "\n";
        let lines = run_lines(MockEngine::cpu_only(), &input);

        let response = &lines[1];
        assert_eq!(response["id"], 1);
        assert_eq!(response["ok"], false);
        assert_eq!(
            response["error"],
            "Unsupported model ID: ghost-model. Allowed: small.en, large-v3"
        );
        assert!(response.get("traceback").is_none());
    }

    #[test]
    fn test_malformed_line_keeps_loop_alive() {
        let input = format!("{{not json\n{}\n", transcribe_line(json!(2)));
        let lines = run_lines(MockEngine::cpu_only(), &input);

        assert_eq!(lines.len(), 3);
        let exception = &lines[1];
        assert_eq!(exception["id"], Value::Null);
        assert!(exception.as_object().unwrap().contains_key("id"));
        assert_eq!(exception["ok"], false);
        assert!(exception["error"]
            .as_str()
            .unwrap()
            .starts_with("Worker exception:"));
        assert!(exception.get("traceback").is_some());

        assert_eq!(lines[2]["id"], 2);
        assert_eq!(lines[2]["ok"], true);
    }

    #[test]
    fn test_mistyped_field_reports_worker_exception() {
        let input = json!({"command": "transcribe", "id": 3, "modelId": 5}).to_string() + "\n";
        let lines = run_lines(MockEngine::cpu_only(), &input);

        let exception = &lines[1];
        assert_eq!(exception["id"], Value::Null);
        assert_eq!(exception["ok"], false);
        assert!(exception["error"]
            .as_str()
            .unwrap()
            .starts_with("Worker exception:"));
    }

    #[test]
    fn test_unsupported_command_echoes_id() {
        let input = json!({"command": "reboot", "id": 9}).to_string() + "\n";
        let lines = run_lines(MockEngine::cpu_only(), &input);

        let response = &lines[1];
        assert_eq!(response["id"], 9);
        assert_eq!(response["ok"], false);
        assert_eq!(response["error"], "Unsupported command: reboot");
    }

    #[test]
    fn test_non_string_command_is_unsupported() {
        let input = json!({"command": 5}).to_string() + "\n";
        let lines = run_lines(MockEngine::cpu_only(), &input);

        let response = &lines[1];
        assert!(response.as_object().unwrap().contains_key("id"));
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"], "Unsupported command: 5");
    }

    #[test]
    fn test_shutdown_acknowledges_and_stops() {
        let input = format!(
            "{}\n{}\n",
            json!({"command": "shutdown"}),
            transcribe_line(json!("ignored"))
        );
        let lines = run_lines(MockEngine::cpu_only(), &input);

        assert_eq!(lines.len(), 2);
        let ack = lines[1].as_object().unwrap();
        assert_eq!(ack.len(), 2);
        assert_eq!(ack["ok"], true);
        assert_eq!(ack["shutdown"], true);
    }

    #[test]
    fn test_prefetch_round_trip() {
        let input = json!({"command": "prefetch", "id": "warm", "modelId": "large-v3"})
            .to_string()
            + "\n";
        let lines = run_lines(MockEngine::cpu_only(), &input);

        let response = &lines[1];
        assert_eq!(response["id"], "warm");
        assert_eq!(response["ok"], true);
        assert_eq!(response["runtimeCacheHit"], false);
        assert!(response.get("modelInitMs").is_some());
        assert!(response.get("text").is_none());
        assert!(response.get("decodeComputeMs").is_none());
    }

    #[test]
    fn test_requests_answered_in_order() {
        let input = format!(
            "{}\n{}\n",
            transcribe_line(json!("first")),
            transcribe_line(json!("second"))
        );
        let lines = run_lines(MockEngine::cpu_only(), &input);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["id"], "first");
        assert_eq!(lines[2]["id"], "second");
    }

    #[test]
    fn test_engine_failure_is_a_failure_envelope_not_an_exception() {
        let engine = MockEngine::cpu_only().with_load_failure(crate::types::Backend::Cpu);
        let input = transcribe_line(json!(11)) + "\n";
        let lines = run_lines(engine, &input);

        let response = &lines[1];
        assert_eq!(response["id"], 11);
        assert_eq!(response["ok"], false);
        assert_eq!(
            response["error"],
            "Transcription failed (cpu/int8): model load failed: scripted cpu load failure"
        );
        assert!(response.get("traceback").is_none());
    }
}
