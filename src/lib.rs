//! The `asr_worker` core library.
//!
//! This crate provides a long-lived speech transcription worker that
//! serves line-delimited JSON requests over standard input/output,
//! deciding the execution backend and numeric precision per request and
//! caching loaded models for the life of the process.

pub mod asr;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod server;
pub mod types;
