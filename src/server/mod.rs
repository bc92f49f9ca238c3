//! Worker protocol implementation.
//!
//! This module provides the line-delimited JSON request loop that the
//! host process drives over standard input and output.

mod metrics;
mod runloop;
mod state;

pub use metrics::WorkerMetrics;
pub use runloop::run;
pub use state::WorkerState;
