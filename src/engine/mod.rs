//! Recursion Engine Module
//!
//! Runs the layer pipeline:
//! - Protocol: per-layer prompt and the plain/audit reply formats
//! - Recursion: sequential layer execution over a transport
//! - Trace: the per-layer record returned with the final output

mod protocol;
mod recursion;
mod trace;

pub use protocol::{prior_output, LayerReply, ResponseMode, PRIOR_OUTPUT_MARKER};
pub use recursion::{run_dax, RecursionEngine, RunRequest};
pub use trace::{RunResult, TraceEntry};
