//! DAX - Layer Recursion Pipeline
//!
//! Text passes through an ordered chain of layers. Each layer asks a
//! remote chat-completions service to restate the previous layer's output
//! under its own persona and duty, and the run returns the final text with
//! a per-layer trace.
//!
//! # Architecture
//!
//! - Layers: the immutable default registry and per-run overrides
//! - Transport: the single-method boundary to the remote service
//! - Engine: sequential layer execution in plain or audit mode

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod layers;
pub mod transport;

pub use config::DaxConfig;
pub use engine::{run_dax, RecursionEngine, ResponseMode, RunRequest, RunResult, TraceEntry};
pub use error::{DaxError, ErrorCategory, Result};
pub use layers::{LayerDefinition, LayerId, LayerOverride, LayerOverrides, LayerRegistry};
pub use transport::{ChatMessage, HttpTransport, Role, Transport};
