//! Run results and per-layer trace entries

use serde::{Deserialize, Serialize};

/// One layer's contribution to a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Layer display name
    pub layer: String,

    /// Text the layer produced
    pub output: String,

    /// Audit note; only present when the run used audit mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Final text plus the ordered trace that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub output: String,
    pub trace: Vec<TraceEntry>,
}

impl RunResult {
    pub fn layer_count(&self) -> usize {
        self.trace.len()
    }

    /// Layers whose output differs from their input
    pub fn changed_layers(&self, input: &str) -> Vec<&str> {
        let mut previous = input;
        let mut changed = Vec::new();
        for entry in &self.trace {
            if entry.output != previous {
                changed.push(entry.layer.as_str());
            }
            previous = &entry.output;
        }
        changed
    }
}
