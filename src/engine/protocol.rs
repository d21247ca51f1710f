//! Per-layer prompt construction and reply parsing
//!
//! The two response protocols are variants of `ResponseMode`; every place
//! that depends on the protocol matches on it exhaustively.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DaxError, Result};
use crate::layers::LayerDefinition;

/// Separator between the instruction block and the text being transformed
pub const PRIOR_OUTPUT_MARKER: &str = "Prior output:\n";

const PLAIN_INSTRUCTION: &str = "Respond with only the stabilized text. No meta-commentary.";

const AUDIT_INSTRUCTION: &str =
    "Respond strictly as JSON with keys output (stabilized text) and reason (brief audit note).";

/// How each layer must reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Bare stabilized text
    #[default]
    Plain,
    /// JSON object `{output, reason}`
    Audit,
}

/// Parsed result of one layer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerReply {
    pub output: String,
    /// Present only in audit mode
    pub reason: Option<String>,
}

impl ResponseMode {
    pub fn from_audit_flag(audit: bool) -> Self {
        if audit {
            ResponseMode::Audit
        } else {
            ResponseMode::Plain
        }
    }

    pub fn is_audit(&self) -> bool {
        matches!(self, ResponseMode::Audit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Plain => "plain",
            ResponseMode::Audit => "audit",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            ResponseMode::Plain => PLAIN_INSTRUCTION,
            ResponseMode::Audit => AUDIT_INSTRUCTION,
        }
    }

    /// The single user message sent for `layer` with `current` as input
    pub fn build_prompt(&self, layer: &LayerDefinition, current: &str) -> String {
        format!(
            "You are {} acting as {}.\nDuty: {}.\nProtocol: {}\n{}\n{}{}",
            layer.name,
            layer.agent,
            layer.desc,
            layer.prompt,
            self.instruction(),
            PRIOR_OUTPUT_MARKER,
            current
        )
    }

    /// Interpret a raw reply from `layer_name`
    pub fn parse_reply(&self, layer_name: &str, reply: String) -> Result<LayerReply> {
        match self {
            ResponseMode::Plain => Ok(LayerReply {
                output: reply,
                reason: None,
            }),
            ResponseMode::Audit => parse_audit_reply(layer_name, reply),
        }
    }
}

/// The text a prompt from `build_prompt` asks the layer to transform.
///
/// Splits after the first instruction line that precedes the marker, so a
/// marker inside the prior output stays part of it.
pub fn prior_output(prompt: &str) -> Option<&str> {
    [PLAIN_INSTRUCTION, AUDIT_INSTRUCTION]
        .iter()
        .filter_map(|instruction| {
            let header_end = format!("{}\n{}", instruction, PRIOR_OUTPUT_MARKER);
            prompt
                .find(&header_end)
                .map(|pos| pos + header_end.len())
        })
        .min()
        .map(|start| &prompt[start..])
}

fn parse_audit_reply(layer_name: &str, reply: String) -> Result<LayerReply> {
    let violation = |reason: &str, raw_reply: String, source: Option<serde_json::Error>| {
        DaxError::ProtocolViolation {
            layer: layer_name.to_string(),
            reason: reason.to_string(),
            raw_reply,
            source,
        }
    };

    let parsed: Value = match serde_json::from_str(&reply) {
        Ok(value) => value,
        Err(e) => return Err(violation("reply is not valid JSON", reply, Some(e))),
    };

    let Value::Object(object) = parsed else {
        return Err(violation("reply is not a JSON object", reply, None));
    };

    let output = match object.get("output") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(_) => return Err(violation("output is not a string", reply, None)),
    };

    let reason = match object.get("reason") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };

    Ok(LayerReply {
        output,
        reason: Some(reason),
    })
}
