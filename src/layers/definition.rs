//! Layer definitions and partial overrides

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DaxError, Result};

/// Stable layer identifier, used as the override-merge key.
///
/// Sources may spell ids as strings or small integers; both normalize to
/// the same string key so `{"3": {...}}` matches a layer declared with `"id": 3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u32> for LayerId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for LayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => LayerId(s),
            RawId::Number(n) => LayerId(n.to_string()),
        })
    }
}

/// One stage of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDefinition {
    /// Unique within a registry
    pub id: LayerId,

    /// Display name, used in trace entries and in the prompt
    pub name: String,

    /// Persona the remote service should simulate
    pub agent: String,

    /// One-line duty description interpolated into the prompt
    pub desc: String,

    /// Layer-specific instruction
    pub prompt: String,
}

impl LayerDefinition {
    /// Shallow merge: each present override field replaces the default.
    pub fn with_override(&self, layer_override: &LayerOverride) -> LayerDefinition {
        let pick = |over: &Option<String>, default: &String| {
            over.clone().unwrap_or_else(|| default.clone())
        };

        LayerDefinition {
            id: self.id.clone(),
            name: pick(&layer_override.name, &self.name),
            agent: pick(&layer_override.agent, &self.agent),
            desc: pick(&layer_override.desc, &self.desc),
            prompt: pick(&layer_override.prompt, &self.prompt),
        }
    }
}

/// Partial, caller-supplied replacement for a layer's fields.
///
/// Absent and `null` fields both fall back to the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl LayerOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_agent(mut self, agent: &str) -> Self {
        self.agent = Some(agent.to_string());
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.desc = Some(desc.to_string());
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = Some(prompt.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.agent.is_none() && self.desc.is_none() && self.prompt.is_none()
    }
}

/// Overrides keyed by layer id
pub type LayerOverrides = HashMap<LayerId, LayerOverride>;

/// Parse an overrides document: `{"<id>": {"prompt": "..."}, ...}`
pub fn parse_overrides(json: &str) -> Result<LayerOverrides> {
    serde_json::from_str(json).map_err(|e| DaxError::InvalidConfig {
        reason: format!("overrides must be a JSON object keyed by layer id: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LayerDefinition {
        LayerDefinition {
            id: LayerId::new("1"),
            name: "DA-1".to_string(),
            agent: "Intake Clerk".to_string(),
            desc: "Normalize".to_string(),
            prompt: "Fix spacing.".to_string(),
        }
    }

    #[test]
    fn test_numeric_and_string_ids_normalize() {
        let numeric: LayerId = serde_json::from_str("7").unwrap();
        let text: LayerId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(numeric, text);
        assert_eq!(numeric.as_str(), "7");
    }

    #[test]
    fn test_with_override_replaces_present_fields_only() {
        let merged = sample().with_override(&LayerOverride::new().with_prompt("Shout."));

        assert_eq!(merged.prompt, "Shout.");
        assert_eq!(merged.name, "DA-1");
        assert_eq!(merged.agent, "Intake Clerk");
        assert_eq!(merged.desc, "Normalize");
    }

    #[test]
    fn test_empty_override_is_identity() {
        let layer = sample();
        assert_eq!(layer.with_override(&LayerOverride::new()), layer);
    }

    #[test]
    fn test_parse_overrides_treats_null_as_absent() {
        let overrides = parse_overrides(r#"{"1": {"name": null, "agent": "Critic"}}"#).unwrap();
        let entry = &overrides[&LayerId::from("1")];

        assert_eq!(entry.name, None);
        assert_eq!(entry.agent.as_deref(), Some("Critic"));
    }

    #[test]
    fn test_parse_overrides_rejects_non_object() {
        let err = parse_overrides("[1, 2]").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
