//! Layer registry
//!
//! The ordered, read-only list of default layers. Built once per process
//! and handed to the engine by reference.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};

use super::definition::{LayerDefinition, LayerId, LayerOverrides};
use super::merge::merge_layers;
use crate::error::{DaxError, Result};

/// Environment variable naming an alternative layer file
pub const LAYERS_PATH_ENV: &str = "DAX_LAYERS_PATH";

/// The layer set shipped with the crate
pub const BUILTIN_LAYERS_JSON: &str = include_str!("../../config/layers.json");

static GLOBAL_REGISTRY: OnceLock<Arc<LayerRegistry>> = OnceLock::new();

/// Ordered default layer definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRegistry {
    layers: Vec<LayerDefinition>,
    fingerprint: String,
}

impl LayerRegistry {
    /// Parse and validate a JSON array of layer records
    pub fn from_json(source: &str) -> Result<Self> {
        let layers: Vec<LayerDefinition> =
            serde_json::from_str(source).map_err(|e| DaxError::InvalidRegistry {
                reason: format!("cannot parse layer records: {}", e),
                source: Some(e),
            })?;

        Self::validate(&layers)?;

        let fingerprint = hex_digest(source.as_bytes());

        Ok(Self {
            layers,
            fingerprint,
        })
    }

    /// Load a registry file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| DaxError::RegistryNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;

        let registry = Self::from_json(&content)?;
        tracing::debug!(
            "Loaded {} layers from {} ({})",
            registry.len(),
            path.display(),
            registry.short_fingerprint()
        );
        Ok(registry)
    }

    /// The embedded default layer set
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_LAYERS_JSON)
    }

    /// `DAX_LAYERS_PATH` if set, otherwise the embedded layers
    pub fn from_env() -> Result<Self> {
        match env::var(LAYERS_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => Self::builtin(),
        }
    }

    /// Process-wide registry, initialized from the environment on first use.
    ///
    /// Initialization failure is returned to every caller until it succeeds;
    /// a successfully built registry is never replaced.
    pub fn global() -> Result<Arc<LayerRegistry>> {
        if let Some(registry) = GLOBAL_REGISTRY.get() {
            return Ok(Arc::clone(registry));
        }

        let registry = Arc::new(Self::from_env()?);
        Ok(Arc::clone(GLOBAL_REGISTRY.get_or_init(|| registry)))
    }

    fn validate(layers: &[LayerDefinition]) -> Result<()> {
        if layers.is_empty() {
            return Err(DaxError::InvalidRegistry {
                reason: "registry contains no layers".to_string(),
                source: None,
            });
        }

        let mut seen = HashSet::new();
        for (index, layer) in layers.iter().enumerate() {
            if layer.id.as_str().trim().is_empty() {
                return Err(DaxError::InvalidRegistry {
                    reason: format!("layer at position {} has an empty id", index),
                    source: None,
                });
            }
            if layer.name.trim().is_empty() {
                return Err(DaxError::InvalidRegistry {
                    reason: format!("layer {} has an empty name", layer.id),
                    source: None,
                });
            }
            if !seen.insert(&layer.id) {
                return Err(DaxError::InvalidRegistry {
                    reason: format!("duplicate layer id {}", layer.id),
                    source: None,
                });
            }
        }

        Ok(())
    }

    /// Layers in execution order
    pub fn layers(&self) -> &[LayerDefinition] {
        &self.layers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayerDefinition> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get a layer by id
    pub fn get(&self, id: &LayerId) -> Option<&LayerDefinition> {
        self.layers.iter().find(|layer| &layer.id == id)
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.get(id).is_some()
    }

    /// Override ids that match no layer; these are ignored by the merge
    pub fn unknown_override_ids<'a>(&self, overrides: &'a LayerOverrides) -> Vec<&'a LayerId> {
        let mut unknown: Vec<&LayerId> =
            overrides.keys().filter(|id| !self.contains(id)).collect();
        unknown.sort();
        unknown
    }

    /// Effective layers for one run
    pub fn merged(&self, overrides: Option<&LayerOverrides>) -> Vec<LayerDefinition> {
        merge_layers(self, overrides)
    }

    /// SHA-256 of the source document, hex encoded
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..12]
    }
}

impl<'a> IntoIterator for &'a LayerRegistry {
    type Item = &'a LayerDefinition;
    type IntoIter = std::slice::Iter<'a, LayerDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
