//! Runtime configuration
//!
//! Read from the environment; CLI flags layer on top.

use std::env;
use std::path::PathBuf;

use crate::error::{DaxError, Result};
use crate::layers::{LayerRegistry, LAYERS_PATH_ENV};
use crate::transport::{
    HttpTransportConfig, DEFAULT_API_URL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_MS,
};

pub const DEFAULT_MODEL: &str = "grok-4";

pub const API_KEY_ENV: &str = "DAX_API_KEY";
/// Accepted when `DAX_API_KEY` is unset
pub const FALLBACK_API_KEY_ENV: &str = "XAI_API_KEY";
pub const MODEL_ENV: &str = "DAX_MODEL";
pub const API_URL_ENV: &str = "DAX_API_URL";
pub const TIMEOUT_ENV: &str = "DAX_TIMEOUT_MS";

/// Everything needed to build a registry and the default transport
#[derive(Debug, Clone, PartialEq)]
pub struct DaxConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub http: HttpTransportConfig,
    /// Layer file; `None` means the built-in layers
    pub layers_path: Option<PathBuf>,
}

impl Default for DaxConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            http: HttpTransportConfig::default(),
            layers_path: None,
        }
    }
}

impl DaxConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_ms = match get(TIMEOUT_ENV) {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(
                    "Ignoring {}={:?}: not a number of milliseconds",
                    TIMEOUT_ENV,
                    raw
                );
                DEFAULT_TIMEOUT_MS
            }),
            None => DEFAULT_TIMEOUT_MS,
        };

        Self {
            api_key: get(API_KEY_ENV).or_else(|| get(FALLBACK_API_KEY_ENV)),
            model: get(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            http: HttpTransportConfig {
                api_url: get(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                timeout_ms,
                temperature: DEFAULT_TEMPERATURE,
            },
            layers_path: get(LAYERS_PATH_ENV).map(PathBuf::from),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if api_key.is_some() {
            self.api_key = api_key;
        }
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }

    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(api_url) = api_url {
            self.http.api_url = api_url;
        }
        self
    }

    pub fn with_layers_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.layers_path = path;
        }
        self
    }

    /// The configured credential, or a configuration error
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(DaxError::MissingCredential)
    }

    /// Load the layer file if one is configured, else the built-in layers
    pub fn load_registry(&self) -> Result<LayerRegistry> {
        match &self.layers_path {
            Some(path) => LayerRegistry::load(path),
            None => LayerRegistry::builtin(),
        }
    }
}
