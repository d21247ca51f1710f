//! Error handling for DAX
//!
//! Every failure aborts the whole run. Errors carry enough context (status,
//! body, raw reply) to diagnose without re-running.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for DAX operations
pub type Result<T> = std::result::Result<T, DaxError>;

/// Boxed cause attached to transport failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Broad class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad credential or layer registry; nothing can run
    Configuration,
    /// The remote call failed or returned an unusable body
    Transport,
    /// An audit-mode reply was not the expected JSON object
    ProtocolViolation,
}

/// Main error type for DAX operations
#[derive(Error, Debug)]
pub enum DaxError {
    // Configuration Errors
    #[error("Missing credential: an API key is required")]
    MissingCredential,

    #[error("Layer registry not found: {path}")]
    RegistryNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid layer registry: {reason}")]
    InvalidRegistry {
        reason: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Transport Errors
    #[error("Transport failure: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        body: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Transport timed out after {timeout_ms}ms")]
    TransportTimeout { timeout_ms: u64 },

    #[error("Cannot connect to {endpoint}: {message}")]
    TransportUnavailable { endpoint: String, message: String },

    // Protocol Errors
    #[error("{layer} violated the audit protocol ({reason}): {raw_reply}")]
    ProtocolViolation {
        layer: String,
        reason: String,
        raw_reply: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl DaxError {
    /// Transport failure with only a message
    pub fn transport(message: impl Into<String>) -> Self {
        DaxError::Transport {
            message: message.into(),
            status: None,
            body: None,
            source: None,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            DaxError::MissingCredential => "MISSING_CREDENTIAL",
            DaxError::RegistryNotFound { .. } => "REGISTRY_NOT_FOUND",
            DaxError::InvalidRegistry { .. } => "INVALID_REGISTRY",
            DaxError::InvalidConfig { .. } => "INVALID_CONFIG",
            DaxError::Transport { .. } => "TRANSPORT_ERROR",
            DaxError::TransportTimeout { .. } => "TRANSPORT_TIMEOUT",
            DaxError::TransportUnavailable { .. } => "TRANSPORT_UNAVAILABLE",
            DaxError::ProtocolViolation { .. } => "PROTOCOL_VIOLATION",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DaxError::MissingCredential
            | DaxError::RegistryNotFound { .. }
            | DaxError::InvalidRegistry { .. }
            | DaxError::InvalidConfig { .. } => ErrorCategory::Configuration,
            DaxError::Transport { .. }
            | DaxError::TransportTimeout { .. }
            | DaxError::TransportUnavailable { .. } => ErrorCategory::Transport,
            DaxError::ProtocolViolation { .. } => ErrorCategory::ProtocolViolation,
        }
    }

    /// Returns true if re-running the whole run might succeed.
    ///
    /// The engine itself never retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            DaxError::TransportTimeout { .. } | DaxError::TransportUnavailable { .. } => true,
            DaxError::Transport {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            DaxError::MissingCredential => Some("Set DAX_API_KEY or pass --api-key."),
            DaxError::RegistryNotFound { .. } => {
                Some("Check DAX_LAYERS_PATH or omit it to use the built-in layers.")
            }
            DaxError::InvalidRegistry { .. } => Some(
                "The layer file must be a JSON array of {id, name, agent, desc, prompt} with unique ids.",
            ),
            DaxError::TransportTimeout { .. } => {
                Some("Raise DAX_TIMEOUT_MS or retry the run later.")
            }
            DaxError::TransportUnavailable { .. } => {
                Some("Check network access and DAX_API_URL.")
            }
            DaxError::ProtocolViolation { .. } => {
                Some("Run without --audit, or tighten the layer prompt so it replies with JSON.")
            }
            _ => None,
        }
    }
}
