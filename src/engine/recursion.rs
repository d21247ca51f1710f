//! Recursion engine
//!
//! Drives the effective layer list in order, one transport call per layer,
//! each layer consuming the previous layer's output. The first failure
//! aborts the run and no partial trace escapes.

use std::sync::Arc;
use std::time::Instant;

use super::protocol::ResponseMode;
use super::trace::{RunResult, TraceEntry};
use crate::config::{DaxConfig, DEFAULT_MODEL};
use crate::error::{DaxError, Result};
use crate::layers::{LayerOverrides, LayerRegistry};
use crate::transport::{ChatMessage, HttpTransport, HttpTransportConfig, Transport};

/// Everything one run needs. Built per call, consumed by `run`.
pub struct RunRequest {
    pub input: String,
    pub credential: String,
    pub model: String,
    pub overrides: Option<LayerOverrides>,
    pub mode: ResponseMode,
    /// Replaces the default HTTP transport when set
    pub transport: Option<Arc<dyn Transport>>,
}

impl RunRequest {
    pub fn new(input: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            credential: credential.into(),
            model: DEFAULT_MODEL.to_string(),
            overrides: None,
            mode: ResponseMode::Plain,
            transport: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_overrides(mut self, overrides: LayerOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn audit(self) -> Self {
        self.with_mode(ResponseMode::Audit)
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

impl std::fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("input_len", &self.input.len())
            .field("credential", &"<redacted>")
            .field("model", &self.model)
            .field("overrides", &self.overrides)
            .field("mode", &self.mode)
            .field(
                "transport",
                &self.transport.as_ref().map(|t| t.name().to_string()),
            )
            .finish()
    }
}

/// Owns the registry reference and the default transport settings.
///
/// Holds no per-run state, so one engine can serve concurrent runs.
#[derive(Debug, Clone)]
pub struct RecursionEngine {
    registry: Arc<LayerRegistry>,
    http: HttpTransportConfig,
}

impl RecursionEngine {
    pub fn new(registry: Arc<LayerRegistry>) -> Self {
        Self::with_http_config(registry, HttpTransportConfig::default())
    }

    pub fn with_http_config(registry: Arc<LayerRegistry>, http: HttpTransportConfig) -> Self {
        Self { registry, http }
    }

    /// Registry from `config.layers_path` (or built-in) plus its HTTP settings
    pub fn from_config(config: &DaxConfig) -> Result<Self> {
        let registry = Arc::new(config.load_registry()?);
        Ok(Self::with_http_config(registry, config.http.clone()))
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn http_config(&self) -> &HttpTransportConfig {
        &self.http
    }

    /// Run every layer over `request.input`
    pub fn run(&self, request: RunRequest) -> Result<RunResult> {
        if request.credential.trim().is_empty() {
            return Err(DaxError::MissingCredential);
        }

        let RunRequest {
            input,
            credential,
            model,
            overrides,
            mode,
            transport,
        } = request;

        if let Some(overrides) = &overrides {
            let unknown = self.registry.unknown_override_ids(overrides);
            if !unknown.is_empty() {
                tracing::debug!("Ignoring overrides for unknown layer ids: {:?}", unknown);
            }
        }
        let layers = self.registry.merged(overrides.as_ref());

        let transport: Arc<dyn Transport> = match transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::with_config(
                &credential,
                &model,
                self.http.clone(),
            )),
        };

        tracing::info!(
            "Starting {} run: {} layers via {} transport (model {})",
            mode.as_str(),
            layers.len(),
            transport.name(),
            model
        );
        let started = Instant::now();

        let mut current = input;
        let mut trace = Vec::with_capacity(layers.len());

        for (index, layer) in layers.iter().enumerate() {
            tracing::debug!("[{}/{}] {} ({})", index + 1, layers.len(), layer.name, layer.agent);

            let messages = [ChatMessage::user(mode.build_prompt(layer, &current))];

            let reply = transport.send(&messages).map_err(|err| {
                tracing::warn!("{} transport failed: {}", layer.name, err);
                err
            })?;

            let parsed = mode.parse_reply(&layer.name, reply).map_err(|err| {
                tracing::warn!("{} reply rejected: {}", layer.name, err);
                err
            })?;

            current = parsed.output;
            trace.push(TraceEntry {
                layer: layer.name.clone(),
                output: current.clone(),
                reason: parsed.reason,
            });
        }

        tracing::info!(
            "Run complete: {} layers in {}ms",
            trace.len(),
            started.elapsed().as_millis()
        );

        Ok(RunResult {
            output: current,
            trace,
        })
    }
}

/// Run against the process-wide registry with settings from the environment.
///
/// Callers that manage their own registry should hold a `RecursionEngine`.
pub fn run_dax(request: RunRequest) -> Result<RunResult> {
    if request.credential.trim().is_empty() {
        return Err(DaxError::MissingCredential);
    }
    let engine =
        RecursionEngine::with_http_config(LayerRegistry::global()?, DaxConfig::from_env().http);
    engine.run(request)
}
