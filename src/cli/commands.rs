//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use walkdir::WalkDir;

use super::report::RunReport;
use super::ServiceArgs;
use crate::config::DaxConfig;
use crate::engine::{RecursionEngine, ResponseMode, RunRequest, RunResult};
use crate::layers::{parse_overrides, LayerOverrides};
use crate::transport::Transport;

/// Resolved settings for one CLI invocation
pub struct Session {
    pub config: DaxConfig,
    pub engine: RecursionEngine,
    pub overrides: Option<LayerOverrides>,
    pub mode: ResponseMode,
}

impl Session {
    /// Environment first, then command-line flags on top
    pub fn from_args(args: &ServiceArgs) -> Result<Self> {
        let config = DaxConfig::from_env()
            .with_api_key(args.api_key.clone())
            .with_model(args.model.clone())
            .with_api_url(args.api_url.clone())
            .with_layers_path(args.layers.clone());
        Self::with_config(config, args)
    }

    pub fn with_config(config: DaxConfig, args: &ServiceArgs) -> Result<Self> {
        let engine = RecursionEngine::from_config(&config)?;
        let overrides = match &args.overrides {
            Some(path) => Some(load_overrides(path)?),
            None => None,
        };

        if let Some(overrides) = &overrides {
            for id in engine.registry().unknown_override_ids(overrides) {
                warn!("Override for unknown layer id {} will be ignored", id);
            }
        }

        Ok(Self {
            config,
            engine,
            overrides,
            mode: ResponseMode::from_audit_flag(args.audit),
        })
    }

    /// Build the request for one input; `transport` replaces the HTTP default
    pub fn request(&self, input: &str, transport: Option<Arc<dyn Transport>>) -> RunRequest {
        let mut request = RunRequest::new(input, self.config.api_key.clone().unwrap_or_default())
            .with_model(self.config.model.clone())
            .with_mode(self.mode);
        if let Some(overrides) = &self.overrides {
            request = request.with_overrides(overrides.clone());
        }
        if let Some(transport) = transport {
            request = request.with_transport(transport);
        }
        request
    }

    pub fn report(&self, input: &str, result: RunResult) -> RunReport {
        RunReport::new(
            &self.config.model,
            self.mode,
            self.engine.registry().fingerprint(),
            input,
            result,
        )
    }
}

/// Read an overrides file
pub fn load_overrides(path: &Path) -> Result<LayerOverrides> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading overrides {}", path.display()))?;
    let overrides = parse_overrides(&content)
        .with_context(|| format!("parsing overrides {}", path.display()))?;
    Ok(overrides)
}

/// Run a single input through every layer.
pub fn run(
    input: Option<&str>,
    input_file: Option<&Path>,
    report: Option<&Path>,
    show_trace: bool,
    service: &ServiceArgs,
) -> Result<()> {
    let text = match (input, input_file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading input {}", path.display()))?,
        (None, None) => bail!("provide --input or --input-file"),
    };

    let session = Session::from_args(service)?;
    session.config.require_api_key()?;
    info!(
        "Running {} layers ({} mode, model {})",
        session.engine.registry().len(),
        session.mode.as_str(),
        session.config.model
    );

    let result = session.engine.run(session.request(&text, None))?;

    if show_trace {
        print_trace(&text, &result);
    }
    println!("{}", result.output);

    if let Some(path) = report {
        session.report(&text, result).write_to(path)?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}

fn print_trace(input: &str, result: &RunResult) {
    for entry in &result.trace {
        println!("=== {} ===", entry.layer);
        println!("{}", entry.output);
        if let Some(reason) = &entry.reason {
            println!("  reason: {}", reason);
        }
    }
    println!("{:-<60}", "");
    println!("{}", trace_summary(input, result));
}

/// One-line account of which layers rewrote their input
pub fn trace_summary(input: &str, result: &RunResult) -> String {
    let changed = result.changed_layers(input);
    if changed.is_empty() {
        return format!("{} layers, none changed the text", result.layer_count());
    }
    format!(
        "{} layers, {} changed the text: {}",
        result.layer_count(),
        changed.len(),
        changed.join(", ")
    )
}

/// Print the effective layer list.
pub fn layers(json: bool, service: &ServiceArgs) -> Result<()> {
    let session = Session::from_args(service)?;
    let merged = session.engine.registry().merged(session.overrides.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&merged)?);
        return Ok(());
    }

    println!(
        "Layer registry ({} layers, {})",
        merged.len(),
        session.engine.registry().short_fingerprint()
    );
    println!("{:-<60}", "");
    for layer in &merged {
        println!("{:>4}  {} ({})", layer.id, layer.name, layer.agent);
        println!("      Duty: {}", layer.desc);
        println!("      Prompt: {}", layer.prompt);
    }

    Ok(())
}

/// Outcome of a batch run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// `*.txt` files under `dir`, sorted by path
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("input directory not found: {}", dir.display());
    }

    let mut inputs = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            inputs.push(path.to_path_buf());
        }
    }
    Ok(inputs)
}

/// Report path for `input`, mirroring its location under `dir`
fn report_path(dir: &Path, out: &Path, input: &Path) -> PathBuf {
    let relative = input.strip_prefix(dir).unwrap_or(input);
    out.join(relative).with_extension("json")
}

/// Run each input in turn. A failing input is recorded and the batch moves on.
///
/// A missing credential fails the whole batch before any input is read.
pub fn run_batch(
    session: &Session,
    dir: &Path,
    out: &Path,
    transport: Option<Arc<dyn Transport>>,
) -> Result<BatchSummary> {
    session.config.require_api_key()?;
    let inputs = collect_inputs(dir)?;
    info!("Batch: {} input(s) under {}", inputs.len(), dir.display());

    let mut summary = BatchSummary::default();
    for input in inputs {
        let outcome = fs::read_to_string(&input)
            .with_context(|| format!("reading input {}", input.display()))
            .and_then(|text| {
                let result = session.engine.run(session.request(&text, transport.clone()))?;
                session
                    .report(&text, result)
                    .write_to(&report_path(dir, out, &input))
            });

        match outcome {
            Ok(()) => {
                info!("{}: ok", input.display());
                summary.succeeded.push(input);
            }
            Err(err) => {
                warn!("{}: {:#}", input.display(), err);
                summary.failed.push((input, format!("{:#}", err)));
            }
        }
    }

    Ok(summary)
}

/// Run every input under a directory and write one report each.
pub fn batch(dir: &Path, out: &Path, service: &ServiceArgs) -> Result<()> {
    let session = Session::from_args(service)?;
    let summary = run_batch(&session, dir, out, None)?;

    println!(
        "Batch complete: {} succeeded, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
    for (path, err) in &summary.failed {
        println!("  {}: {}", path.display(), err);
    }

    if !summary.failed.is_empty() {
        bail!("{} of {} inputs failed", summary.failed.len(), summary.total());
    }
    Ok(())
}
