// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Error types
//!
//! Every failure is local to the operation that raised it: graph errors at
//! build time, resolution errors for the specific call attempted, and step
//! failures with the arguments that triggered them.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeflow operations
pub type PipeflowResult<T> = Result<T, PipeflowError>;

/// Main error type for pipeflow
#[derive(Error, Debug, Diagnostic)]
pub enum PipeflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Output '{output}' is declared by both '{first}' and '{second}'")]
    #[diagnostic(
        code(pipeflow::duplicate_output),
        help("Every output name must be produced by exactly one step")
    )]
    DuplicateOutput {
        output: String,
        first: String,
        second: String,
    },

    #[error("Dependency cycle detected: {}", steps.join(" -> "))]
    #[diagnostic(
        code(pipeflow::cycle),
        help("A step cannot (transitively) consume its own output")
    )]
    Cycle { steps: Vec<String> },

    #[error("Parameter '{parameter}' has conflicting defaults in '{first}' and '{second}'")]
    #[diagnostic(code(pipeflow::conflicting_defaults))]
    ConflictingDefaults {
        parameter: String,
        first: String,
        second: String,
    },

    #[error("No step produces output '{output}'")]
    #[diagnostic(code(pipeflow::unknown_output))]
    UnknownOutput {
        output: String,
        #[help]
        help: Option<String>,
    },

    #[error("Cannot reduce graph for '{output}': {reason}")]
    #[diagnostic(
        code(pipeflow::merge_conflict),
        help("The original pipeline is unchanged and can still be used")
    )]
    MergeConflict { output: String, reason: String },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(pipeflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Cannot compute '{output}': missing inputs {}", missing.join(", "))]
    #[diagnostic(
        code(pipeflow::unresolvable_input),
        help("Supply the missing root arguments or an intermediate value that bypasses them")
    )]
    UnresolvableInput { output: String, missing: Vec<String> },

    #[error("'{output}' takes {expected} root arguments ({}), got {got}", root_args.join(", "))]
    #[diagnostic(code(pipeflow::arity))]
    Arity {
        output: String,
        expected: usize,
        got: usize,
        root_args: Vec<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Step '{step}' failed with ({arguments}): {error}")]
    #[diagnostic(code(pipeflow::step_failed))]
    StepFailed {
        step: String,
        arguments: String,
        error: String,
    },

    #[error("Step '{step}' returned a value that has no '{output}' output: {reason}")]
    #[diagnostic(
        code(pipeflow::output_picking),
        help("Return an array aligned with the declared outputs, an object keyed by them, or set an output picker")
    )]
    OutputPicking {
        step: String,
        output: String,
        reason: String,
    },

    #[error("Step '{step}' has no implementation bound")]
    #[diagnostic(
        code(pipeflow::missing_implementation),
        help("Register a function named '{step}' in the StepRegistry before building the pipeline")
    )]
    MissingImplementation { step: String },

    #[error("Worker failed: {message}")]
    #[diagnostic(code(pipeflow::worker_failed))]
    WorkerFailed { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Sweep Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid sweep: {reason}")]
    #[diagnostic(code(pipeflow::invalid_sweep))]
    InvalidSweep { reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Cache Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Cache error: {message}")]
    #[diagnostic(code(pipeflow::cache_error))]
    CacheError { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipeflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(pipeflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(pipeflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(pipeflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(pipeflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for PipeflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipeflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipeflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PipeflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl PipeflowError {
    /// Create an unknown output error, suggesting close matches
    pub fn unknown_output<'a>(output: &str, known: impl IntoIterator<Item = &'a str>) -> Self {
        let candidates: Vec<&str> = known
            .into_iter()
            .filter(|k| k.starts_with(output) || output.starts_with(*k))
            .collect();

        let help = if candidates.is_empty() {
            None
        } else {
            Some(format!("Did you mean: {}?", candidates.join(", ")))
        };

        Self::UnknownOutput {
            output: output.to_string(),
            help,
        }
    }

    /// Wrap a failure raised by a step's callable
    pub fn step_failed(step: &str, arguments: &crate::Kwargs, error: anyhow::Error) -> Self {
        Self::StepFailed {
            step: step.to_string(),
            arguments: format_kwargs(arguments),
            error: format!("{:#}", error),
        }
    }

    /// Whether this error was raised while building or reducing a graph
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateOutput { .. }
                | Self::Cycle { .. }
                | Self::ConflictingDefaults { .. }
                | Self::MergeConflict { .. }
        )
    }
}

/// Format keyword arguments as `k=v, ...`
pub fn format_kwargs(kwargs: &crate::Kwargs) -> String {
    kwargs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
