// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline definition files
//!
//! Describes step signatures in YAML or TOML. Implementations are attached
//! at load time through a [`StepRegistry`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineGraph, Step, StepRegistry};
use crate::Kwargs;

/// A pipeline described in a definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Definition format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Steps in declaration order
    pub steps: Vec<StepDefinition>,

    /// Construction options
    #[serde(default)]
    pub config: PipelineConfig,
}

fn default_version() -> String {
    "1".to_string()
}

impl PipelineDefinition {
    /// Load a definition, picking the format from the file extension
    ///
    /// `.toml` files are read as TOML, everything else as YAML.
    pub fn from_file(path: &Path) -> PipeflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipeflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> PipeflowResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn from_toml(source: &str) -> PipeflowResult<Self> {
        toml::from_str(source).map_err(Into::into)
    }

    pub fn to_yaml(&self) -> PipeflowResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Signature-only steps, enough for graph queries
    pub fn signatures(&self) -> Vec<Step> {
        self.steps.iter().map(StepDefinition::signature).collect()
    }

    /// Build the dependency graph without binding implementations
    pub fn graph(&self) -> PipeflowResult<PipelineGraph> {
        PipelineGraph::build(self.signatures().into_iter().map(Into::into).collect())
    }

    /// Bind every step to its registered implementation and build a pipeline
    ///
    /// Steps with no implementation stay signature-only and fail with
    /// `MissingImplementation` if they are ever invoked.
    pub fn build(&self, registry: &StepRegistry) -> PipeflowResult<Pipeline> {
        let steps = self.steps.iter().map(|s| s.bind(registry)).collect();
        Pipeline::new(steps, self.config.clone())
    }
}

/// One step of a definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step name (must be unique within the pipeline)
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Registry name of the implementation; the step name when absent
    #[serde(default)]
    pub function: Option<String>,

    /// Parameter names in call order
    #[serde(default, alias = "params")]
    pub parameters: Vec<String>,

    /// Parameter defaults
    #[serde(default)]
    pub defaults: Kwargs,

    /// Produced output name(s)
    pub output: OutputSpec,

    /// Registry name of the output picker for multi-output steps
    #[serde(default)]
    pub picker: Option<String>,

    #[serde(default)]
    pub cache: bool,

    #[serde(default)]
    pub profile: bool,
}

impl StepDefinition {
    /// Name used to look the implementation up in a registry
    pub fn function_name(&self) -> &str {
        self.function.as_deref().unwrap_or(&self.name)
    }

    /// The step without an implementation
    pub fn signature(&self) -> Step {
        let outputs = self.output.names();
        let first = outputs.first().cloned().unwrap_or_default();

        Step::signature(self.name.clone(), self.parameters.iter().cloned(), first)
            .with_outputs(outputs)
            .with_defaults(self.defaults.clone())
            .with_cache(self.cache)
            .with_profile(self.profile)
    }

    /// The step bound to whatever `registry` holds for it
    pub fn bind(&self, registry: &StepRegistry) -> Step {
        let mut step = self.signature();

        match registry.get(self.function_name()) {
            Some(func) => step = step.with_func(func.clone()),
            None => tracing::warn!(
                step = %self.name,
                function = %self.function_name(),
                "no implementation registered, step is signature-only"
            ),
        }

        if let Some(name) = &self.picker {
            match registry.picker(name) {
                Some(picker) => step = step.with_shared_picker(Some(picker.clone())),
                None => tracing::warn!(step = %self.name, picker = %name, "unknown output picker"),
            }
        }

        step
    }
}

/// Output declaration: one name or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    Single(String),
    Multiple(Vec<String>),
}

impl OutputSpec {
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::Single(name) => vec![name.clone()],
            Self::Multiple(names) => names.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(name) => name.is_empty(),
            Self::Multiple(names) => names.is_empty(),
        }
    }
}
