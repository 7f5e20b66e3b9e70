// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline validation
//!
//! Checks a pipeline definition before it is bound and run.

use std::collections::HashSet;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::{CacheMode, PipelineDefinition, PipelineGraph, StepRegistry};
use crate::sweep::Combinations;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a definition, optionally against a registry of implementations
    pub fn validate(
        definition: &PipelineDefinition,
        registry: Option<&StepRegistry>,
    ) -> PipeflowResult<ValidationResult> {
        let mut result = ValidationResult::new();

        if definition.steps.is_empty() {
            result.add_error("Pipeline has no steps defined");
        }

        let mut seen_names = HashSet::new();
        for step in &definition.steps {
            if !seen_names.insert(step.name.as_str()) {
                result.add_error(&format!("Duplicate step name: '{}'", step.name));
            }
            if step.output.is_empty() {
                result.add_error(&format!("Step '{}': declares no outputs", step.name));
            }
        }

        // Graph errors only make sense once every step is well formed.
        let graph = if result.is_valid() {
            match definition.graph() {
                Ok(graph) => Some(graph),
                Err(PipeflowError::Cycle { steps }) => {
                    result.add_error(&format!("Circular dependency: {}", steps.join(" → ")));
                    None
                }
                Err(PipeflowError::DuplicateOutput { output, first, second }) => {
                    result.add_error(&format!(
                        "Output '{}' is produced by both '{}' and '{}'",
                        output, first, second
                    ));
                    None
                }
                Err(e) => {
                    result.add_error(&format!("Graph validation error: {}", e));
                    None
                }
            }
        } else {
            None
        };

        if let Some(graph) = &graph {
            Self::check_defaults(graph, &mut result);
        }

        if definition.config.cache == CacheMode::None {
            for step in definition.steps.iter().filter(|s| s.cache) {
                result.add_warning(&format!(
                    "Step '{}': requests caching but the pipeline cache mode is 'none'",
                    step.name
                ));
            }
        }

        if let Some(registry) = registry {
            for step in &definition.steps {
                if !registry.contains(step.function_name()) {
                    result.add_warning(&format!(
                        "Step '{}': no implementation registered as '{}'",
                        step.name,
                        step.function_name()
                    ));
                }
                if let Some(picker) = &step.picker {
                    if registry.picker(picker).is_none() {
                        result.add_error(&format!(
                            "Step '{}': unknown output picker '{}'",
                            step.name, picker
                        ));
                    }
                }
            }
        }

        Ok(result)
    }

    /// Defaults on parameters another step produces are only used when the
    /// producer is bypassed
    fn check_defaults(graph: &PipelineGraph, result: &mut ValidationResult) {
        for step in graph.steps() {
            for name in step.defaults().keys() {
                if let Some(producer) = graph.producer(name) {
                    result.add_warning(&format!(
                        "Step '{}': default for '{}' is shadowed by step '{}'",
                        step.name(),
                        name,
                        graph.step(producer).name()
                    ));
                }
            }
        }
    }

    /// Root arguments of `output` that neither the sweep nor a default provides
    pub fn missing_sweep_inputs<C>(
        graph: &PipelineGraph,
        output: &str,
        sweep: &C,
    ) -> PipeflowResult<Vec<String>>
    where
        C: Combinations + ?Sized,
    {
        let Some(point) = sweep.combinations().next() else {
            return Err(PipeflowError::InvalidSweep {
                reason: "the sweep has no points".into(),
            });
        };

        Ok(graph
            .root_args(output)?
            .into_iter()
            .filter(|arg| !point.contains_key(arg) && graph.default_for(arg).is_none())
            .collect())
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
