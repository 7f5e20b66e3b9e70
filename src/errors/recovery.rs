// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from graph errors.

use super::PipeflowError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest a fix for an error, if one is known
    pub fn for_error(error: &PipeflowError) -> Option<Self> {
        match error {
            PipeflowError::DuplicateOutput {
                output,
                first,
                second,
            } => Some(Self::fix_duplicate_output(output, first, second)),
            PipeflowError::Cycle { steps } => Some(Self::fix_cycle(steps)),
            PipeflowError::UnresolvableInput { output, missing } => {
                Some(Self::supply_inputs(output, missing))
            }
            PipeflowError::ConflictingDefaults { parameter, .. } => Some(Self {
                action: format!("Use one default for '{}'", parameter),
                steps: vec![
                    "Root parameters share a single value across the pipeline".into(),
                    "Make the defaults agree or remove all but one".into(),
                ],
                commands: vec![],
            }),
            _ => None,
        }
    }

    /// Suggest fixing a duplicated output declaration
    pub fn fix_duplicate_output(output: &str, first: &str, second: &str) -> Self {
        Self {
            action: format!("Rename one of the '{}' outputs", output),
            steps: vec![
                format!("'{}' and '{}' both declare '{}'", first, second, output),
                "Consumers find their inputs by name, so names must be unique".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest fixing a dependency cycle
    pub fn fix_cycle(steps: &[String]) -> Self {
        Self {
            action: "Remove the dependency cycle".into(),
            steps: vec![
                format!("Detected cycle: {}", steps.join(" → ")),
                "Check the parameter names of these steps against their outputs".into(),
            ],
            commands: vec![
                "# Visualize the graph:".into(),
                "pipeflow graph --format mermaid".into(),
            ],
        }
    }

    /// Suggest supplying missing inputs
    pub fn supply_inputs(output: &str, missing: &[String]) -> Self {
        Self {
            action: format!("Supply {} to compute '{}'", missing.join(", "), output),
            steps: vec!["Each missing name is a root argument without a default".into()],
            commands: vec![
                "# List the argument sets that resolve this output:".into(),
                format!("pipeflow combinations {}", output),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
