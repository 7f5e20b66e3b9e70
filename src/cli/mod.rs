// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for inspecting pipeline definitions.

pub mod combinations;
pub mod graph;
pub mod plan;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::pipeline::PipelineDefinition;
use crate::sweep::DEFAULT_MIN_EXECUTIONS;

/// Function composition engine
///
/// Inspect pipelines of named steps: render their graphs, list argument
/// combinations and plan cache-friendly parameter sweeps.
#[derive(Parser, Debug)]
#[clap(
    name = "pipeflow",
    version,
    about = "Inspect pipelines of named steps and plan parameter sweeps",
    long_about = None,
    after_help = "Examples:\n\
        pipeflow validate                          Check pipeflow.yaml\n\
        pipeflow graph -f mermaid                  Render the graph as Mermaid\n\
        pipeflow graph --reduced e                 Render the graph reduced for 'e'\n\
        pipeflow combinations e                    List argument sets computing 'e'\n\
        pipeflow plan e --sweep sweep.yaml         Count root tuples over a sweep\n\n\
        See 'pipeflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show pipeline as a graph
    Graph {
        /// Pipeline definition file
        #[clap(short, long, default_value = "pipeflow.yaml")]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "text", value_enum)]
        format: GraphFormat,

        /// Reduce the graph to the steps needed for these outputs
        #[clap(short, long, value_delimiter = ',')]
        reduced: Vec<String>,
    },

    /// List the argument combinations that compute an output
    Combinations {
        /// Output name
        output: String,

        /// Pipeline definition file
        #[clap(short, long, default_value = "pipeflow.yaml")]
        pipeline: PathBuf,

        /// Only show the root arguments
        #[clap(long)]
        root_only: bool,
    },

    /// Validate a pipeline definition
    Validate {
        /// Pipeline definition file
        #[clap(short, long, default_value = "pipeflow.yaml")]
        pipeline: PathBuf,
    },

    /// Count step executions over a sweep and suggest what to precompute
    Plan {
        /// Output computed at every sweep point
        output: String,

        /// Sweep file (YAML or JSON)
        #[clap(short, long)]
        sweep: PathBuf,

        /// Pipeline definition file
        #[clap(short, long, default_value = "pipeflow.yaml")]
        pipeline: PathBuf,

        /// Cache a step once one of its root tuples repeats this often
        #[clap(short, long, default_value_t = DEFAULT_MIN_EXECUTIONS)]
        min_count: usize,

        /// Output format
        #[clap(short, long, default_value = "text", value_enum)]
        format: OutputFormat,
    },
}

/// Output format for the plan command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Load a definition file, failing with a hint when it does not exist
pub(crate) fn load_definition(path: &Path) -> miette::Result<PipelineDefinition> {
    if !path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}\n\n\
             Pass a definition with '--pipeline <FILE>'.",
            path.display()
        ));
    }

    Ok(PipelineDefinition::from_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_graph_command() {
        let cli = Cli::try_parse_from(["pipeflow", "graph", "-f", "dot", "--reduced", "c,i"]).unwrap();
        match cli.command {
            Commands::Graph { format, reduced, pipeline } => {
                assert_eq!(format, GraphFormat::Dot);
                assert_eq!(reduced, vec!["c", "i"]);
                assert_eq!(pipeline, PathBuf::from("pipeflow.yaml"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_plan_command() {
        let cli = Cli::try_parse_from(["pipeflow", "plan", "i", "--sweep", "s.yaml", "-m", "3"]).unwrap();
        match cli.command {
            Commands::Plan { output, min_count, format, .. } => {
                assert_eq!(output, "i");
                assert_eq!(min_count, 3);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_plan_min_count_default() {
        let cli = Cli::try_parse_from(["pipeflow", "plan", "i", "-s", "s.yaml"]).unwrap();
        match cli.command {
            Commands::Plan { min_count, .. } => assert_eq!(min_count, DEFAULT_MIN_EXECUTIONS),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["pipeflow", "graph", "-f", "svg"]).is_err());
    }
}
