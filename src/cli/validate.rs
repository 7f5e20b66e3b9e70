// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Validate command - check a pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::errors::RecoverySuggestion;
use crate::pipeline::{PipelineDefinition, PipelineValidator};
use crate::utils::{format_args_list, print_section, print_status, Status};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}",
            pipeline_path.display()
        ));
    }

    let definition = match PipelineDefinition::from_file(&pipeline_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("  {} Failed to parse pipeline", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    print_status(Status::Ok, "Pipeline file parses");

    let validation = PipelineValidator::validate(&definition, None)?;

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().to_string());
        for error in &validation.errors {
            print_status(Status::Error, error);
        }

        let suggestion = match definition.graph() {
            Err(e) if e.is_graph_error() => RecoverySuggestion::for_error(&e),
            _ => None,
        };
        if let Some(suggestion) = suggestion {
            print_section("Suggestion");
            for line in suggestion.to_string().lines() {
                println!("  {}", line);
            }
        }
    }

    if validation.has_warnings() {
        print_section(&"Warnings".yellow().to_string());
        for warning in &validation.warnings {
            print_status(Status::Warning, warning);
        }
    }

    if verbose {
        print_section("Pipeline summary");
        println!("  Name: {}", definition.name);
        println!("  Steps: {}", definition.steps.len());
        for step in &definition.steps {
            let outputs = step.output.names().join(", ");
            let flags = match (step.cache, step.profile) {
                (true, true) => " [cache, profile]",
                (true, false) => " [cache]",
                (false, true) => " [profile]",
                (false, false) => "",
            };
            println!(
                "    - {}{} -> {}{}",
                step.name,
                format_args_list(&step.parameters),
                outputs,
                flags.dimmed()
            );
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }
    Ok(())
}
