// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Combinations command - list the argument sets that compute an output

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::load_definition;
use crate::pipeline::Pipeline;
use crate::utils::format_args_list;

/// Run the combinations command
pub async fn run(output: String, pipeline_path: PathBuf, root_only: bool, verbose: bool) -> Result<()> {
    let definition = load_definition(&pipeline_path)?;
    let pipeline = Pipeline::new(definition.signatures(), definition.config.clone())?;

    let combinations = pipeline.arg_combinations(&output, root_only)?;

    if verbose {
        let root_args = pipeline.root_args(&output)?;
        println!(
            "{} {}",
            format!("Root arguments of '{}':", output).bold(),
            format_args_list(&root_args)
        );
        println!();
    }

    for combination in &combinations {
        println!("{}", format_args_list(combination));
    }

    if verbose {
        println!();
        println!("{}", format!("{} combination(s)", combinations.len()).dimmed());
    }

    Ok(())
}
