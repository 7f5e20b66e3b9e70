// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Plan command - count step executions over a sweep

use colored::Colorize;
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;

use super::{load_definition, OutputFormat};
use crate::errors::PipeflowError;
use crate::pipeline::{Pipeline, PipelineValidator};
use crate::sweep::{count_sweep, precalculation_order, Sweep, SweepCounts};
use crate::utils::{format_args_list, format_value, points_bar, print_section, spinner};
use crate::Kwargs;

#[derive(Serialize)]
struct PlanReport<'a> {
    min_count: usize,
    counts: &'a SweepCounts,
    precalculate: Vec<&'a str>,
}

/// Run the plan command
pub async fn run(
    output: String,
    sweep_path: PathBuf,
    pipeline_path: PathBuf,
    min_count: usize,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let definition = load_definition(&pipeline_path)?;
    let pipeline = Pipeline::new(definition.signatures(), definition.config.clone())?;
    let sweep = Sweep::from_file(&sweep_path)?;

    let missing = PipelineValidator::missing_sweep_inputs(pipeline.graph(), &output, &sweep)?;
    if !missing.is_empty() {
        return Err(miette::miette!(
            help = "Add the names to the sweep or give them defaults",
            "Sweep is missing root arguments: {}",
            missing.join(", ")
        ));
    }

    let total = sweep.len();
    let bar = points_bar(total, "Expanding sweep");
    let mut points: Vec<Kwargs> = Vec::with_capacity(total);
    for point in sweep.iter() {
        points.push(point);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let pb = spinner("Counting root tuples...");
    let counts = count_sweep(&output, &points, &pipeline);
    pb.finish_and_clear();
    let counts = counts?;

    let order = precalculation_order(&pipeline, &counts, min_count);
    let names: Vec<&str> = order
        .iter()
        .map(|&idx| pipeline.graph().step(idx).name())
        .collect();

    match format {
        OutputFormat::Json => {
            let report = PlanReport {
                min_count,
                counts: &counts,
                precalculate: names,
            };
            let json = serde_json::to_string_pretty(&report).map_err(PipeflowError::from)?;
            println!("{}", json);
        }
        OutputFormat::Text => print_text(&counts, &names, min_count, verbose),
    }

    Ok(())
}

fn print_text(counts: &SweepCounts, order: &[&str], min_count: usize, verbose: bool) {
    println!(
        "{}",
        format!("Sweep over '{}': {} point(s)", counts.output, counts.points).bold()
    );

    print_section("Step executions");
    for step in &counts.steps {
        println!(
            "  {} -> {}  {} distinct, max {}",
            step.name.cyan(),
            step.output,
            step.distinct(),
            step.max_count()
        );
        if verbose {
            println!("      root {}", format_args_list(&step.root_args).dimmed());
            for key in &step.keys {
                let values: Vec<String> = key.values.iter().map(format_value).collect();
                println!("      {} x{}", format_args_list(&values), key.count);
            }
        }
    }

    print_section(&format!("Precalculate (min count {})", min_count));
    if order.is_empty() {
        println!("  {}", "No step repeats often enough to be worth caching".dimmed());
    }
    for (i, name) in order.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
}
