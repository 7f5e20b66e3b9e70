// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Graph command - visualize pipeline as a graph

use miette::Result;
use std::path::PathBuf;

use super::{load_definition, GraphFormat};
use crate::pipeline::reduce;

/// Run the graph command
pub async fn run(
    pipeline_path: PathBuf,
    format: GraphFormat,
    reduced: Vec<String>,
    verbose: bool,
) -> Result<()> {
    let definition = load_definition(&pipeline_path)?;
    let mut graph = definition.graph()?;

    if !reduced.is_empty() {
        let outputs: Vec<&str> = reduced.iter().map(String::as_str).collect();
        let before = graph.len();
        graph = reduce(&graph, &outputs)?;
        if verbose {
            eprintln!("Reduced {} steps to {}", before, graph.len());
        }
    }

    let output = match format {
        GraphFormat::Text => graph.to_text(),
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    println!("{}", output);

    Ok(())
}
