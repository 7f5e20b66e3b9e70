// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! pipeflow - inspect pipelines of named steps
//!
//! Render dependency graphs, list argument combinations and plan sweeps
//! for pipeline definition files.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipeflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Graph {
            pipeline,
            format,
            reduced,
        } => pipeflow::cli::graph::run(pipeline, format, reduced, cli.verbose).await,
        Commands::Combinations {
            output,
            pipeline,
            root_only,
        } => pipeflow::cli::combinations::run(output, pipeline, root_only, cli.verbose).await,
        Commands::Validate { pipeline } => {
            pipeflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Plan {
            output,
            sweep,
            pipeline,
            min_count,
            format,
        } => pipeflow::cli::plan::run(output, sweep, pipeline, min_count, format, cli.verbose).await,
    }
}
