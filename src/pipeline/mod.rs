// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipelines of named steps
//!
//! Steps declare the names they consume and produce; the dependency graph is
//! synthesized from those names. This module holds the graph, its resolver
//! and executor, graph reduction, and the definition file schema.

mod config;
mod core;
mod definition;
mod executor;
mod function;
mod graph;
mod lazy;
mod reduce;
mod registry;
mod resolver;
mod step;
mod validation;

#[cfg(test)]
pub(crate) mod fixtures;

pub use self::core::Pipeline;
pub use config::{CacheMode, PipelineConfig};
pub use definition::{OutputSpec, PipelineDefinition, StepDefinition};
pub use executor::PlanExecutor;
pub use function::BoundFunction;
pub use graph::{Node, PipelineGraph};
pub use lazy::LazyCall;
pub use reduce::reduce;
pub use registry::StepRegistry;
pub use resolver::Resolution;
pub use step::{OutputPicker, Step, StepFn};
pub use validation::{PipelineValidator, ValidationResult};
