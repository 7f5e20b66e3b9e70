// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! # pipeflow - Function Composition Engine
//!
//! `pipeflow` composes named steps into a pipeline. Each step declares the
//! names it consumes and produces; the dependency graph follows from those
//! names alone.
//!
//! ## Features
//!
//! - **Synthesized graphs** - no manual wiring between steps
//! - **Flexible calls** - compute any output from roots or intermediates
//! - **Caching** - per function or shared, keyed by root arguments
//! - **Reduction** - merge single-consumer chains into one step
//! - **Sweeps** - count repeated work and precompute what pays off
//!
//! ## Quick Start
//!
//! ```
//! use pipeflow::{Kwargs, Pipeline, PipelineConfig, Step};
//! use serde_json::json;
//!
//! let add = Step::new("add", ["a", "b"], "c", |kw| {
//!     Ok(json!(kw["a"].as_i64().unwrap_or(0) + kw["b"].as_i64().unwrap_or(0)))
//! });
//! let double = Step::new("double", ["c"], "d", |kw| {
//!     Ok(json!(kw["c"].as_i64().unwrap_or(0) * 2))
//! });
//!
//! let pipeline = Pipeline::new(vec![add, double], PipelineConfig::default()).unwrap();
//! let mut kwargs = Kwargs::new();
//! kwargs.insert("a".into(), json!(1));
//! kwargs.insert("b".into(), json!(2));
//! assert_eq!(pipeline.call("d", &kwargs).unwrap(), json!(6));
//! ```

pub mod cache;
pub mod cli;
pub mod errors;
pub mod executors;
pub mod pipeline;
pub mod profiling;
pub mod sweep;
pub mod utils;

// Re-export commonly used types
pub use errors::{PipeflowError, PipeflowResult};
pub use pipeline::{
    BoundFunction, CacheMode, LazyCall, Pipeline, PipelineConfig, PipelineDefinition, Step, StepRegistry,
};
pub use sweep::{MultiSweep, Sweep};

/// Values flowing between steps
pub type Value = serde_json::Value;

/// Keyword arguments, in insertion order
pub type Kwargs = indexmap::IndexMap<String, Value>;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
