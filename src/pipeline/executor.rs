// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Plan executor
//!
//! Runs a resolved plan step by step, gathering each step's arguments from
//! the values computed so far, consulting the cache and recording profiling
//! samples.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{Cache, CacheKey};
use crate::errors::{format_kwargs, PipeflowError, PipeflowResult};
use crate::pipeline::{PipelineGraph, Step};
use crate::profiling::Profiler;
use crate::{Kwargs, Value};

/// Executes plans against one graph
#[derive(Clone)]
pub struct PlanExecutor {
    graph: Arc<PipelineGraph>,
    cache: Option<Arc<dyn Cache>>,
    profiler: Option<Arc<Profiler>>,
    profile_all: bool,
    debug: bool,
}

impl PlanExecutor {
    /// Create an executor without cache or profiler
    pub fn new(graph: Arc<PipelineGraph>) -> Self {
        Self {
            graph,
            cache: None,
            profiler: None,
            profile_all: false,
            debug: false,
        }
    }

    /// Set the cache consulted by caching steps
    pub fn with_cache(mut self, cache: Option<Arc<dyn Cache>>) -> Self {
        self.cache = cache;
        self
    }

    /// Set the profiler; with `profile_all` every step is sampled, otherwise
    /// only steps with their own profiling flag
    pub fn with_profiler(mut self, profiler: Option<Arc<Profiler>>, profile_all: bool) -> Self {
        self.profiler = profiler;
        self.profile_all = profile_all;
        self
    }

    /// Log every invocation at info level
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn graph(&self) -> &Arc<PipelineGraph> {
        &self.graph
    }

    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    /// Compute `output` from `kwargs`
    ///
    /// Returns the supplied arguments together with every value computed on
    /// the way.
    pub fn run(&self, output: &str, kwargs: &Kwargs) -> PipeflowResult<Kwargs> {
        let resolution = self
            .graph
            .resolve(output, kwargs.keys().map(String::as_str))?
            .ensure_complete(output)?;

        self.run_plan(&resolution.plan, kwargs)
    }

    /// Execute an already resolved plan
    pub fn run_plan(&self, plan: &[usize], kwargs: &Kwargs) -> PipeflowResult<Kwargs> {
        let mut values = kwargs.clone();

        for &idx in plan {
            for (name, value) in self.run_step(idx, &values, kwargs)? {
                values.entry(name).or_insert(value);
            }
        }

        Ok(values)
    }

    /// Run one step against the values known so far and name its outputs
    ///
    /// `supplied` are the caller's arguments, from which cache keys are built.
    pub(crate) fn run_step(
        &self,
        idx: usize,
        values: &Kwargs,
        supplied: &Kwargs,
    ) -> PipeflowResult<Vec<(String, Value)>> {
        let step = self.graph.step(idx);
        let args = self.gather(step, values)?;
        let raw = self.evaluate(idx, &args, supplied)?;
        step.split_outputs(&raw)
    }

    /// Collect a step's arguments: computed or supplied values first, then
    /// the step's own default, then the pipeline-wide default
    fn gather(&self, step: &Step, values: &Kwargs) -> PipeflowResult<Kwargs> {
        let mut args = Kwargs::with_capacity(step.parameters().len());

        for parameter in step.parameters() {
            let value = values
                .get(parameter)
                .or_else(|| step.default_for(parameter))
                .or_else(|| self.graph.default_for(parameter))
                .ok_or_else(|| PipeflowError::UnresolvableInput {
                    output: step.output_label(),
                    missing: vec![parameter.clone()],
                })?;
            args.insert(parameter.clone(), value.clone());
        }

        Ok(args)
    }

    /// Produce a step's raw result, from the cache when possible
    fn evaluate(&self, idx: usize, args: &Kwargs, supplied: &Kwargs) -> PipeflowResult<Value> {
        let step = self.graph.step(idx);

        let keyed = match &self.cache {
            Some(cache) if step.cache() => match self.cache_key(idx, supplied) {
                Some(key) => Some((cache, key)),
                None => {
                    tracing::debug!(step = step.name(), "root arguments unknown, running uncached");
                    None
                }
            },
            _ => None,
        };

        if let Some((cache, key)) = &keyed {
            if let Some(hit) = cache.get(key)? {
                tracing::debug!(step = step.name(), key = %key, "cache hit");
                return Ok(hit);
            }
        }

        let raw = self.invoke(step, args)?;

        if let Some((cache, key)) = keyed {
            cache.put_if_absent(key, raw.clone())?;
        }

        Ok(raw)
    }

    /// Key of a step's result, built from the root arguments it depends on
    ///
    /// `None` when a root value is unknown, which happens when the caller
    /// supplied an intermediate value instead of the roots behind it.
    fn cache_key(&self, idx: usize, supplied: &Kwargs) -> Option<CacheKey> {
        let step = self.graph.step(idx);
        let mut pairs = Vec::new();

        for root in self.graph.step_root_args(idx) {
            let value = supplied
                .get(root)
                .or_else(|| self.graph.default_for(root))?;
            pairs.push((root.as_str(), value));
        }

        Some(CacheKey::new(&step.output_label(), pairs))
    }

    fn invoke(&self, step: &Step, args: &Kwargs) -> PipeflowResult<Value> {
        if self.debug {
            tracing::info!(step = step.name(), args = %format_kwargs(args), "invoking step");
        } else {
            tracing::debug!(step = step.name(), args = %format_kwargs(args), "invoking step");
        }

        let start = Instant::now();
        let result = step.invoke(args);

        if let Some(profiler) = &self.profiler {
            if self.profile_all || step.profile() {
                profiler.record(step.name(), start.elapsed());
            }
        }

        result
    }
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("steps", &self.graph.len())
            .field("cached", &self.cache.is_some())
            .field("profiled", &self.profiler.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}
