// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! The pipeline facade
//!
//! Owns the graph, the cache and the profiler, and hands out memoized
//! [`BoundFunction`]s per output.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::cache::{Cache, MemoryCache};
use crate::errors::PipeflowResult;
use crate::executors::Executor;
use crate::pipeline::{
    reduce, BoundFunction, CacheMode, LazyCall, PipelineConfig, PipelineGraph, PlanExecutor, Step,
};
use crate::profiling::{Profiler, ProfilingStats};
use crate::{Kwargs, Value};

/// A validated pipeline of steps
pub struct Pipeline {
    graph: Arc<PipelineGraph>,
    config: PipelineConfig,
    shared_cache: Option<Arc<dyn Cache>>,
    profiler: Option<Arc<Profiler>>,
    functions: RwLock<HashMap<String, Arc<BoundFunction>>>,
}

impl Pipeline {
    /// Build a pipeline from steps
    pub fn new(steps: Vec<Step>, config: PipelineConfig) -> PipeflowResult<Self> {
        let graph = PipelineGraph::build(steps.into_iter().map(Arc::new).collect())?;
        Ok(Self::from_graph(graph, config))
    }

    /// Wrap an already built graph
    pub fn from_graph(graph: PipelineGraph, config: PipelineConfig) -> Self {
        let shared_cache: Option<Arc<dyn Cache>> = match config.cache {
            CacheMode::Shared => Some(Arc::new(MemoryCache::new())),
            CacheMode::None | CacheMode::PerFunction => None,
        };

        let profiling = config.profile || graph.steps().iter().any(|s| s.profile());
        let profiler = profiling.then(|| Arc::new(Profiler::new()));

        if config.cache == CacheMode::None && graph.steps().iter().any(|s| s.cache()) {
            tracing::warn!("steps request caching but the pipeline cache mode is 'none'");
        }

        Self {
            graph: Arc::new(graph),
            config,
            shared_cache,
            profiler,
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Use `cache` as the shared store for every bound function
    pub fn with_cache_backend(mut self, cache: Arc<dyn Cache>) -> Self {
        self.config.cache = CacheMode::Shared;
        self.shared_cache = Some(cache);
        self.functions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The shared cache, when the pipeline runs in shared mode
    pub fn shared_cache(&self) -> Option<&Arc<dyn Cache>> {
        self.shared_cache.as_ref()
    }

    /// The bound function computing `output`, created on first use
    pub fn func(&self, output: &str) -> PipeflowResult<Arc<BoundFunction>> {
        {
            let functions = self.functions.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(func) = functions.get(output) {
                return Ok(Arc::clone(func));
            }
        }

        let func = Arc::new(BoundFunction::new(output, self.executor())?);
        let mut functions = self.functions.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(functions.entry(output.to_string()).or_insert(func)))
    }

    fn executor(&self) -> PlanExecutor {
        let cache = match self.config.cache {
            CacheMode::None => None,
            CacheMode::PerFunction => Some(Arc::new(MemoryCache::new()) as Arc<dyn Cache>),
            CacheMode::Shared => self.shared_cache.clone(),
        };

        PlanExecutor::new(Arc::clone(&self.graph))
            .with_cache(cache)
            .with_profiler(self.profiler.clone(), self.config.profile)
            .with_debug(self.config.debug)
    }

    /// Compute `output` from keyword arguments
    pub fn call(&self, output: &str, kwargs: &Kwargs) -> PipeflowResult<Value> {
        self.func(output)?.call(kwargs)
    }

    /// Compute `output` and return every intermediate value
    pub fn call_full_output(&self, output: &str, kwargs: &Kwargs) -> PipeflowResult<Kwargs> {
        self.func(output)?.call_full_output(kwargs)
    }

    /// Deferred call of `output`; steps run when the result is asked for
    pub fn call_lazy(&self, output: &str, kwargs: &Kwargs) -> PipeflowResult<LazyCall> {
        self.func(output)?.call_lazy(kwargs)
    }

    /// Compute `output` from positional root argument values
    pub fn call_with_root_args(&self, output: &str, values: &[Value]) -> PipeflowResult<Value> {
        self.func(output)?.call_with_root_args(values)
    }

    /// Argument combinations resolving `output`
    ///
    /// With `root_only` the result is the single root-only combination.
    pub fn arg_combinations(&self, output: &str, root_only: bool) -> PipeflowResult<Vec<Vec<String>>> {
        let func = self.func(output)?;
        if root_only {
            Ok(vec![func.root_args().to_vec()])
        } else {
            Ok(func.arg_combinations()?.to_vec())
        }
    }

    /// Sorted root arguments of `output`
    pub fn root_args(&self, output: &str) -> PipeflowResult<Vec<String>> {
        Ok(self.func(output)?.root_args().to_vec())
    }

    /// A new pipeline with single-consumer chains merged
    ///
    /// The reduced pipeline keeps this pipeline's configuration and shares
    /// its shared cache, if any.
    pub fn reduced(&self, outputs: &[&str]) -> PipeflowResult<Pipeline> {
        let graph = reduce(&self.graph, outputs)?;
        let pipeline = Pipeline::from_graph(graph, self.config.clone());

        Ok(match &self.shared_cache {
            Some(cache) => pipeline.with_cache_backend(Arc::clone(cache)),
            None => pipeline,
        })
    }

    /// Rebuild the pipeline with replaced steps, sharing this pipeline's cache
    pub(crate) fn with_steps(&self, steps: Vec<Step>, config: PipelineConfig) -> PipeflowResult<Pipeline> {
        let pipeline = Pipeline::new(steps, config)?;
        Ok(match &self.shared_cache {
            Some(cache) => pipeline.with_cache_backend(Arc::clone(cache)),
            None => pipeline,
        })
    }

    /// Per-step statistics, `None` when profiling is disabled
    pub fn profiling_stats(&self) -> Option<IndexMap<String, ProfilingStats>> {
        self.profiler.as_ref().map(|p| p.snapshot())
    }

    /// Drop every cached result
    pub fn clear_cache(&self) -> PipeflowResult<()> {
        if let Some(cache) = &self.shared_cache {
            cache.clear()?;
        }

        let functions = self.functions.read().unwrap_or_else(PoisonError::into_inner);
        for func in functions.values() {
            if let Some(cache) = func.cache() {
                cache.clear()?;
            }
        }

        Ok(())
    }

    /// Evaluate `output` for every input through an executor
    ///
    /// Results are returned in input order.
    pub async fn map(
        &self,
        output: &str,
        inputs: Vec<Kwargs>,
        executor: &dyn Executor,
    ) -> PipeflowResult<Vec<Value>> {
        let func = self.func(output)?;
        tracing::debug!(output, points = inputs.len(), executor = executor.name(), "mapping");
        executor.map(func, inputs).await
    }

    /// Text render of the execution order
    pub fn to_text(&self) -> String {
        self.graph.to_text()
    }

    pub fn to_dot(&self) -> String {
        self.graph.to_dot()
    }

    pub fn to_mermaid(&self) -> String {
        self.graph.to_mermaid()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.graph.steps())
            .field("config", &self.config)
            .finish()
    }
}
