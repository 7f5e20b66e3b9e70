// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Deferred calls
//!
//! A [`LazyCall`] resolves its plan up front and keeps it as a task graph.
//! Nothing runs until a value is asked for; each task then runs at most
//! once, together with the tasks it depends on.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::PlanExecutor;
use crate::{Kwargs, Value};

type Outputs = Vec<(String, Value)>;

/// A resolved but not yet evaluated call
pub struct LazyCall {
    output: String,
    executor: PlanExecutor,
    supplied: Kwargs,
    /// Node weights are step indices; `a -> b` means `b` consumes an output of `a`
    tasks: DiGraph<usize, ()>,
    nodes: HashMap<usize, NodeIndex>,
    results: Vec<OnceLock<Outputs>>,
}

impl LazyCall {
    pub(crate) fn new(output: &str, executor: PlanExecutor, supplied: Kwargs) -> PipeflowResult<Self> {
        let graph = executor.graph();
        let resolution = graph
            .resolve(output, supplied.keys().map(String::as_str))?
            .ensure_complete(output)?;

        let mut tasks = DiGraph::new();
        let nodes: HashMap<usize, NodeIndex> = resolution
            .plan
            .iter()
            .map(|&idx| (idx, tasks.add_node(idx)))
            .collect();

        for &idx in &resolution.plan {
            for parameter in graph.step(idx).parameters() {
                if supplied.contains_key(parameter) {
                    continue;
                }
                let from = graph.producer(parameter).and_then(|p| nodes.get(&p));
                if let Some(&from) = from {
                    tasks.update_edge(from, nodes[&idx], ());
                }
            }
        }

        tracing::debug!(output, tasks = tasks.node_count(), "prepared lazy call");

        let results = (0..tasks.node_count()).map(|_| OnceLock::new()).collect();
        Ok(Self {
            output: output.to_string(),
            executor,
            supplied,
            tasks,
            nodes,
            results,
        })
    }

    pub fn output_name(&self) -> &str {
        &self.output
    }

    /// The deferred tasks and their dependencies
    pub fn task_graph(&self) -> &DiGraph<usize, ()> {
        &self.tasks
    }

    /// Names of the pending steps, in plan order
    pub fn step_names(&self) -> Vec<&str> {
        self.tasks
            .node_indices()
            .map(|node| self.executor.graph().step(self.tasks[node]).name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.node_count() == 0
    }

    /// Whether the named step has run for this call
    pub fn is_evaluated(&self, step: &str) -> bool {
        self.tasks
            .node_indices()
            .find(|&node| self.executor.graph().step(self.tasks[node]).name() == step)
            .is_some_and(|node| self.results[node.index()].get().is_some())
    }

    /// Compute the output
    pub fn evaluate(&self) -> PipeflowResult<Value> {
        self.value(&self.output)
    }

    /// Compute one named value of the call, running only the tasks it needs
    ///
    /// Supplied arguments and defaults are returned as they are.
    pub fn value(&self, name: &str) -> PipeflowResult<Value> {
        if let Some(value) = self.supplied.get(name) {
            return Ok(value.clone());
        }

        let graph = self.executor.graph();
        let node = graph.producer(name).and_then(|p| self.nodes.get(&p));
        let Some(&node) = node else {
            return graph.default_for(name).cloned().ok_or_else(|| {
                PipeflowError::unknown_output(name, self.supplied.keys().map(String::as_str))
            });
        };

        self.run_task(node)?
            .iter()
            .find(|(output, _)| output == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| PipeflowError::unknown_output(name, graph.outputs()))
    }

    fn run_task(&self, node: NodeIndex) -> PipeflowResult<&Outputs> {
        let cell = &self.results[node.index()];
        if let Some(outputs) = cell.get() {
            return Ok(outputs);
        }

        let mut values = self.supplied.clone();
        for dependency in self.tasks.neighbors_directed(node, Direction::Incoming) {
            for (name, value) in self.run_task(dependency)? {
                values.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }

        let outputs = self.executor.run_step(self.tasks[node], &values, &self.supplied)?;
        Ok(cell.get_or_init(|| outputs))
    }
}

impl fmt::Debug for LazyCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let evaluated = self.results.iter().filter(|r| r.get().is_some()).count();
        f.debug_struct("LazyCall")
            .field("output", &self.output)
            .field("tasks", &self.tasks.node_count())
            .field("evaluated", &evaluated)
            .finish()
    }
}
