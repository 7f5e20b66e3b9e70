// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Dependency graph builder
//!
//! Synthesizes a bipartite graph of parameter nodes and step nodes from the
//! steps' declared parameter and output names. An edge `parameter -> step`
//! means the step consumes the parameter; an edge `step -> parameter` means
//! the step produces it. Parameters without a producer are root arguments.

use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::Step;
use crate::Value;

/// Node of the bipartite pipeline graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// A named value: root argument or step output
    Parameter(String),
    /// A step, by declaration index
    Step(usize),
}

/// Dependency graph of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    steps: Vec<Arc<Step>>,
    graph: DiGraph<Node, ()>,
    parameter_nodes: HashMap<String, NodeIndex>,
    step_nodes: Vec<NodeIndex>,
    output_to_step: HashMap<String, usize>,
    /// Defaults of root parameters, shared by every consumer
    defaults: HashMap<String, Value>,
    /// Step indices in topological order, ties broken by declaration order
    order: Vec<usize>,
    position: Vec<usize>,
    /// Sorted root arguments reachable from each step
    step_root_args: Vec<Vec<String>>,
}

impl PipelineGraph {
    /// Build the graph for a list of steps
    pub fn build(steps: Vec<Arc<Step>>) -> PipeflowResult<Self> {
        let mut graph = DiGraph::new();
        let mut parameter_nodes: HashMap<String, NodeIndex> = HashMap::new();
        let mut step_nodes = Vec::with_capacity(steps.len());
        let mut output_to_step: HashMap<String, usize> = HashMap::new();

        for (idx, step) in steps.iter().enumerate() {
            Self::check_signature(step)?;

            let step_node = graph.add_node(Node::Step(idx));
            step_nodes.push(step_node);

            for output in step.outputs() {
                if let Some(&first) = output_to_step.get(output) {
                    return Err(PipeflowError::DuplicateOutput {
                        output: output.clone(),
                        first: steps[first].name().to_string(),
                        second: step.name().to_string(),
                    });
                }
                output_to_step.insert(output.clone(), idx);

                let param = *parameter_nodes
                    .entry(output.clone())
                    .or_insert_with(|| graph.add_node(Node::Parameter(output.clone())));
                graph.add_edge(step_node, param, ());
            }

            for parameter in step.parameters() {
                let param = *parameter_nodes
                    .entry(parameter.clone())
                    .or_insert_with(|| graph.add_node(Node::Parameter(parameter.clone())));
                graph.add_edge(param, step_node, ());
            }
        }

        let mut builder = Self {
            steps,
            graph,
            parameter_nodes,
            step_nodes,
            output_to_step,
            defaults: HashMap::new(),
            order: Vec::new(),
            position: Vec::new(),
            step_root_args: Vec::new(),
        };

        builder.validate_acyclic()?;
        builder.order = builder.compute_order();
        builder.position = vec![0; builder.steps.len()];
        for (pos, &idx) in builder.order.iter().enumerate() {
            builder.position[idx] = pos;
        }
        builder.defaults = builder.collect_defaults()?;
        builder.step_root_args = builder.compute_root_args();

        tracing::debug!(
            steps = builder.steps.len(),
            parameters = builder.parameter_nodes.len(),
            "built pipeline graph"
        );

        Ok(builder)
    }

    fn check_signature(step: &Step) -> PipeflowResult<()> {
        if step.outputs().is_empty() {
            return Err(PipeflowError::InvalidPipeline {
                reason: format!("step '{}' declares no outputs", step.name()),
                help: None,
            });
        }

        let mut seen = HashSet::new();
        for parameter in step.parameters() {
            if !seen.insert(parameter) {
                return Err(PipeflowError::InvalidPipeline {
                    reason: format!(
                        "step '{}' declares parameter '{}' twice",
                        step.name(),
                        parameter
                    ),
                    help: None,
                });
            }
        }

        for name in step.defaults().keys() {
            if !step.parameters().contains(name) {
                return Err(PipeflowError::InvalidPipeline {
                    reason: format!(
                        "step '{}' has a default for '{}' which is not one of its parameters",
                        step.name(),
                        name
                    ),
                    help: Some(format!("Parameters: {}", step.parameters().join(", "))),
                });
            }
        }

        Ok(())
    }

    /// Validate that the graph is acyclic
    fn validate_acyclic(&self) -> PipeflowResult<()> {
        for component in tarjan_scc(&self.graph) {
            let self_loop = component.len() == 1
                && self.graph.contains_edge(component[0], component[0]);
            if component.len() > 1 || self_loop {
                return Err(PipeflowError::Cycle {
                    steps: self.cycle_members(&component),
                });
            }
        }
        Ok(())
    }

    /// Step names of a strongly connected component, closed into a loop
    fn cycle_members(&self, component: &[NodeIndex]) -> Vec<String> {
        let mut members: Vec<usize> = component
            .iter()
            .filter_map(|n| match self.graph[*n] {
                Node::Step(idx) => Some(idx),
                Node::Parameter(_) => None,
            })
            .collect();
        members.sort_unstable();

        let mut names: Vec<String> = members
            .iter()
            .map(|&idx| self.steps[idx].name().to_string())
            .collect();
        if let Some(first) = names.first().cloned() {
            names.push(first);
        }
        names
    }

    /// Kahn's algorithm over step dependencies, lowest declaration index first
    fn compute_order(&self) -> Vec<usize> {
        let n = self.steps.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for idx in 0..n {
            for dep in self.dependencies(idx) {
                indegree[idx] += 1;
                dependents[dep].push(idx);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&idx| indegree[idx] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(n);

        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for &next in &dependents[idx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        order
    }

    /// Merge the defaults of root parameters across steps
    fn collect_defaults(&self) -> PipeflowResult<HashMap<String, Value>> {
        let mut defaults: HashMap<String, (Value, usize)> = HashMap::new();

        for &idx in &self.order {
            let step = &self.steps[idx];
            for (name, value) in step.defaults() {
                if self.output_to_step.contains_key(name) {
                    continue;
                }
                match defaults.get(name) {
                    Some((existing, first)) if existing != value => {
                        return Err(PipeflowError::ConflictingDefaults {
                            parameter: name.clone(),
                            first: self.steps[*first].name().to_string(),
                            second: step.name().to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        defaults.insert(name.clone(), (value.clone(), idx));
                    }
                }
            }
        }

        Ok(defaults.into_iter().map(|(k, (v, _))| (k, v)).collect())
    }

    fn compute_root_args(&self) -> Vec<Vec<String>> {
        let mut roots: Vec<BTreeSet<String>> = vec![BTreeSet::new(); self.steps.len()];

        for &idx in &self.order {
            let mut set = BTreeSet::new();
            for parameter in self.steps[idx].parameters() {
                match self.output_to_step.get(parameter) {
                    Some(&producer) => set.extend(roots[producer].iter().cloned()),
                    None => {
                        set.insert(parameter.clone());
                    }
                }
            }
            roots[idx] = set;
        }

        roots.into_iter().map(|s| s.into_iter().collect()).collect()
    }

    /// All steps, in declaration order
    pub fn steps(&self) -> &[Arc<Step>] {
        &self.steps
    }

    /// Step by declaration index
    pub fn step(&self, idx: usize) -> &Arc<Step> {
        &self.steps[idx]
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The underlying petgraph structure
    pub fn inner(&self) -> &DiGraph<Node, ()> {
        &self.graph
    }

    /// Index of the step producing `output`
    pub fn producer(&self, output: &str) -> Option<usize> {
        self.output_to_step.get(output).copied()
    }

    /// Index of the step producing `output`, or an `UnknownOutput` error
    pub fn producer_of(&self, output: &str) -> PipeflowResult<usize> {
        self.producer(output).ok_or_else(|| {
            PipeflowError::unknown_output(output, self.output_to_step.keys().map(String::as_str))
        })
    }

    /// Whether `name` is a root argument of the pipeline
    pub fn is_root(&self, name: &str) -> bool {
        self.parameter_nodes.contains_key(name) && !self.output_to_step.contains_key(name)
    }

    /// Root arguments in order of first appearance
    pub fn root_parameters(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .flat_map(|s| s.parameters().iter())
            .filter(|p| self.is_root(p) && seen.insert(p.as_str()))
            .cloned()
            .collect()
    }

    /// Every declared output, in declaration order
    pub fn outputs(&self) -> Vec<&str> {
        self.steps
            .iter()
            .flat_map(|s| s.outputs().iter().map(String::as_str))
            .collect()
    }

    /// Pipeline-wide default of a root argument
    pub fn default_for(&self, parameter: &str) -> Option<&Value> {
        self.defaults.get(parameter)
    }

    /// All pipeline-wide defaults
    pub fn defaults(&self) -> &HashMap<String, Value> {
        &self.defaults
    }

    /// Sorted root arguments reachable from a step
    pub fn step_root_args(&self, idx: usize) -> &[String] {
        &self.step_root_args[idx]
    }

    /// Steps in topological order
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Position of a step in the topological order
    pub fn topological_position(&self, idx: usize) -> usize {
        self.position[idx]
    }

    /// Group steps into generations; steps of one generation are independent
    pub fn topological_generations(&self) -> Vec<Vec<usize>> {
        let mut level = vec![0usize; self.steps.len()];
        let mut generations: Vec<Vec<usize>> = Vec::new();

        for &idx in &self.order {
            let lvl = self
                .dependencies(idx)
                .into_iter()
                .map(|dep| level[dep] + 1)
                .max()
                .unwrap_or(0);
            level[idx] = lvl;
            if generations.len() <= lvl {
                generations.resize_with(lvl + 1, Vec::new);
            }
            generations[lvl].push(idx);
        }

        generations
    }

    /// Direct upstream steps of a step
    pub fn dependencies(&self, idx: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self.steps[idx]
            .parameters()
            .iter()
            .filter_map(|p| self.producer(p))
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    /// Direct downstream steps of a step
    pub fn dependents(&self, idx: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .graph
            .neighbors_directed(self.step_nodes[idx], Direction::Outgoing)
            .flat_map(|param| self.graph.neighbors_directed(param, Direction::Outgoing))
            .filter_map(|n| match self.graph[n] {
                Node::Step(consumer) => Some(consumer),
                Node::Parameter(_) => None,
            })
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    /// Steps consuming a named value
    pub fn consumers(&self, name: &str) -> Vec<usize> {
        let Some(&node) = self.parameter_nodes.get(name) else {
            return Vec::new();
        };
        let mut consumers: Vec<usize> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .filter_map(|n| match self.graph[n] {
                Node::Step(idx) => Some(idx),
                Node::Parameter(_) => None,
            })
            .collect();
        consumers.sort_unstable();
        consumers
    }

    /// Check if step `a` depends (directly or transitively) on step `b`
    pub fn depends_on(&self, a: usize, b: usize) -> bool {
        a != b && has_path_connecting(&self.graph, self.step_nodes[b], self.step_nodes[a], None)
    }

    /// Every step upstream of `output`'s producer, in topological order
    pub fn func_dependencies(&self, output: &str) -> PipeflowResult<Vec<usize>> {
        let head = self.producer_of(output)?;
        Ok(self.ancestors(&[head]).into_iter().filter(|&i| i != head).collect())
    }

    /// The given steps plus all of their ancestors, in topological order
    pub fn ancestors(&self, heads: &[usize]) -> Vec<usize> {
        let mut seen: HashSet<usize> = heads.iter().copied().collect();
        let mut stack: Vec<usize> = heads.to_vec();

        while let Some(idx) = stack.pop() {
            for dep in self.dependencies(idx) {
                if seen.insert(dep) {
                    stack.push(dep);
                }
            }
        }

        let mut result: Vec<usize> = seen.into_iter().collect();
        result.sort_by_key(|&i| self.position[i]);
        result
    }

    /// Generate Mermaid diagram of the graph
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for idx in self.graph.node_indices() {
            match &self.graph[idx] {
                Node::Parameter(name) => out.push_str(&format!("    p_{}([{}])\n", name, name)),
                Node::Step(s) => out.push_str(&format!(
                    "    s{}[{}]\n",
                    s,
                    self.steps[*s].name()
                )),
            }
        }

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                out.push_str(&format!(
                    "    {} --> {}\n",
                    self.mermaid_id(from),
                    self.mermaid_id(to)
                ));
            }
        }

        out
    }

    fn mermaid_id(&self, node: NodeIndex) -> String {
        match &self.graph[node] {
            Node::Parameter(name) => format!("p_{}", name),
            Node::Step(s) => format!("s{}", s),
        }
    }

    /// Generate DOT diagram of the graph
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");

        for idx in self.graph.node_indices() {
            match &self.graph[idx] {
                Node::Parameter(name) => {
                    let style = if self.is_root(name) { "filled" } else { "solid" };
                    out.push_str(&format!(
                        "    \"{}\" [shape=ellipse, style={}];\n",
                        name, style
                    ));
                }
                Node::Step(s) => out.push_str(&format!(
                    "    \"{}\" [shape=box, style=rounded];\n",
                    self.steps[*s].name()
                )),
            }
        }
        out.push('\n');

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\";\n",
                    self.node_label(from),
                    self.node_label(to)
                ));
            }
        }

        out.push_str("}\n");
        out
    }

    fn node_label(&self, node: NodeIndex) -> &str {
        match &self.graph[node] {
            Node::Parameter(name) => name,
            Node::Step(s) => self.steps[*s].name(),
        }
    }

    /// Generate text representation of execution order
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for (i, &idx) in self.order.iter().enumerate() {
            let step = &self.steps[idx];
            out.push_str(&format!("{}. {}", i + 1, step));

            let deps: Vec<&str> = self
                .dependencies(idx)
                .into_iter()
                .map(|d| self.steps[d].name())
                .collect();
            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }
            if step.cache() {
                out.push_str(" [cached]");
            }

            out.push('\n');
        }

        out
    }
}
