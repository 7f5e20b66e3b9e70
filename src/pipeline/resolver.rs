// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Argument resolution
//!
//! Walks the graph backward from a requested output. A parameter the caller
//! supplies is a shortcut: its producer and everything upstream of it are not
//! expanded. Other parameters expand into their producer's parameters, and
//! parameters without a producer are root arguments.

use std::collections::{BTreeSet, HashSet};

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::PipelineGraph;

/// The outcome of resolving an output against a set of supplied names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Steps to execute, in topological order
    pub plan: Vec<usize>,
    /// Root arguments that are neither supplied nor defaulted, sorted
    pub missing: Vec<String>,
}

impl Resolution {
    /// Whether every input needed by the plan is available
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Fail with `UnresolvableInput` when inputs are missing
    pub fn ensure_complete(self, output: &str) -> PipeflowResult<Self> {
        if self.missing.is_empty() {
            Ok(self)
        } else {
            Err(PipeflowError::UnresolvableInput {
                output: output.to_string(),
                missing: self.missing,
            })
        }
    }
}

impl PipelineGraph {
    /// Resolve the steps needed to compute `output` from `supplied` names
    pub fn resolve<'a, I>(&self, output: &str, supplied: I) -> PipeflowResult<Resolution>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let supplied: HashSet<&str> = supplied.into_iter().collect();
        let head = self.producer_of(output)?;

        if supplied.contains(output) {
            return Ok(Resolution {
                plan: Vec::new(),
                missing: Vec::new(),
            });
        }

        let mut visited: HashSet<usize> = HashSet::from([head]);
        let mut seen_params: HashSet<&str> = HashSet::new();
        let mut missing: BTreeSet<String> = BTreeSet::new();
        let mut stack = vec![head];

        while let Some(idx) = stack.pop() {
            let step = self.step(idx);
            for parameter in step.parameters() {
                if !seen_params.insert(parameter.as_str()) || supplied.contains(parameter.as_str()) {
                    continue;
                }

                if let Some(producer) = self.producer(parameter) {
                    if visited.insert(producer) {
                        stack.push(producer);
                    }
                } else if step.default_for(parameter).is_none()
                    && self.default_for(parameter).is_none()
                {
                    missing.insert(parameter.clone());
                }
            }
        }

        let mut plan: Vec<usize> = visited.into_iter().collect();
        plan.sort_by_key(|&idx| self.topological_position(idx));

        Ok(Resolution {
            plan,
            missing: missing.into_iter().collect(),
        })
    }

    /// Sorted root arguments needed to compute `output`
    pub fn root_args(&self, output: &str) -> PipeflowResult<Vec<String>> {
        let head = self.producer_of(output)?;
        Ok(self.step_root_args(head).to_vec())
    }

    /// Every distinct set of argument names that resolves `output`
    ///
    /// Each combination is sorted; the list itself is sorted and never
    /// contains the requested output. A combination either supplies an
    /// intermediate value directly or replaces it with its producer's inputs.
    pub fn arg_combinations(&self, output: &str) -> PipeflowResult<Vec<Vec<String>>> {
        let head = self.producer_of(output)?;

        let mut frontier: Vec<String> = Vec::new();
        for parameter in self.step(head).parameters() {
            if !frontier.contains(parameter) {
                frontier.push(parameter.clone());
            }
        }

        let mut results: BTreeSet<Vec<String>> = BTreeSet::new();
        let mut explored: HashSet<(Vec<String>, Vec<usize>)> = HashSet::new();
        self.expand_combinations(frontier, vec![head], &mut results, &mut explored);

        Ok(results.into_iter().collect())
    }

    fn expand_combinations(
        &self,
        frontier: Vec<String>,
        replaced: Vec<usize>,
        results: &mut BTreeSet<Vec<String>>,
        explored: &mut HashSet<(Vec<String>, Vec<usize>)>,
    ) {
        let mut names = frontier.clone();
        names.sort();
        let mut replaced_key = replaced.clone();
        replaced_key.sort_unstable();
        if !explored.insert((names.clone(), replaced_key)) {
            return;
        }
        results.insert(names);

        let mut producers: Vec<usize> = Vec::new();
        for name in &frontier {
            if let Some(p) = self.producer(name) {
                if !producers.contains(&p) {
                    producers.push(p);
                }
            }
        }

        for producer in producers {
            let step = self.step(producer);
            let mut next: Vec<String> = frontier
                .iter()
                .filter(|name| !step.produces(name))
                .cloned()
                .collect();

            for parameter in step.parameters() {
                let covered = self
                    .producer(parameter)
                    .map(|p| p == producer || replaced.contains(&p))
                    .unwrap_or(false);
                if !covered && !next.contains(parameter) {
                    next.push(parameter.clone());
                }
            }

            let mut next_replaced = replaced.clone();
            next_replaced.push(producer);
            self.expand_combinations(next, next_replaced, results, explored);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::PipeflowError;
    use crate::pipeline::fixtures::{arithmetic_graph, sweep_graph};

    fn strings(items: &[&[&str]]) -> Vec<Vec<String>> {
        items
            .iter()
            .map(|c| c.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_resolve_from_roots() {
        let graph = arithmetic_graph();
        let resolution = graph.resolve("e", ["a", "b", "x"]).unwrap();
        assert_eq!(resolution.plan, vec![0, 1, 2]);
        assert!(resolution.is_complete());
    }

    #[test]
    fn test_resolve_short_circuits_supplied_intermediates() {
        let graph = arithmetic_graph();
        let resolution = graph.resolve("e", ["c", "d"]).unwrap();
        assert_eq!(resolution.plan, vec![2]);
        assert!(resolution.missing.is_empty());
    }

    #[test]
    fn test_resolve_reports_missing_roots() {
        let graph = arithmetic_graph();
        let resolution = graph.resolve("e", ["c"]).unwrap();
        assert_eq!(resolution.plan, vec![1, 2]);
        assert_eq!(resolution.missing, vec!["b"]);

        let err = resolution.ensure_complete("e").unwrap_err();
        assert!(matches!(err, PipeflowError::UnresolvableInput { .. }));
    }

    #[test]
    fn test_resolve_supplied_output_is_empty_plan() {
        let graph = arithmetic_graph();
        let resolution = graph.resolve("e", ["e"]).unwrap();
        assert!(resolution.plan.is_empty());
    }

    #[test]
    fn test_plan_is_topological() {
        let graph = sweep_graph();
        let resolution = graph.resolve("i", ["x", "y", "z"]).unwrap();
        for (pos, &idx) in resolution.plan.iter().enumerate() {
            for dep in graph.dependencies(idx) {
                let dep_pos = resolution.plan.iter().position(|&p| p == dep).unwrap();
                assert!(dep_pos < pos);
            }
        }
        assert_eq!(resolution.plan.len(), 4);
    }

    #[test]
    fn test_root_args_sorted() {
        let graph = arithmetic_graph();
        assert_eq!(graph.root_args("e").unwrap(), vec!["a", "b", "x"]);
        assert_eq!(graph.root_args("c").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_all_arg_combinations() {
        let graph = arithmetic_graph();
        let combos = graph.arg_combinations("e").unwrap();
        assert_eq!(
            combos,
            strings(&[
                &["a", "b", "d", "x"],
                &["a", "b", "x"],
                &["b", "c", "x"],
                &["c", "d", "x"],
            ])
        );
    }

    #[test]
    fn test_arg_combinations_idempotent_and_resolvable() {
        let graph = sweep_graph();
        let first = graph.arg_combinations("i").unwrap();
        let second = graph.arg_combinations("i").unwrap();
        assert_eq!(first, second);

        for combo in &first {
            assert!(!combo.contains(&"i".to_string()));
            let resolution = graph.resolve("i", combo.iter().map(String::as_str)).unwrap();
            assert!(resolution.is_complete(), "combination {:?} does not resolve", combo);
        }

        let roots = graph.root_args("i").unwrap();
        assert!(first.contains(&roots));
    }

    #[test]
    fn test_multi_output_producer_replaced_once() {
        let graph = sweep_graph();
        let combos = graph.arg_combinations("c").unwrap();
        assert_eq!(combos, strings(&[&["a", "x", "z"], &["x", "y", "z"]]));
    }
}
