// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Graph reduction
//!
//! Merges chains of steps whose outputs are consumed by a single downstream
//! group into one synthetic step. Only the requested outputs stay
//! observable; merged intermediates disappear from the reduced graph.

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::{PipelineGraph, Step};
use crate::{Kwargs, Value};

/// Build a reduced graph that computes `outputs`
///
/// The input graph is left untouched.
pub fn reduce(graph: &PipelineGraph, outputs: &[&str]) -> PipeflowResult<PipelineGraph> {
    let label = outputs.join(", ");
    if outputs.is_empty() {
        return Err(PipeflowError::MergeConflict {
            output: label,
            reason: "no outputs requested".into(),
        });
    }

    let mut heads = Vec::with_capacity(outputs.len());
    for output in outputs {
        let head = graph.producer_of(output)?;
        if !heads.contains(&head) {
            heads.push(head);
        }
    }

    let keep = graph.ancestors(&heads);
    let kept: HashSet<usize> = keep.iter().copied().collect();

    // Reverse topological walk: consumers are assigned before producers.
    let mut group_of: HashMap<usize, usize> = HashMap::new();
    for &idx in keep.iter().rev() {
        if heads.contains(&idx) {
            group_of.insert(idx, idx);
            continue;
        }

        let groups: BTreeSet<usize> = graph
            .dependents(idx)
            .into_iter()
            .filter(|c| kept.contains(c))
            .filter_map(|c| group_of.get(&c).copied())
            .collect();

        let group = match groups.len() {
            1 => groups.into_iter().next().unwrap_or(idx),
            _ => idx,
        };
        group_of.insert(idx, group);
    }

    let roots: BTreeSet<usize> = group_of.values().copied().collect();
    let mut groups: IndexMap<usize, Vec<usize>> =
        roots.into_iter().map(|root| (root, Vec::new())).collect();
    for &idx in &keep {
        if let Some(members) = group_of.get(&idx).and_then(|g| groups.get_mut(g)) {
            members.push(idx);
        }
    }

    let mut steps: Vec<Arc<Step>> = Vec::with_capacity(groups.len());
    for (root, members) in groups {
        if members.len() == 1 {
            steps.push(Arc::clone(graph.step(root)));
        } else {
            steps.push(Arc::new(merge_group(graph, root, &members, &label)?));
        }
    }
    let steps: Vec<Arc<Step>> = steps
        .into_iter()
        .map(|step| carry_pipeline_defaults(graph, step))
        .collect();

    tracing::debug!(
        before = graph.len(),
        after = steps.len(),
        outputs = %label,
        "reduced pipeline graph"
    );

    PipelineGraph::build(steps).map_err(|e| PipeflowError::MergeConflict {
        output: label,
        reason: e.to_string(),
    })
}

/// Merge a group (members in topological order, root last) into one step
fn merge_group(
    graph: &PipelineGraph,
    root: usize,
    members: &[usize],
    label: &str,
) -> PipeflowResult<Step> {
    let steps: Vec<Arc<Step>> = members.iter().map(|&m| Arc::clone(graph.step(m))).collect();
    let root_step = Arc::clone(graph.step(root));

    let internal: HashSet<&str> = steps
        .iter()
        .flat_map(|s| s.outputs().iter().map(String::as_str))
        .collect();

    let mut parameters: Vec<String> = Vec::new();
    let mut defaults: IndexMap<String, Value> = IndexMap::new();
    let mut default_owner: HashMap<String, &str> = HashMap::new();

    for step in &steps {
        for parameter in step.parameters() {
            if internal.contains(parameter.as_str()) {
                continue;
            }
            if !parameters.contains(parameter) {
                parameters.push(parameter.clone());
            }
            if let Some(value) = step.default_for(parameter) {
                match defaults.get(parameter) {
                    Some(existing) if existing != value => {
                        return Err(PipeflowError::MergeConflict {
                            output: label.to_string(),
                            reason: format!(
                                "'{}' and '{}' disagree on the default of '{}'",
                                default_owner.get(parameter).copied().unwrap_or_default(),
                                step.name(),
                                parameter
                            ),
                        });
                    }
                    Some(_) => {}
                    None => {
                        defaults.insert(parameter.clone(), value.clone());
                        default_owner.insert(parameter.clone(), step.name());
                    }
                }
            }
        }
    }

    let name = steps.iter().map(|s| s.name()).collect::<Vec<_>>().join("+");
    let members = steps.clone();

    let merged = Step::new(name, parameters, root_step.outputs()[0].clone(), move |kwargs| {
        run_members(&members, kwargs)
    })
    .with_outputs(root_step.outputs().iter().cloned())
    .with_shared_picker(root_step.output_picker().cloned())
    .with_defaults(defaults)
    .with_cache(root_step.cache())
    .with_profile(root_step.profile());

    Ok(merged)
}

/// Pin pipeline-wide root defaults onto a step
///
/// A default declared by a step that did not survive the reduction must
/// still apply to the steps that did.
fn carry_pipeline_defaults(graph: &PipelineGraph, step: Arc<Step>) -> Arc<Step> {
    let missing: Vec<(String, Value)> = step
        .parameters()
        .iter()
        .filter(|p| step.default_for(p).is_none())
        .filter_map(|p| graph.default_for(p).map(|v| (p.clone(), v.clone())))
        .collect();

    if missing.is_empty() {
        return step;
    }

    let mut pinned = (*step).clone();
    for (parameter, value) in missing {
        pinned = pinned.with_default(parameter, value);
    }
    Arc::new(pinned)
}

/// Run merged members in order and return the last member's raw result
fn run_members(members: &[Arc<Step>], kwargs: &Kwargs) -> anyhow::Result<Value> {
    let mut values = kwargs.clone();
    let (last, inner) = members
        .split_last()
        .ok_or_else(|| anyhow::anyhow!("merged step has no members"))?;

    for step in inner {
        let args = member_args(step, &values)?;
        let raw = step.invoke(&args)?;
        for (name, value) in step.split_outputs(&raw)? {
            values.insert(name, value);
        }
    }

    let args = member_args(last, &values)?;
    Ok(last.invoke(&args)?)
}

fn member_args(step: &Step, values: &Kwargs) -> anyhow::Result<Kwargs> {
    step.parameters()
        .iter()
        .map(|p| {
            let value = values
                .get(p)
                .or_else(|| step.default_for(p))
                .ok_or_else(|| anyhow::anyhow!("'{}' has no value for '{}'", step.name(), p))?;
            Ok((p.clone(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures::{arithmetic_graph, int, kwargs, sweep_graph};
    use crate::pipeline::PlanExecutor;
    use serde_json::json;

    fn names(graph: &PipelineGraph) -> Vec<String> {
        graph.steps().iter().map(|s| s.name().to_string()).collect()
    }

    #[test]
    fn test_chain_collapses_into_one_step() {
        let graph = arithmetic_graph();
        let reduced = reduce(&graph, &["e"]).unwrap();

        assert_eq!(names(&reduced), vec!["f_c+f_d+f_e"]);
        assert_eq!(reduced.step(0).parameters(), &["a", "b", "x"]);
        assert_eq!(reduced.step(0).default_for("x"), Some(&json!(1)));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_reduced_results_match() {
        let graph = Arc::new(sweep_graph());
        let reduced = Arc::new(reduce(&graph, &["i"]).unwrap());
        let args = kwargs(&[("x", 2), ("y", 5), ("z", 1)]);

        let original = PlanExecutor::new(graph).run("i", &args).unwrap();
        let merged = PlanExecutor::new(reduced).run("i", &args).unwrap();
        assert_eq!(original["i"], merged["i"]);
        assert!(!merged.contains_key("aa"));
    }

    #[test]
    fn test_shared_producer_is_retained() {
        let graph = sweep_graph();
        let reduced = reduce(&graph, &["c", "i"]).unwrap();
        assert_eq!(names(&reduced), vec!["f_ab", "f_cd", "f_aa+f_i"]);

        let executor = PlanExecutor::new(Arc::new(reduced));
        let args = kwargs(&[("x", 2), ("y", 5), ("z", 1)]);
        let values = executor.run("i", &args).unwrap();
        // a = 6, b = 4, c = 12, d = 6, aa = 12, i = 12 + 2 + 6
        assert_eq!(values["i"], json!(20));
        assert_eq!(executor.run("c", &args).unwrap()["c"], json!(12));
    }

    #[test]
    fn test_unrelated_steps_dropped() {
        let graph = sweep_graph();
        let reduced = reduce(&graph, &["c"]).unwrap();
        assert_eq!(names(&reduced), vec!["f_ab+f_cd"]);
        assert_eq!(reduced.step(0).outputs(), &["c", "d"]);
    }

    #[test]
    fn test_conflicting_member_defaults() {
        // `p` has a producer, so its step-level defaults are not merged at build time.
        let steps = vec![
            Arc::new(Step::signature("P", ["a"], "p")),
            Arc::new(Step::signature("Q", ["p"], "q")),
            Arc::new(Step::signature("g", ["p"], "c").with_default("p", 1)),
            Arc::new(Step::signature("h", ["c", "p"], "d").with_default("p", 2)),
        ];
        let graph = PipelineGraph::build(steps).unwrap();

        let err = reduce(&graph, &["q", "d"]).unwrap_err();
        assert!(matches!(err, PipeflowError::MergeConflict { .. }));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_internal_defaults_are_dropped() {
        let f = Step::signature("f", ["a", "k"], "b").with_default("k", 1);
        let g = Step::signature("g", ["b", "m"], "c").with_default("b", 5);
        let h = Step::signature("h", ["c", "m"], "d").with_default("m", 3);
        let j = Step::signature("j", ["m"], "e");
        let graph = PipelineGraph::build(vec![Arc::new(f), Arc::new(g), Arc::new(h), Arc::new(j)]).unwrap();

        let reduced = reduce(&graph, &["d"]).unwrap();
        assert_eq!(names(&reduced), vec!["f+g+h"]);

        let merged = reduced.step(0);
        assert_eq!(merged.parameters(), &["a", "k", "m"]);
        assert_eq!(merged.defaults().keys().collect::<Vec<_>>(), vec!["k", "m"]);
    }

    #[test]
    fn test_defaults_of_dropped_steps_survive() {
        let f = Step::new("f", ["a", "x"], "b", |kw| Ok(json!(int(kw, "a")? + int(kw, "x")?)));
        let g = Step::signature("g", ["b", "x"], "c").with_default("x", 10);
        let graph = PipelineGraph::build(vec![Arc::new(f), Arc::new(g)]).unwrap();

        let reduced = Arc::new(reduce(&graph, &["b"]).unwrap());
        assert_eq!(names(&reduced), vec!["f"]);
        assert_eq!(reduced.step(0).default_for("x"), Some(&json!(10)));

        let values = PlanExecutor::new(reduced).run("b", &kwargs(&[("a", 2)])).unwrap();
        assert_eq!(values["b"], json!(12));
    }

    #[test]
    fn test_unknown_output() {
        let graph = arithmetic_graph();
        assert!(matches!(
            reduce(&graph, &["nope"]),
            Err(PipeflowError::UnknownOutput { .. })
        ));
    }
}
