// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Sweep planning
//!
//! Counts how often each upstream step would run with the same root
//! arguments across a sweep, and derives from that which steps are worth
//! caching and in which order to precompute them.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::cache::canonical_json;
use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::{CacheMode, Pipeline, Step};
use crate::sweep::Combinations;
use crate::{Kwargs, Value};

/// Repetitions of a root tuple from which caching a step pays off
pub const DEFAULT_MIN_EXECUTIONS: usize = 2;

/// How often one distinct root-argument tuple occurs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyCount {
    /// Values, aligned with [`StepCounts::root_args`]
    pub values: Vec<Value>,
    pub count: usize,
}

/// Root-argument tuple counts of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCounts {
    /// Step declaration index
    pub step: usize,
    pub name: String,
    /// Output label, `c` or `(a, b)`
    pub output: String,
    /// Sorted root arguments the step depends on
    pub root_args: Vec<String>,
    /// Distinct tuples in order of first occurrence
    pub keys: Vec<KeyCount>,
}

impl StepCounts {
    /// Number of distinct tuples
    pub fn distinct(&self) -> usize {
        self.keys.len()
    }

    /// Largest multiplicity of any tuple
    pub fn max_count(&self) -> usize {
        self.keys.iter().map(|k| k.count).max().unwrap_or(0)
    }

    /// Total number of executions without caching
    pub fn total(&self) -> usize {
        self.keys.iter().map(|k| k.count).sum()
    }

    /// Multiplicity of a specific tuple
    pub fn count_of(&self, values: &[Value]) -> usize {
        self.keys
            .iter()
            .find(|k| k.values == values)
            .map_or(0, |k| k.count)
    }
}

/// Counts for every upstream step of an output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepCounts {
    pub output: String,
    /// Number of sweep points counted
    pub points: usize,
    /// Per-step counts, in topological order
    pub steps: Vec<StepCounts>,
}

impl SweepCounts {
    /// Counts of a step by name
    pub fn get(&self, name: &str) -> Option<&StepCounts> {
        self.steps.iter().find(|s| s.name == name)
    }

    fn by_index(&self, idx: usize) -> Option<&StepCounts> {
        self.steps.iter().find(|s| s.step == idx)
    }
}

/// Outcome of a precalculation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecalculationReport {
    /// Step name and the number of distinct evaluations, in execution order
    pub evaluated: Vec<(String, usize)>,
}

/// Resolve the root tuple of a sweep point, filling absent roots with defaults
fn root_tuple(
    pipeline: &Pipeline,
    step: &Step,
    root_args: &[String],
    point: &Kwargs,
) -> PipeflowResult<Vec<Value>> {
    root_args
        .iter()
        .map(|root| {
            point
                .get(root)
                .or_else(|| pipeline.graph().default_for(root))
                .cloned()
                .ok_or_else(|| PipeflowError::InvalidSweep {
                    reason: format!(
                        "sweep point has no value for '{}' needed by '{}'",
                        root,
                        step.name()
                    ),
                })
        })
        .collect()
}

/// Count distinct root-argument tuples of every step upstream of `output`
///
/// The producer of `output` itself is not counted.
pub fn count_sweep<C>(output: &str, sweep: &C, pipeline: &Pipeline) -> PipeflowResult<SweepCounts>
where
    C: Combinations + ?Sized,
{
    let graph = pipeline.graph();
    let deps = graph.func_dependencies(output)?;

    let mut steps: Vec<StepCounts> = deps
        .iter()
        .map(|&idx| {
            let step = graph.step(idx);
            StepCounts {
                step: idx,
                name: step.name().to_string(),
                output: step.output_label(),
                root_args: graph.step_root_args(idx).to_vec(),
                keys: Vec::new(),
            }
        })
        .collect();
    let mut lookup: Vec<HashMap<String, usize>> = vec![HashMap::new(); steps.len()];

    let mut points = 0;
    for point in sweep.combinations() {
        points += 1;
        for (counts, index) in steps.iter_mut().zip(lookup.iter_mut()) {
            let step = graph.step(counts.step);
            let values = root_tuple(pipeline, step, &counts.root_args, &point)?;
            let key = canonical_json(&Value::Array(values.clone()));

            match index.get(&key) {
                Some(&slot) => counts.keys[slot].count += 1,
                None => {
                    index.insert(key, counts.keys.len());
                    counts.keys.push(KeyCount { values, count: 1 });
                }
            }
        }
    }

    tracing::debug!(output, points, steps = steps.len(), "counted sweep");

    Ok(SweepCounts {
        output: output.to_string(),
        points,
        steps,
    })
}

/// Steps worth precomputing, in a dependency-respecting order
///
/// A step qualifies when some root tuple repeats at least `min_executions`
/// times. Among steps whose dependencies are satisfied, the one with the
/// most executions goes first; ties keep declaration order.
pub fn precalculation_order(
    pipeline: &Pipeline,
    counts: &SweepCounts,
    min_executions: usize,
) -> Vec<usize> {
    let graph = pipeline.graph();
    let selected: Vec<usize> = counts
        .steps
        .iter()
        .filter(|c| c.max_count() >= min_executions)
        .map(|c| c.step)
        .collect();

    let mut indegree: HashMap<usize, usize> = selected.iter().map(|&s| (s, 0)).collect();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    for &a in &selected {
        for &b in &selected {
            if graph.depends_on(b, a) {
                dependents.entry(a).or_default().push(b);
                *indegree.entry(b).or_default() += 1;
            }
        }
    }

    let priority = |idx: usize| {
        let total = counts.by_index(idx).map_or(0, StepCounts::total);
        (total, Reverse(idx))
    };

    let mut ready: BinaryHeap<((usize, Reverse<usize>), usize)> = selected
        .iter()
        .filter(|s| indegree.get(s).copied().unwrap_or(0) == 0)
        .map(|&s| (priority(s), s))
        .collect();
    let mut order = Vec::with_capacity(selected.len());

    while let Some((_, idx)) = ready.pop() {
        order.push(idx);
        for &next in dependents.get(&idx).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = indegree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push((priority(next), next));
                }
            }
        }
    }

    order
}

/// A copy of `pipeline` with caching tuned for a sweep over `output`
///
/// The producer of `output` stops caching; every upstream step caches
/// exactly when one of its root tuples repeats at least `min_executions`
/// times. The copy runs in shared cache mode and shares this pipeline's
/// shared cache when it has one.
pub fn set_cache_for_sweep<C>(
    output: &str,
    pipeline: &Pipeline,
    sweep: &C,
    min_executions: usize,
) -> PipeflowResult<Pipeline>
where
    C: Combinations + ?Sized,
{
    let graph = pipeline.graph();
    let head = graph.producer_of(output)?;
    let counts = count_sweep(output, sweep, pipeline)?;

    let steps: Vec<Step> = graph
        .steps()
        .iter()
        .enumerate()
        .map(|(idx, step)| {
            let step = (**step).clone();
            if idx == head {
                return step.with_cache(false);
            }
            match counts.by_index(idx) {
                Some(c) => {
                    let enable = c.max_count() >= min_executions;
                    tracing::debug!(step = step.name(), n = c.max_count(), enable, "setting cache");
                    step.with_cache(enable)
                }
                None => step,
            }
        })
        .collect();

    let config = pipeline.config().clone().with_cache(CacheMode::Shared);
    pipeline.with_steps(steps, config)
}

/// Evaluate the precalculation order over the distinct sub-sweeps
///
/// Each selected step is computed once per distinct root tuple so that a
/// shared cache is warm before the full sweep runs. Only caching steps of a
/// pipeline in shared cache mode keep their results.
pub fn precalculate<C>(
    output: &str,
    pipeline: &Pipeline,
    sweep: &C,
    min_executions: usize,
) -> PipeflowResult<PrecalculationReport>
where
    C: Combinations + ?Sized,
{
    if pipeline.config().cache != CacheMode::Shared {
        tracing::warn!(
            mode = %pipeline.config().cache,
            "precalculated results are only reused with a shared cache"
        );
    }

    let counts = count_sweep(output, sweep, pipeline)?;
    let order = precalculation_order(pipeline, &counts, min_executions);
    let graph = pipeline.graph();
    let mut report = PrecalculationReport::default();

    for idx in order {
        let step = graph.step(idx);
        let Some(step_counts) = counts.by_index(idx) else {
            continue;
        };
        let target = &step.outputs()[0];

        let mut seen = HashSet::new();
        for key in &step_counts.keys {
            if !seen.insert(canonical_json(&Value::Array(key.values.clone()))) {
                continue;
            }
            let kwargs: Kwargs = step_counts
                .root_args
                .iter()
                .cloned()
                .zip(key.values.iter().cloned())
                .collect();
            pipeline.call(target, &kwargs)?;
        }

        tracing::debug!(step = step.name(), evaluations = seen.len(), "precalculated");
        report.evaluated.push((step.name().to_string(), seen.len()));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures::{counting_step, sweep_steps};
    use crate::pipeline::PipelineConfig;
    use crate::sweep::{Dimension, Sweep};
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sweep_pipeline() -> Pipeline {
        Pipeline::new(sweep_steps(), PipelineConfig::default()).unwrap()
    }

    /// `y` and `x` zipped in pairs, crossed with `z`
    fn paired_sweep() -> Sweep {
        let items: IndexMap<String, Vec<Value>> = [
            ("y", vec![json!(1), json!(2)]),
            ("x", vec![json!(3), json!(4)]),
            ("z", vec![json!(5), json!(6)]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Sweep::new(items)
            .with_dims([Dimension::from(["y", "x"]), Dimension::from("z")])
            .unwrap()
    }

    /// Every point twice, so each root tuple repeats
    fn doubled_points() -> Vec<Kwargs> {
        let sweep = paired_sweep();
        sweep.iter().chain(sweep.iter()).collect()
    }

    #[test]
    fn test_count_sweep() {
        let pipeline = sweep_pipeline();
        let counts = count_sweep("i", &paired_sweep(), &pipeline).unwrap();

        assert_eq!(counts.points, 4);
        assert!(counts.get("f_i").is_none());

        let f_ab = counts.get("f_ab").unwrap();
        assert_eq!(f_ab.root_args, vec!["y", "z"]);
        assert_eq!(f_ab.distinct(), 4);

        let f_aa = counts.get("f_aa").unwrap();
        assert_eq!(f_aa.distinct(), 4);
        assert_eq!(f_aa.total(), 4);

        let f_cd = counts.get("f_cd").unwrap();
        assert_eq!(f_cd.root_args, vec!["x", "y", "z"]);
        assert_eq!(f_cd.count_of(&[json!(3), json!(1), json!(5)]), 1);
    }

    #[test]
    fn test_count_full_cartesian_sweep() {
        let pipeline = sweep_pipeline();
        let items: IndexMap<String, Vec<Value>> = [
            ("y", vec![json!(1), json!(2)]),
            ("x", vec![json!(3), json!(4)]),
            ("z", vec![json!(5), json!(6)]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let counts = count_sweep("i", &Sweep::new(items), &pipeline).unwrap();

        assert_eq!(counts.points, 8);
        for name in ["f_ab", "f_aa"] {
            let step = counts.get(name).unwrap();
            assert_eq!(step.distinct(), 4, "{name}");
            assert_eq!(step.max_count(), 2, "{name}");
        }
        let f_cd = counts.get("f_cd").unwrap();
        assert_eq!(f_cd.distinct(), 8);
        assert_eq!(f_cd.max_count(), 1);

        let order = precalculation_order(&pipeline, &counts, DEFAULT_MIN_EXECUTIONS);
        assert_eq!(order, vec![0, 2]);
        let names: Vec<&str> = order.iter().map(|&s| pipeline.graph().step(s).name()).collect();
        assert_eq!(names, vec!["f_ab", "f_aa"]);
    }

    #[test]
    fn test_count_sweep_fills_defaults() {
        let steps = vec![
            Step::signature("f", ["a", "k"], "b").with_default("k", 1),
            Step::signature("g", ["b"], "c"),
        ];
        let pipeline = Pipeline::new(steps, PipelineConfig::default()).unwrap();
        let points = vec![
            [("a".to_string(), json!(1))].into_iter().collect::<Kwargs>(),
            [("a".to_string(), json!(1))].into_iter().collect::<Kwargs>(),
        ];

        let counts = count_sweep("c", &points, &pipeline).unwrap();
        let f = counts.get("f").unwrap();
        assert_eq!(f.keys, vec![KeyCount { values: vec![json!(1), json!(1)], count: 2 }]);
    }

    #[test]
    fn test_count_sweep_missing_root() {
        let pipeline = sweep_pipeline();
        let points = vec![[("y".to_string(), json!(1))].into_iter().collect::<Kwargs>()];
        assert!(matches!(
            count_sweep("i", &points, &pipeline),
            Err(PipeflowError::InvalidSweep { .. })
        ));
    }

    #[test]
    fn test_precalculation_order_is_topological_subsequence() {
        let pipeline = sweep_pipeline();
        let points = doubled_points();
        let counts = count_sweep("i", &points, &pipeline).unwrap();
        let order = precalculation_order(&pipeline, &counts, 2);

        assert_eq!(order, vec![0, 1, 2]);
        let topo = pipeline.graph().topological_order();
        let positions: Vec<usize> = order
            .iter()
            .map(|s| topo.iter().position(|t| t == s).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(precalculation_order(&pipeline, &counts, 3).is_empty());
    }

    #[test]
    fn test_precalculation_order_prefers_frequent_steps() {
        let pipeline = sweep_pipeline();
        let counts = SweepCounts {
            output: "i".into(),
            points: 0,
            steps: vec![
                StepCounts {
                    step: 0,
                    name: "f_ab".into(),
                    output: "(a, b)".into(),
                    root_args: vec![],
                    keys: vec![KeyCount { values: vec![], count: 2 }],
                },
                StepCounts {
                    step: 1,
                    name: "f_cd".into(),
                    output: "(c, d)".into(),
                    root_args: vec![],
                    keys: vec![KeyCount { values: vec![], count: 3 }],
                },
                StepCounts {
                    step: 2,
                    name: "f_aa".into(),
                    output: "aa".into(),
                    root_args: vec![],
                    keys: vec![KeyCount { values: vec![], count: 5 }],
                },
            ],
        };

        assert_eq!(precalculation_order(&pipeline, &counts, 2), vec![0, 2, 1]);
    }

    #[test]
    fn test_set_cache_for_sweep() {
        let pipeline = sweep_pipeline();
        let tuned = set_cache_for_sweep("i", &pipeline, &doubled_points(), 2).unwrap();

        let cached: Vec<bool> = tuned.graph().steps().iter().map(|s| s.cache()).collect();
        assert_eq!(cached, vec![true, true, true, false]);
        assert_eq!(tuned.config().cache, CacheMode::Shared);

        let untouched = set_cache_for_sweep("i", &pipeline, &paired_sweep(), 2).unwrap();
        assert!(untouched.graph().steps().iter().all(|s| !s.cache()));
        assert!(pipeline.graph().steps().iter().all(|s| !s.cache()));
    }

    #[test]
    fn test_precalculate_warms_shared_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let steps = vec![
            counting_step("f", &["a"], "b", Arc::clone(&calls)),
            counting_step("g", &["b", "k"], "c", Arc::new(AtomicUsize::new(0))),
        ];
        let pipeline = Pipeline::new(steps, PipelineConfig::default()).unwrap();

        let items: IndexMap<String, Vec<Value>> = [
            ("a".to_string(), vec![json!(1), json!(2)]),
            ("k".to_string(), vec![json!(10), json!(20), json!(30)]),
        ]
        .into_iter()
        .collect();
        let sweep = Sweep::new(items);

        let tuned = set_cache_for_sweep("c", &pipeline, &sweep, 2).unwrap();
        let report = precalculate("c", &tuned, &sweep, 2).unwrap();
        assert_eq!(report.evaluated, vec![("f".to_string(), 2)]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        for point in sweep.iter() {
            tuned.call("c", &point).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
