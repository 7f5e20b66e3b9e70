// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipelines shared by unit tests

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::pipeline::{PipelineGraph, Step};
use crate::Kwargs;

pub(crate) fn int(kwargs: &Kwargs, name: &str) -> anyhow::Result<i64> {
    kwargs
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow::anyhow!("'{}' is not an integer", name))
}

pub(crate) fn kwargs(pairs: &[(&str, i64)]) -> Kwargs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect()
}

/// `f_c(a, b) = a + b`, `f_d(b, c, x=1) = b * c`, `f_e(c, d, x=1) = c * d * x`
pub(crate) fn arithmetic_steps() -> Vec<Step> {
    vec![
        Step::new("f_c", ["a", "b"], "c", |kw| Ok(json!(int(kw, "a")? + int(kw, "b")?))),
        Step::new("f_d", ["b", "c", "x"], "d", |kw| Ok(json!(int(kw, "b")? * int(kw, "c")?)))
            .with_default("x", 1),
        Step::new("f_e", ["c", "d", "x"], "e", |kw| {
            Ok(json!(int(kw, "c")? * int(kw, "d")? * int(kw, "x")?))
        })
        .with_default("x", 1),
    ]
}

pub(crate) fn arithmetic_graph() -> PipelineGraph {
    PipelineGraph::build(arithmetic_steps().into_iter().map(Arc::new).collect())
        .expect("arithmetic pipeline is valid")
}

/// `f_ab(y, z) -> (a, b)`, `f_cd(x, a, z) -> (c, d)`, `f_aa(a) -> aa`,
/// `f_i(aa, x, d) -> i`
pub(crate) fn sweep_steps() -> Vec<Step> {
    vec![
        Step::new("f_ab", ["y", "z"], "a", |kw| {
            let (y, z) = (int(kw, "y")?, int(kw, "z")?);
            Ok(json!([y + z, y - z]))
        })
        .with_outputs(["a", "b"]),
        Step::new("f_cd", ["x", "a", "z"], "c", |kw| {
            let (x, a, z) = (int(kw, "x")?, int(kw, "a")?, int(kw, "z")?);
            Ok(json!([x * a, a * z]))
        })
        .with_outputs(["c", "d"]),
        Step::new("f_aa", ["a"], "aa", |kw| Ok(json!(2 * int(kw, "a")?))),
        Step::new("f_i", ["aa", "x", "d"], "i", |kw| {
            Ok(json!(int(kw, "aa")? + int(kw, "x")? + int(kw, "d")?))
        }),
    ]
}

pub(crate) fn sweep_graph() -> PipelineGraph {
    PipelineGraph::build(sweep_steps().into_iter().map(Arc::new).collect())
        .expect("sweep pipeline is valid")
}

/// A step that counts its invocations
pub(crate) fn counting_step(
    name: &str,
    params: &[&str],
    output: &str,
    calls: Arc<AtomicUsize>,
) -> Step {
    let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
    let summed = params.clone();
    Step::new(name, params, output, move |kw| {
        calls.fetch_add(1, Ordering::SeqCst);
        let mut total = 0;
        for p in &summed {
            total += int(kw, p)?;
        }
        Ok(json!(total))
    })
}
