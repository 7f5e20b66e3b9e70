// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Output-anchored views of a pipeline

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::cache::Cache;
use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::{LazyCall, PlanExecutor, Resolution};
use crate::{Kwargs, Value};

/// A pipeline bound to one output
///
/// Callable with any argument set that resolves the output: root arguments,
/// intermediate values, or a mix. Safe to share between worker threads.
pub struct BoundFunction {
    output: String,
    executor: PlanExecutor,
    root_args: Vec<String>,
    combinations: OnceLock<Vec<Vec<String>>>,
}

impl BoundFunction {
    pub(crate) fn new(output: impl Into<String>, executor: PlanExecutor) -> PipeflowResult<Self> {
        let output = output.into();
        let root_args = executor.graph().root_args(&output)?;

        Ok(Self {
            output,
            executor,
            root_args,
            combinations: OnceLock::new(),
        })
    }

    /// The output this function computes
    pub fn output_name(&self) -> &str {
        &self.output
    }

    /// Sorted root arguments; the positional order of `call_with_root_args`
    pub fn root_args(&self) -> &[String] {
        &self.root_args
    }

    /// Every valid argument combination, computed once
    pub fn arg_combinations(&self) -> PipeflowResult<&[Vec<String>]> {
        if let Some(combinations) = self.combinations.get() {
            return Ok(combinations);
        }
        let computed = self.executor.graph().arg_combinations(&self.output)?;
        Ok(self.combinations.get_or_init(|| computed))
    }

    /// Resolve the plan for a set of supplied argument names
    pub fn plan<'a, I>(&self, supplied: I) -> PipeflowResult<Resolution>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.executor.graph().resolve(&self.output, supplied)
    }

    /// Cache used by this function, if any
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.executor.cache()
    }

    /// Compute the output
    pub fn call(&self, kwargs: &Kwargs) -> PipeflowResult<Value> {
        let mut values = self.executor.run(&self.output, kwargs)?;
        values.swap_remove(&self.output).ok_or_else(|| PipeflowError::UnresolvableInput {
            output: self.output.clone(),
            missing: vec![self.output.clone()],
        })
    }

    /// Same as [`call`](Self::call); the entry point used by executors
    pub fn call_with_dict(&self, kwargs: &Kwargs) -> PipeflowResult<Value> {
        self.call(kwargs)
    }

    /// Compute the output and return every value seen on the way
    pub fn call_full_output(&self, kwargs: &Kwargs) -> PipeflowResult<Kwargs> {
        self.executor.run(&self.output, kwargs)
    }

    /// Prepare a call without running any step
    ///
    /// Fails right away when the arguments cannot resolve the output.
    pub fn call_lazy(&self, kwargs: &Kwargs) -> PipeflowResult<LazyCall> {
        LazyCall::new(&self.output, self.executor.clone(), kwargs.clone())
    }

    /// Call with positional root argument values, in `root_args` order
    pub fn call_with_root_args(&self, values: &[Value]) -> PipeflowResult<Value> {
        if values.len() != self.root_args.len() {
            return Err(PipeflowError::Arity {
                output: self.output.clone(),
                expected: self.root_args.len(),
                got: values.len(),
                root_args: self.root_args.clone(),
            });
        }

        let kwargs: Kwargs = self
            .root_args
            .iter()
            .cloned()
            .zip(values.iter().cloned())
            .collect();
        self.call(&kwargs)
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("output", &self.output)
            .field("root_args", &self.root_args)
            .field("executor", &self.executor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures::{arithmetic_graph, kwargs};
    use serde_json::json;

    fn bound(output: &str) -> BoundFunction {
        BoundFunction::new(output, PlanExecutor::new(Arc::new(arithmetic_graph()))).unwrap()
    }

    #[test]
    fn test_call_from_roots_and_intermediates() {
        let e = bound("e");
        assert_eq!(e.call(&kwargs(&[("a", 2), ("b", 3), ("x", 1)])).unwrap(), json!(75));
        assert_eq!(e.call(&kwargs(&[("c", 5), ("d", 15), ("x", 1)])).unwrap(), json!(75));
    }

    #[test]
    fn test_positional_matches_keyword() {
        let e = bound("e");
        assert_eq!(e.root_args(), &["a", "b", "x"]);

        let positional = e.call_with_root_args(&[json!(1), json!(2), json!(1)]).unwrap();
        let keyword = e.call(&kwargs(&[("a", 1), ("b", 2), ("x", 1)])).unwrap();
        assert_eq!(positional, keyword);
    }

    #[test]
    fn test_positional_arity() {
        let err = bound("e").call_with_root_args(&[json!(1)]).unwrap_err();
        assert!(matches!(err, PipeflowError::Arity { expected: 3, got: 1, .. }));
    }

    #[test]
    fn test_full_output() {
        let values = bound("e")
            .call_full_output(&kwargs(&[("a", 2), ("b", 3), ("x", 1)]))
            .unwrap();
        let names: Vec<&str> = values.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b", "x", "c", "d", "e"]);
    }

    #[test]
    fn test_supplied_output_is_returned() {
        assert_eq!(bound("c").call(&kwargs(&[("c", 9)])).unwrap(), json!(9));
    }

    #[test]
    fn test_unknown_output() {
        let result = BoundFunction::new("zzz", PlanExecutor::new(Arc::new(arithmetic_graph())));
        assert!(matches!(result, Err(PipeflowError::UnknownOutput { .. })));
    }

    #[test]
    fn test_arg_combinations_memoized() {
        let e = bound("e");
        let first = e.arg_combinations().unwrap().to_vec();
        let second = e.arg_combinations().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }
}
