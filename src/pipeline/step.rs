// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline steps
//!
//! A step wraps a callable together with the names it consumes and the
//! names it produces. Steps declare their parameter names explicitly; the
//! dependency graph is synthesized from those names.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::{Kwargs, Value};

/// Callable behind a step
pub type StepFn = Arc<dyn Fn(&Kwargs) -> anyhow::Result<Value> + Send + Sync>;

/// Selects the value of one named output from a step's raw return value
pub type OutputPicker = Arc<dyn Fn(&Value, &str) -> anyhow::Result<Value> + Send + Sync>;

/// A registered computation unit
#[derive(Clone)]
pub struct Step {
    name: String,
    parameters: Vec<String>,
    defaults: IndexMap<String, Value>,
    outputs: Vec<String>,
    func: Option<StepFn>,
    output_picker: Option<OutputPicker>,
    cache: bool,
    profile: bool,
}

impl Step {
    /// Create a step producing a single output
    pub fn new<P, S, F>(name: impl Into<String>, parameters: P, output: impl Into<String>, func: F) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Kwargs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            defaults: IndexMap::new(),
            outputs: vec![output.into()],
            func: Some(Arc::new(func)),
            output_picker: None,
            cache: false,
            profile: false,
        }
    }

    /// Create a step that only carries its signature
    ///
    /// Signature-only steps take part in graph construction, resolution,
    /// reduction and sweep planning, but fail when invoked.
    pub fn signature<P, S>(name: impl Into<String>, parameters: P, output: impl Into<String>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            defaults: IndexMap::new(),
            outputs: vec![output.into()],
            func: None,
            output_picker: None,
            cache: false,
            profile: false,
        }
    }

    /// Declare several outputs; the raw return value is split between them
    pub fn with_outputs<O, S>(mut self, outputs: O) -> Self
    where
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// Set a default value for a parameter
    pub fn with_default(mut self, parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(parameter.into(), value.into());
        self
    }

    /// Set the output picker used for multi-output steps
    pub fn with_output_picker<F>(mut self, picker: F) -> Self
    where
        F: Fn(&Value, &str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.output_picker = Some(Arc::new(picker));
        self
    }

    /// Enable or disable result caching
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Enable or disable profiling
    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    /// Bind an implementation to this step
    pub fn with_func(mut self, func: StepFn) -> Self {
        self.func = Some(func);
        self
    }

    pub(crate) fn with_shared_picker(mut self, picker: Option<OutputPicker>) -> Self {
        self.output_picker = picker;
        self
    }

    pub(crate) fn with_defaults(mut self, defaults: IndexMap<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Step name, used in logs, errors and graph renders
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered parameter names
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Default values by parameter name
    pub fn defaults(&self) -> &IndexMap<String, Value> {
        &self.defaults
    }

    /// Default for a single parameter
    pub fn default_for(&self, parameter: &str) -> Option<&Value> {
        self.defaults.get(parameter)
    }

    /// Declared output names
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Whether this step declares `output`
    pub fn produces(&self, output: &str) -> bool {
        self.outputs.iter().any(|o| o == output)
    }

    /// `c` for single-output steps, `(a, b)` otherwise
    pub fn output_label(&self) -> String {
        if self.outputs.len() == 1 {
            self.outputs[0].clone()
        } else {
            format!("({})", self.outputs.join(", "))
        }
    }

    pub fn cache(&self) -> bool {
        self.cache
    }

    pub fn profile(&self) -> bool {
        self.profile
    }

    pub fn has_implementation(&self) -> bool {
        self.func.is_some()
    }

    pub(crate) fn output_picker(&self) -> Option<&OutputPicker> {
        self.output_picker.as_ref()
    }

    /// Call the underlying function
    pub fn invoke(&self, kwargs: &Kwargs) -> PipeflowResult<Value> {
        let func = self
            .func
            .as_ref()
            .ok_or_else(|| PipeflowError::MissingImplementation {
                step: self.name.clone(),
            })?;

        func(kwargs).map_err(|e| PipeflowError::step_failed(&self.name, kwargs, e))
    }

    /// Select the value for `output` from a raw return value
    pub fn pick(&self, raw: &Value, output: &str) -> PipeflowResult<Value> {
        if self.outputs.len() == 1 {
            return Ok(raw.clone());
        }

        if let Some(picker) = &self.output_picker {
            return picker(raw, output).map_err(|e| PipeflowError::OutputPicking {
                step: self.name.clone(),
                output: output.to_string(),
                reason: format!("{:#}", e),
            });
        }

        let picked = match raw {
            Value::Array(items) => {
                if items.len() != self.outputs.len() {
                    return Err(PipeflowError::OutputPicking {
                        step: self.name.clone(),
                        output: output.to_string(),
                        reason: format!(
                            "expected {} values, got {}",
                            self.outputs.len(),
                            items.len()
                        ),
                    });
                }
                self.outputs
                    .iter()
                    .position(|o| o == output)
                    .and_then(|i| items.get(i))
            }
            Value::Object(map) => map.get(output),
            _ => None,
        };

        picked.cloned().ok_or_else(|| PipeflowError::OutputPicking {
            step: self.name.clone(),
            output: output.to_string(),
            reason: format!("cannot select from {}", raw),
        })
    }

    /// Split a raw return value into every declared output
    pub fn split_outputs(&self, raw: &Value) -> PipeflowResult<Vec<(String, Value)>> {
        self.outputs
            .iter()
            .map(|o| Ok((o.clone(), self.pick(raw, o)?)))
            .collect()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("defaults", &self.defaults)
            .field("outputs", &self.outputs)
            .field("cache", &self.cache)
            .field("profile", &self.profile)
            .finish()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            self.name,
            self.parameters.join(", "),
            self.output_label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair() -> Step {
        Step::new("pair", ["x"], "a", |kw| {
            let x = kw["x"].as_i64().unwrap_or_default();
            Ok(json!([x, x * 10]))
        })
        .with_outputs(["a", "b"])
    }

    #[test]
    fn test_default_picker_by_position() {
        let step = pair();
        let mut kwargs = Kwargs::new();
        kwargs.insert("x".into(), json!(2));

        let raw = step.invoke(&kwargs).unwrap();
        let split = step.split_outputs(&raw).unwrap();
        assert_eq!(split, vec![("a".into(), json!(2)), ("b".into(), json!(20))]);
    }

    #[test]
    fn test_default_picker_by_key() {
        let step = Step::new("obj", Vec::<String>::new(), "a", |_| Ok(json!({"a": 1, "b": 2})))
            .with_outputs(["a", "b"]);
        let raw = step.invoke(&Kwargs::new()).unwrap();
        assert_eq!(step.pick(&raw, "b").unwrap(), json!(2));
    }

    #[test]
    fn test_custom_picker() {
        let step = pair().with_output_picker(|raw, name| {
            let base = raw[0].as_i64().unwrap_or_default();
            Ok(json!(if name == "a" { base + 1 } else { base - 1 }))
        });
        let raw = json!([5, 50]);
        assert_eq!(step.pick(&raw, "a").unwrap(), json!(6));
        assert_eq!(step.pick(&raw, "b").unwrap(), json!(4));
    }

    #[test]
    fn test_arity_mismatch_in_raw_tuple() {
        let step = pair();
        let err = step.pick(&json!([1]), "a").unwrap_err();
        assert!(matches!(err, PipeflowError::OutputPicking { .. }));
    }

    #[test]
    fn test_signature_only_step_fails_on_invoke() {
        let step = Step::signature("f", ["a"], "b");
        let err = step.invoke(&Kwargs::new()).unwrap_err();
        assert!(matches!(err, PipeflowError::MissingImplementation { .. }));
    }

    #[test]
    fn test_callable_error_is_wrapped() {
        let step = Step::new("bad", ["a"], "b", |_| anyhow::bail!("nope"));
        let err = step.invoke(&Kwargs::new()).unwrap_err();
        assert!(matches!(err, PipeflowError::StepFailed { ref step, .. } if step == "bad"));
    }

    #[test]
    fn test_display() {
        assert_eq!(pair().to_string(), "pair(x) -> (a, b)");
    }
}
