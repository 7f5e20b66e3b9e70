// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Named step implementations
//!
//! Pipeline definition files only describe signatures. A [`StepRegistry`]
//! maps implementation names to Rust callables so the two can be bound.

use std::collections::HashMap;
use std::sync::Arc;

use crate::pipeline::{OutputPicker, StepFn};
use crate::{Kwargs, Value};

/// Lookup table from implementation name to callable
#[derive(Default, Clone)]
pub struct StepRegistry {
    functions: HashMap<String, StepFn>,
    pickers: HashMap<String, OutputPicker>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&Kwargs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(func));
        self
    }

    /// Register an output picker for a multi-output step
    pub fn register_picker<F>(&mut self, name: impl Into<String>, picker: F) -> &mut Self
    where
        F: Fn(&Value, &str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.pickers.insert(name.into(), Arc::new(picker));
        self
    }

    pub fn get(&self, name: &str) -> Option<&StepFn> {
        self.functions.get(name)
    }

    pub fn picker(&self, name: &str) -> Option<&OutputPicker> {
        self.pickers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered implementation names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("functions", &self.names())
            .field("pickers", &self.pickers.len())
            .finish()
    }
}
