// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Sequential executor

use async_trait::async_trait;
use std::sync::Arc;

use super::Executor;
use crate::errors::PipeflowResult;
use crate::pipeline::BoundFunction;
use crate::{Kwargs, Value};

/// Evaluates inputs one after another on the calling task
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for SequentialExecutor {
    async fn map(
        &self,
        function: Arc<BoundFunction>,
        inputs: Vec<Kwargs>,
    ) -> PipeflowResult<Vec<Value>> {
        inputs.iter().map(|kwargs| function.call_with_dict(kwargs)).collect()
    }

    fn name(&self) -> &str {
        "sequential"
    }
}
