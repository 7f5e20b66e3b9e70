// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Sweep executors
//!
//! An executor evaluates one bound function over many argument sets. The
//! engine itself stays synchronous; parallelism lives entirely here.

mod sequential;
mod thread_pool;

pub use sequential::SequentialExecutor;
pub use thread_pool::ThreadPoolExecutor;

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::PipeflowResult;
use crate::pipeline::BoundFunction;
use crate::{Kwargs, Value};

/// Trait for sweep executors
#[async_trait]
pub trait Executor: Send + Sync {
    /// Evaluate `function` for every input
    ///
    /// Results are returned in input order. The first failure observed
    /// aborts the map with its error: no further input is started, and no
    /// invocation is still running once `map` returns.
    async fn map(
        &self,
        function: Arc<BoundFunction>,
        inputs: Vec<Kwargs>,
    ) -> PipeflowResult<Vec<Value>>;

    /// Executor name, for logs
    fn name(&self) -> &str;
}

/// Pick an executor for `workers` threads; one worker means sequential
pub fn create_executor(workers: usize) -> Box<dyn Executor> {
    if workers <= 1 {
        Box::new(SequentialExecutor::new())
    } else {
        Box::new(ThreadPoolExecutor::new(workers))
    }
}
