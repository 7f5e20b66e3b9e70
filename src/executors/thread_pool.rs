// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Thread pool executor
//!
//! Dispatches inputs to tokio's blocking pool, with at most `workers`
//! invocations in flight. A failure stops dispatching; invocations already
//! running finish before the error is returned.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::Executor;
use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::BoundFunction;
use crate::{Kwargs, Value};

/// Runs inputs concurrently on blocking worker threads
#[derive(Debug, Clone)]
pub struct ThreadPoolExecutor {
    workers: usize,
}

impl ThreadPoolExecutor {
    /// Create an executor with `workers` concurrent invocations (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ThreadPoolExecutor {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::new(workers)
    }
}

#[async_trait]
impl Executor for ThreadPoolExecutor {
    async fn map(
        &self,
        function: Arc<BoundFunction>,
        inputs: Vec<Kwargs>,
    ) -> PipeflowResult<Vec<Value>> {
        let mut results: Vec<Option<Value>> = vec![None; inputs.len()];
        let mut pending = inputs.into_iter().enumerate();
        let mut running = JoinSet::new();

        loop {
            while running.len() < self.workers {
                let Some((index, kwargs)) = pending.next() else {
                    break;
                };
                let function = Arc::clone(&function);
                running.spawn_blocking(move || (index, function.call_with_dict(&kwargs)));
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let outcome = joined
                .map_err(|e| PipeflowError::WorkerFailed {
                    message: e.to_string(),
                })
                .and_then(|(index, result)| result.map(|value| (index, value)));

            match outcome {
                Ok((index, value)) => results[index] = Some(value),
                Err(e) => {
                    // Running invocations cannot be interrupted; wait for them
                    running.abort_all();
                    while running.join_next().await.is_some() {}
                    tracing::debug!(error = %e, "thread pool map aborted");
                    return Err(e);
                }
            }
        }

        tracing::debug!(points = results.len(), workers = self.workers, "thread pool map finished");
        Ok(results.into_iter().flatten().collect())
    }

    fn name(&self) -> &str {
        "thread_pool"
    }
}
