// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! In-memory cache implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::{Cache, CacheKey, CacheStats};
use crate::errors::{PipeflowError, PipeflowResult};
use crate::Value;

/// Thread-safe in-memory cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> PipeflowError {
        PipeflowError::CacheError {
            message: "cache lock poisoned by a panicking writer".into(),
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &CacheKey) -> PipeflowResult<Option<Value>> {
        let entries = self.entries.read().map_err(Self::poisoned)?;
        let value = entries.get(key).cloned();

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        Ok(value)
    }

    fn put_if_absent(&self, key: CacheKey, value: Value) -> PipeflowResult<bool> {
        let mut entries = self.entries.write().map_err(Self::poisoned)?;
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(key, value);
        Ok(true)
    }

    fn invalidate(&self, key: &CacheKey) -> PipeflowResult<()> {
        self.entries.write().map_err(Self::poisoned)?.remove(key);
        Ok(())
    }

    fn clear(&self) -> PipeflowResult<()> {
        self.entries.write().map_err(Self::poisoned)?.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn stats(&self) -> PipeflowResult<CacheStats> {
        let entries = self.entries.read().map_err(Self::poisoned)?.len();
        Ok(CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
}
