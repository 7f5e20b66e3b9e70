// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Caching layer for step results
//!
//! The engine only talks to a [`Cache`] through `get` and `put_if_absent`,
//! so in-memory, file-backed or networked stores are interchangeable.

mod hash;
mod memory;

pub use hash::{canonical_json, normalize, CacheKey, ContentHasher};
pub use memory::MemoryCache;

use serde::{Deserialize, Serialize};

use crate::errors::PipeflowResult;
use crate::Value;

/// Trait for cache implementations
///
/// Implementations must be safe for concurrent population. Two workers may
/// compute the same key at once; the first completed insert wins and a reader
/// never observes a partially written value.
pub trait Cache: Send + Sync {
    /// Get the cached raw result for a key
    fn get(&self, key: &CacheKey) -> PipeflowResult<Option<Value>>;

    /// Store a result unless the key is already present
    ///
    /// Returns whether the value was inserted.
    fn put_if_absent(&self, key: CacheKey, value: Value) -> PipeflowResult<bool>;

    /// Remove a single entry
    fn invalidate(&self, key: &CacheKey) -> PipeflowResult<()>;

    /// Clear all cached results
    fn clear(&self) -> PipeflowResult<()>;

    /// Get cache statistics
    fn stats(&self) -> PipeflowResult<CacheStats>;
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,
    /// Successful lookups
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            entries: 1,
            hits: 3,
            misses: 1,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
