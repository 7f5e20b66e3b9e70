// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Content hashing for cache keys
//!
//! Uses BLAKE3 over serde_json output of normalized values, so equal values
//! hash equally no matter how their object keys were ordered.

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Value;

/// Key of a cached step result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Output label of the step (`c` or `(a, b)`)
    pub output: String,
    /// Hash of the resolved root argument values
    pub digest: String,
}

impl CacheKey {
    /// Build a key from an output label and named root argument values
    pub fn new<'a, I>(output: &str, root_args: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut hasher = ContentHasher::new();
        hasher.update(output.as_bytes());
        for (name, value) in root_args {
            hasher.update_named(name, value);
        }

        Self {
            output: output.to_string(),
            digest: hasher.finalize(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.output, &self.digest[..12.min(self.digest.len())])
    }
}

/// Content hasher for generating cache keys
pub struct ContentHasher {
    hasher: Hasher,
}

impl ContentHasher {
    /// Create a new content hasher
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Hash a named value; names and values are length-prefixed
    pub fn update_named(&mut self, name: &str, value: &Value) {
        let encoded = canonical_json(value);
        self.hasher.update(&(name.len() as u64).to_le_bytes());
        self.hasher.update(name.as_bytes());
        self.hasher.update(&(encoded.len() as u64).to_le_bytes());
        self.hasher.update(encoded.as_bytes());
    }

    /// Hash arbitrary bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finalize and get the hash
    pub fn finalize(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite a value into the form its cache key is derived from
///
/// Object keys are sorted and floats with an integral value become
/// integers, so `1` and `1.0` denote the same argument.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|k| (k.clone(), normalize(&map[k])))
                    .collect(),
            )
        }
        _ => value.clone(),
    }
}

/// Compact JSON of the normalized value
pub fn canonical_json(value: &Value) -> String {
    normalize(value).to_string()
}
