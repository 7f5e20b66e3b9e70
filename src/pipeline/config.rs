// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline configuration

use serde::{Deserialize, Serialize};

/// Where cached step results live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Never cache
    #[default]
    None,
    /// Every bound function owns its own cache
    PerFunction,
    /// One cache shared by the whole pipeline
    Shared,
}

impl std::fmt::Display for CacheMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::PerFunction => write!(f, "per_function"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// Pipeline construction options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Record wall time for every step invocation
    #[serde(default)]
    pub profile: bool,

    /// Log every step invocation with its arguments at info level
    #[serde(default)]
    pub debug: bool,

    /// Cache mode
    #[serde(default)]
    pub cache: CacheMode,
}

impl PipelineConfig {
    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }
}
