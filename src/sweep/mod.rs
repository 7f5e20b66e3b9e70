// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Parameter sweeps
//!
//! A sweep is an ordered list of dimensions over named value sequences. The
//! points of a sweep are the Cartesian product of its dimensions; names
//! zipped into one dimension advance together.

pub mod planner;

pub use planner::{
    count_sweep, precalculate, precalculation_order, set_cache_for_sweep, KeyCount,
    PrecalculationReport, StepCounts, SweepCounts, DEFAULT_MIN_EXECUTIONS,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Add;
use std::path::Path;
use std::sync::Arc;

use crate::cache::canonical_json;
use crate::errors::{PipeflowError, PipeflowResult};
use crate::{Kwargs, Value};

/// Computes a derived value from a sweep point
pub type Deriver = Arc<dyn Fn(&Kwargs) -> Value + Send + Sync>;

/// Returns `true` for sweep points to drop
pub type Exclude = Arc<dyn Fn(&Kwargs) -> bool + Send + Sync>;

/// One axis of a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    /// A single name
    Single(String),
    /// Names that advance together
    Zipped(Vec<String>),
}

impl Dimension {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Zipped(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for Dimension {
    fn from(name: &str) -> Self {
        Self::Single(name.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for Dimension {
    fn from(names: [&str; N]) -> Self {
        let mut names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        match names.len() {
            1 => Self::Single(names.remove(0)),
            _ => Self::Zipped(names),
        }
    }
}

/// Anything that yields sweep points
pub trait Combinations {
    /// Iterate over the points, in order
    fn combinations(&self) -> Box<dyn Iterator<Item = Kwargs> + '_>;

    /// Number of points
    fn count_points(&self) -> usize {
        self.combinations().count()
    }
}

impl Combinations for [Kwargs] {
    fn combinations(&self) -> Box<dyn Iterator<Item = Kwargs> + '_> {
        Box::new(self.iter().cloned())
    }

    fn count_points(&self) -> usize {
        self.len()
    }
}

impl Combinations for Vec<Kwargs> {
    fn combinations(&self) -> Box<dyn Iterator<Item = Kwargs> + '_> {
        Box::new(self.iter().cloned())
    }

    fn count_points(&self) -> usize {
        self.len()
    }
}

/// A declarative parameter sweep
#[derive(Clone, Default)]
pub struct Sweep {
    items: IndexMap<String, Vec<Value>>,
    dims: Option<Vec<Dimension>>,
    exclude: Option<Exclude>,
    constants: Kwargs,
    derivers: IndexMap<String, Deriver>,
}

impl Sweep {
    /// Cartesian product over every item
    pub fn new(items: IndexMap<String, Vec<Value>>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Restrict and group the product into explicit dimensions
    pub fn with_dims<D>(mut self, dims: impl IntoIterator<Item = D>) -> PipeflowResult<Self>
    where
        D: Into<Dimension>,
    {
        let dims: Vec<Dimension> = dims.into_iter().map(Into::into).collect();
        self.validate_dims(&dims)?;
        self.dims = Some(dims);
        Ok(self)
    }

    /// Drop points for which `exclude` returns `true`
    pub fn with_exclude<F>(mut self, exclude: F) -> Self
    where
        F: Fn(&Kwargs) -> bool + Send + Sync + 'static,
    {
        self.exclude = Some(Arc::new(exclude));
        self
    }

    /// Add constant values to every point; swept values take precedence
    pub fn with_constants(mut self, constants: Kwargs) -> Self {
        self.constants.extend(constants);
        self
    }

    /// Add a derived value, overwriting any swept value of the same name
    pub fn with_deriver<F>(mut self, name: impl Into<String>, deriver: F) -> Self
    where
        F: Fn(&Kwargs) -> Value + Send + Sync + 'static,
    {
        self.derivers.insert(name.into(), Arc::new(deriver));
        self
    }

    fn validate_dims(&self, dims: &[Dimension]) -> PipeflowResult<()> {
        let mut seen = HashSet::new();

        for dim in dims {
            let names = dim.names();
            if names.is_empty() {
                return Err(PipeflowError::InvalidSweep {
                    reason: "empty dimension".into(),
                });
            }

            let mut length = None;
            for name in &names {
                let values = self.items.get(*name).ok_or_else(|| PipeflowError::InvalidSweep {
                    reason: format!("dimension '{}' has no values", name),
                })?;
                if !seen.insert(*name) {
                    return Err(PipeflowError::InvalidSweep {
                        reason: format!("'{}' appears in more than one dimension", name),
                    });
                }
                match length {
                    None => length = Some(values.len()),
                    Some(len) if len != values.len() => {
                        return Err(PipeflowError::InvalidSweep {
                            reason: format!(
                                "zipped names {} have different lengths",
                                names.join(", ")
                            ),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }

    /// Swept values by name
    pub fn items(&self) -> &IndexMap<String, Vec<Value>> {
        &self.items
    }

    /// Explicit dimensions, if any
    pub fn dims(&self) -> Option<&[Dimension]> {
        self.dims.as_deref()
    }

    pub fn constants(&self) -> &Kwargs {
        &self.constants
    }

    /// Resolved axes: explicit dimensions or one axis per item
    fn axes(&self) -> Vec<Vec<String>> {
        match &self.dims {
            Some(dims) => dims
                .iter()
                .map(|d| d.names().into_iter().map(String::from).collect())
                .collect(),
            None => self.items.keys().map(|k| vec![k.clone()]).collect(),
        }
    }

    /// Lazy iterator over the points; restartable by calling again
    pub fn iter(&self) -> SweepIter<'_> {
        let axes = self.axes();
        let lengths: Vec<usize> = axes
            .iter()
            .map(|names| names.first().and_then(|n| self.items.get(n)).map_or(0, Vec::len))
            .collect();
        let exhausted = lengths.iter().any(|&len| len == 0);

        SweepIter {
            sweep: self,
            counters: vec![0; axes.len()],
            axes,
            lengths,
            exhausted,
        }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        if self.exclude.is_some() {
            return self.iter().count();
        }
        self.axes()
            .iter()
            .map(|names| names.first().and_then(|n| self.items.get(n)).map_or(0, Vec::len))
            .product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th point
    pub fn get(&self, index: usize) -> Option<Kwargs> {
        self.iter().nth(index)
    }

    /// Materialize every point
    pub fn list(&self) -> Vec<Kwargs> {
        self.iter().collect()
    }

    /// A sweep over a subset of names, without duplicate points
    ///
    /// With derivers present the distinct projected points are materialized
    /// and zipped into a single dimension.
    pub fn filtered(&self, keys: &[&str]) -> PipeflowResult<Sweep> {
        if !self.derivers.is_empty() {
            let mut seen = HashSet::new();
            let mut items: IndexMap<String, Vec<Value>> =
                keys.iter().map(|k| (k.to_string(), Vec::new())).collect();

            for point in self.iter() {
                let projected: Vec<Value> = keys
                    .iter()
                    .map(|k| {
                        point.get(*k).cloned().ok_or_else(|| PipeflowError::InvalidSweep {
                            reason: format!("sweep point has no value for '{}'", k),
                        })
                    })
                    .collect::<PipeflowResult<_>>()?;
                if seen.insert(canonical_json(&Value::Array(projected.clone()))) {
                    for (key, value) in keys.iter().zip(projected) {
                        if let Some(values) = items.get_mut(*key) {
                            values.push(value);
                        }
                    }
                }
            }

            return Sweep::new(items).with_dims([Dimension::Zipped(
                keys.iter().map(|k| k.to_string()).collect(),
            )]);
        }

        let dims: Vec<Dimension> = match &self.dims {
            None => self
                .items
                .keys()
                .filter(|k| keys.contains(&k.as_str()))
                .map(|k| Dimension::Single(k.clone()))
                .collect(),
            Some(dims) => dims
                .iter()
                .filter_map(|dim| {
                    let names: Vec<String> = dim
                        .names()
                        .into_iter()
                        .filter(|n| keys.contains(n))
                        .map(String::from)
                        .collect();
                    match names.len() {
                        0 => None,
                        1 => names.into_iter().next().map(Dimension::Single),
                        _ => Some(Dimension::Zipped(names)),
                    }
                })
                .collect(),
        };

        Ok(Sweep {
            items: self.items.clone(),
            dims: Some(dims),
            exclude: self.exclude.clone(),
            constants: self.constants.clone(),
            derivers: IndexMap::new(),
        })
    }

    /// Cartesian product of this sweep with others
    pub fn product(&self, others: &[Sweep]) -> PipeflowResult<Sweep> {
        let mut result = self.clone();
        let explicit = self.dims.is_some() || others.iter().any(|o| o.dims.is_some());
        let mut dims: Vec<Dimension> = if explicit { self.explicit_dims() } else { Vec::new() };

        for other in others {
            for (name, values) in &other.items {
                if result.items.contains_key(name) {
                    return Err(PipeflowError::InvalidSweep {
                        reason: format!("'{}' is swept by both sweeps", name),
                    });
                }
                result.items.insert(name.clone(), values.clone());
            }
            for (name, value) in &other.constants {
                if result.constants.contains_key(name) {
                    return Err(PipeflowError::InvalidSweep {
                        reason: format!("constant '{}' is set by both sweeps", name),
                    });
                }
                result.constants.insert(name.clone(), value.clone());
            }
            for (name, deriver) in &other.derivers {
                result.derivers.insert(name.clone(), Arc::clone(deriver));
            }
            result.exclude = match (result.exclude.take(), other.exclude.clone()) {
                (Some(a), Some(b)) => {
                    let either: Exclude = Arc::new(move |point: &Kwargs| a(point) || b(point));
                    Some(either)
                }
                (a, b) => a.or(b),
            };
            if explicit {
                dims.extend(other.explicit_dims());
            }
        }

        result.dims = explicit.then_some(dims);
        Ok(result)
    }

    fn explicit_dims(&self) -> Vec<Dimension> {
        match &self.dims {
            Some(dims) => dims.clone(),
            None => self.items.keys().map(|k| Dimension::Single(k.clone())).collect(),
        }
    }

    /// Load a sweep from a YAML or JSON file
    pub fn from_file(path: &Path) -> PipeflowResult<Self> {
        SweepDefinition::from_file(path)?.into_sweep()
    }

    /// Parse a sweep from YAML (JSON is valid YAML)
    pub fn from_yaml(yaml: &str) -> PipeflowResult<Self> {
        let definition: SweepDefinition = serde_yaml::from_str(yaml)?;
        definition.into_sweep()
    }
}

impl Combinations for Sweep {
    fn combinations(&self) -> Box<dyn Iterator<Item = Kwargs> + '_> {
        Box::new(self.iter())
    }

    fn count_points(&self) -> usize {
        self.len()
    }
}

impl<'a> IntoIterator for &'a Sweep {
    type Item = Kwargs;
    type IntoIter = SweepIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Add for Sweep {
    type Output = MultiSweep;

    fn add(self, other: Sweep) -> MultiSweep {
        MultiSweep::new(vec![self, other])
    }
}

impl fmt::Debug for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sweep")
            .field("items", &self.items)
            .field("dims", &self.dims)
            .field("constants", &self.constants)
            .field("derivers", &self.derivers.keys().collect::<Vec<_>>())
            .field("exclude", &self.exclude.is_some())
            .finish()
    }
}

/// Iterator over the points of a [`Sweep`]
pub struct SweepIter<'a> {
    sweep: &'a Sweep,
    axes: Vec<Vec<String>>,
    lengths: Vec<usize>,
    counters: Vec<usize>,
    exhausted: bool,
}

impl SweepIter<'_> {
    /// Odometer step; the last axis moves fastest
    fn advance(&mut self) {
        for axis in (0..self.counters.len()).rev() {
            self.counters[axis] += 1;
            if self.counters[axis] < self.lengths[axis] {
                return;
            }
            self.counters[axis] = 0;
        }
        self.exhausted = true;
    }

    fn current(&self) -> Kwargs {
        let mut point = Kwargs::new();
        for (names, &i) in self.axes.iter().zip(&self.counters) {
            for name in names {
                if let Some(value) = self.sweep.items.get(name).and_then(|v| v.get(i)) {
                    point.insert(name.clone(), value.clone());
                }
            }
        }
        for (name, value) in &self.sweep.constants {
            point.entry(name.clone()).or_insert_with(|| value.clone());
        }
        for (name, deriver) in &self.sweep.derivers {
            let value = deriver(&point);
            point.insert(name.clone(), value);
        }
        point
    }
}

impl Iterator for SweepIter<'_> {
    type Item = Kwargs;

    fn next(&mut self) -> Option<Kwargs> {
        loop {
            if self.exhausted {
                return None;
            }
            let point = self.current();
            self.advance();

            match &self.sweep.exclude {
                Some(exclude) if exclude(&point) => continue,
                _ => return Some(point),
            }
        }
    }
}

/// Concatenation of several sweeps
#[derive(Debug, Clone, Default)]
pub struct MultiSweep {
    sweeps: Vec<Sweep>,
}

impl MultiSweep {
    pub fn new(sweeps: Vec<Sweep>) -> Self {
        Self { sweeps }
    }

    pub fn sweeps(&self) -> &[Sweep] {
        &self.sweeps
    }

    /// Append a sweep
    pub fn push(&mut self, sweep: Sweep) {
        self.sweeps.push(sweep);
    }

    pub fn iter(&self) -> impl Iterator<Item = Kwargs> + '_ {
        self.sweeps.iter().flat_map(Sweep::iter)
    }

    pub fn len(&self) -> usize {
        self.sweeps.iter().map(Sweep::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<Kwargs> {
        self.iter().collect()
    }

    /// Filter every member sweep
    pub fn filtered(&self, keys: &[&str]) -> PipeflowResult<MultiSweep> {
        Ok(Self {
            sweeps: self
                .sweeps
                .iter()
                .map(|s| s.filtered(keys))
                .collect::<PipeflowResult<_>>()?,
        })
    }
}

impl Add<Sweep> for MultiSweep {
    type Output = MultiSweep;

    fn add(mut self, other: Sweep) -> MultiSweep {
        self.push(other);
        self
    }
}

impl Add for MultiSweep {
    type Output = MultiSweep;

    fn add(mut self, other: MultiSweep) -> MultiSweep {
        self.sweeps.extend(other.sweeps);
        self
    }
}

impl Combinations for MultiSweep {
    fn combinations(&self) -> Box<dyn Iterator<Item = Kwargs> + '_> {
        Box::new(self.iter())
    }

    fn count_points(&self) -> usize {
        self.len()
    }
}

/// Serialized form of a sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepDefinition {
    /// Values by name
    pub items: IndexMap<String, Vec<Value>>,

    /// Explicit dimensions; a list entry is a name or a list of zipped names
    #[serde(default)]
    pub dims: Option<Vec<Dimension>>,

    /// Values added to every point
    #[serde(default)]
    pub constants: Kwargs,
}

impl SweepDefinition {
    /// Load from a `.yaml`, `.yml` or `.json` file
    pub fn from_file(path: &Path) -> PipeflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipeflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Ok(serde_yaml::from_str(&content)?),
        }
    }

    pub fn into_sweep(self) -> PipeflowResult<Sweep> {
        let sweep = Sweep::new(self.items).with_constants(self.constants);
        match self.dims {
            Some(dims) => sweep.with_dims(dims),
            None => Ok(sweep),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(pairs: &[(&str, &[i64])]) -> IndexMap<String, Vec<Value>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| json!(v)).collect()))
            .collect()
    }

    fn point(pairs: &[(&str, i64)]) -> Kwargs {
        pairs.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()
    }

    #[test]
    fn test_cartesian_product() {
        let sweep = Sweep::new(items(&[("a", &[1, 2]), ("b", &[3, 4]), ("c", &[5, 6])]));
        let points = sweep.list();

        assert_eq!(sweep.len(), 8);
        assert_eq!(points.len(), 8);
        assert_eq!(points[0], point(&[("a", 1), ("b", 3), ("c", 5)]));
        assert_eq!(points[1], point(&[("a", 1), ("b", 3), ("c", 6)]));
        assert_eq!(points[7], point(&[("a", 2), ("b", 4), ("c", 6)]));
    }

    #[test]
    fn test_zipped_dims() {
        let sweep = Sweep::new(items(&[("a", &[1, 2]), ("b", &[3, 4]), ("c", &[5, 6])]))
            .with_dims([Dimension::from(["a", "b"]), Dimension::from("c")])
            .unwrap();

        assert_eq!(sweep.len(), 4);
        assert_eq!(
            sweep.list(),
            vec![
                point(&[("a", 1), ("b", 3), ("c", 5)]),
                point(&[("a", 1), ("b", 3), ("c", 6)]),
                point(&[("a", 2), ("b", 4), ("c", 5)]),
                point(&[("a", 2), ("b", 4), ("c", 6)]),
            ]
        );
    }

    #[test]
    fn test_zipped_lengths_must_match() {
        let result = Sweep::new(items(&[("a", &[1, 2]), ("b", &[3])])).with_dims([["a", "b"]]);
        assert!(matches!(result, Err(PipeflowError::InvalidSweep { .. })));
    }

    #[test]
    fn test_unknown_dimension() {
        let result = Sweep::new(items(&[("a", &[1])])).with_dims(["z"]);
        assert!(matches!(result, Err(PipeflowError::InvalidSweep { .. })));
    }

    #[test]
    fn test_restartable_and_get() {
        let sweep = Sweep::new(items(&[("a", &[1, 2, 3])]));
        assert_eq!(sweep.iter().count(), 3);
        assert_eq!(sweep.iter().count(), 3);
        assert_eq!(sweep.get(1), Some(point(&[("a", 2)])));
        assert_eq!(sweep.get(3), None);
    }

    #[test]
    fn test_empty_values() {
        let sweep = Sweep::new(items(&[("a", &[1, 2]), ("b", &[])]));
        assert!(sweep.is_empty());
        assert_eq!(sweep.iter().next(), None);
    }

    #[test]
    fn test_exclude_constants_derivers() {
        let sweep = Sweep::new(items(&[("a", &[1, 2]), ("b", &[3, 4])]))
            .with_constants(point(&[("k", 7), ("a", 100)]))
            .with_deriver("c", |p| json!(p["a"].as_i64().unwrap_or(0) + p["b"].as_i64().unwrap_or(0)))
            .with_exclude(|p| p["c"] == json!(5));

        let points = sweep.list();
        assert_eq!(sweep.len(), 2);
        assert_eq!(points[0], point(&[("a", 1), ("b", 3), ("k", 7), ("c", 4)]));
        assert!(points.iter().all(|p| p["c"] != json!(5)));
    }

    #[test]
    fn test_filtered_without_derivers() {
        let sweep = Sweep::new(items(&[("a", &[1, 2]), ("b", &[3, 4]), ("c", &[5, 6])]))
            .with_dims([Dimension::from(["a", "b"]), Dimension::from("c")])
            .unwrap();

        let filtered = sweep.filtered(&["a", "c"]).unwrap();
        assert_eq!(filtered.len(), 4);
        assert_eq!(filtered.list()[0], point(&[("a", 1), ("c", 5)]));

        let only_b = sweep.filtered(&["b"]).unwrap();
        assert_eq!(only_b.list(), vec![point(&[("b", 3)]), point(&[("b", 4)])]);
    }

    #[test]
    fn test_filtered_with_derivers_deduplicates() {
        let sweep = Sweep::new(items(&[("a", &[1, 2]), ("b", &[3, 4])]))
            .with_deriver("parity", |p| json!(p["b"].as_i64().unwrap_or(0) % 2));

        let filtered = sweep.filtered(&["a", "parity"]).unwrap();
        assert_eq!(filtered.len(), 4);

        let filtered = sweep.filtered(&["parity"]).unwrap();
        assert_eq!(filtered.list(), vec![point(&[("parity", 1)]), point(&[("parity", 0)])]);
    }

    #[test]
    fn test_product() {
        let left = Sweep::new(items(&[("a", &[1, 2]), ("b", &[3, 4])]))
            .with_dims([["a", "b"]])
            .unwrap();
        let right = Sweep::new(items(&[("c", &[5, 6])]));

        let product = left.product(&[right]).unwrap();
        assert_eq!(product.len(), 4);
        assert_eq!(product.list()[1], point(&[("a", 1), ("b", 3), ("c", 6)]));

        let clash = Sweep::new(items(&[("a", &[9])]));
        assert!(left.product(&[clash]).is_err());
    }

    #[test]
    fn test_multi_sweep() {
        let first = Sweep::new(items(&[("a", &[1, 2])]));
        let second = Sweep::new(items(&[("x", &[5])]));
        let multi = first + second;

        assert_eq!(multi.len(), 3);
        assert_eq!(multi.list()[2], point(&[("x", 5)]));

        let only_a = Sweep::new(items(&[("a", &[1, 2])])) + Sweep::new(items(&[("a", &[3])]));
        let only_a = only_a + Sweep::new(items(&[("a", &[4])]));
        assert_eq!(only_a.filtered(&["a"]).unwrap().len(), 4);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
items:
  x: [1, 2]
  y: [3, 4]
  z: [5]
dims:
  - [x, y]
  - z
constants:
  k: 0
"#;
        let sweep = Sweep::from_yaml(yaml).unwrap();
        assert_eq!(sweep.len(), 2);
        assert_eq!(sweep.list()[1], point(&[("x", 2), ("y", 4), ("z", 5), ("k", 0)]));
    }

    #[test]
    fn test_kwargs_slice_combinations() {
        let points = vec![point(&[("a", 1)]), point(&[("a", 2)])];
        assert_eq!(points.count_points(), 2);
        assert_eq!(points.combinations().count(), 2);
    }
}
