//! Builders for common selector shapes.
//!
//! Every `create_*` method registers its selector under a name. Asking for
//! a name that is already registered returns the existing instance, so one
//! logical view never ends up with two cache pools.
//!
//! Derived shapes degrade instead of failing:
//! - filter / map: any item error yields `[]` (fail-closed)
//! - aggregation: an error yields the aggregation of `[]`
//! - sort: any key error or incomparable pair yields the input unsorted

use crate::config::SelectorConfig;
use crate::parametric::ParametricSelector;
use crate::selector::{Dependency, Selector};
use crate::stats::SelectorStats;
use core::cmp::Ordering;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tessera_core::{Error, Result, State, Value, ValuePath};
use tracing::debug;

/// Per-item predicate for filter selectors.
pub type Predicate = dyn Fn(&Value) -> Result<bool> + Send + Sync;

/// Per-item transform for map selectors.
pub type Transform = dyn Fn(&Value) -> Result<Value> + Send + Sync;

/// Whole-sequence reduction for aggregation selectors.
pub type Aggregate = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// How a sorted selector orders items.
#[derive(Clone)]
pub enum SortKey {
    /// Sort by an item field; items without it sort as `0`.
    Field(String),
    /// Sort by a computed key.
    With(Arc<Transform>),
}

impl SortKey {
    /// Sort by a computed key.
    pub fn with<F>(key: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        SortKey::With(Arc::new(key))
    }

    fn extract(&self, item: &Value) -> Result<Value> {
        match self {
            SortKey::Field(field) => Ok(item.get(field).cloned().unwrap_or(Value::from(0))),
            SortKey::With(key) => key(item),
        }
    }

    fn label(&self) -> &str {
        match self {
            SortKey::Field(field) => field,
            SortKey::With(_) => "fn",
        }
    }
}

impl From<&str> for SortKey {
    fn from(field: &str) -> Self {
        SortKey::Field(field.to_string())
    }
}

#[derive(Clone)]
enum Registered {
    Plain(Selector),
    Parametric(ParametricSelector),
}

impl Registered {
    fn as_dyn(&self) -> Dependency {
        match self {
            Registered::Plain(s) => s.shared(),
            Registered::Parametric(s) => s.shared(),
        }
    }
}

/// Creates and de-duplicates selectors.
pub struct SelectorFactory {
    config: SelectorConfig,
    registry: Mutex<HashMap<String, Registered>>,
    next_anonymous: AtomicU64,
}

impl Default for SelectorFactory {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

impl SelectorFactory {
    /// Creates a factory whose selectors use `config`.
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(HashMap::new()),
            next_anonymous: AtomicU64::new(1),
        }
    }

    /// Config applied to created selectors.
    pub fn config(&self) -> SelectorConfig {
        self.config
    }

    /// Selector that reads a dot-separated path, falling back to `default`
    /// when a segment is missing or an intermediate value is null.
    ///
    /// Unnamed path selectors are registered as `path:<path>`.
    pub fn create_path_selector(
        &self,
        path: &str,
        default: Value,
        name: Option<&str>,
    ) -> Result<Selector> {
        let name = name.map_or_else(|| format!("path:{path}"), str::to_string);
        let parsed = ValuePath::parse(path)?;
        self.plain(name, move |state: &State, _: &[Value]| {
            Ok(state.resolve(&parsed).cloned().unwrap_or_else(|| default.clone()))
        })
    }

    /// Selector keeping the items of `base` for which `predicate` holds.
    pub fn create_filter_selector<F>(
        &self,
        base: Dependency,
        predicate: F,
        name: Option<&str>,
    ) -> Result<Selector>
    where
        F: Fn(&Value) -> Result<bool> + Send + Sync + 'static,
    {
        let name = self.resolve_name(name, "filter", base.name());
        self.plain(name.clone(), move |state: &State, args: &[Value]| {
            let source = base.select(state, args)?;
            Ok(Value::Array(filter_items(&name, &source, &predicate)))
        })
    }

    /// Selector applying `transform` to every item of `base`.
    pub fn create_map_selector<F>(
        &self,
        base: Dependency,
        transform: F,
        name: Option<&str>,
    ) -> Result<Selector>
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        let name = self.resolve_name(name, "map", base.name());
        self.plain(name.clone(), move |state: &State, args: &[Value]| {
            let source = base.select(state, args)?;
            let Some(items) = source.as_array() else {
                return Ok(Value::Array(Vec::new()));
            };
            match items.iter().map(|item| transform(item)).collect::<Result<Vec<_>>>() {
                Ok(mapped) => Ok(Value::Array(mapped)),
                Err(err) => {
                    debug!(selector = %name, error = %err, "map failed, returning empty");
                    Ok(Value::Array(Vec::new()))
                }
            }
        })
    }

    /// Selector reducing the items of `base` with `aggregate`.
    ///
    /// If the aggregation fails it is retried on `[]`; if that fails too
    /// the error propagates.
    pub fn create_aggregation_selector<F>(
        &self,
        base: Dependency,
        aggregate: F,
        name: Option<&str>,
    ) -> Result<Selector>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let name = self.resolve_name(name, "aggregate", base.name());
        self.plain(name.clone(), move |state: &State, args: &[Value]| {
            let source = base.select(state, args)?;
            let items = source.as_array().map(Vec::as_slice).unwrap_or(&[]);
            aggregate(items).or_else(|err| {
                debug!(selector = %name, error = %err, "aggregation failed, using empty input");
                aggregate(&[])
            })
        })
    }

    /// Parametric selector filtering the items of `base` by exact-match
    /// constraints supplied at call time as object arguments:
    ///
    /// ```rust
    /// # use tessera_core::{State, Value};
    /// # use tessera_selector::{Select, SelectorFactory};
    /// let factory = SelectorFactory::default();
    /// let elements = factory.create_path_selector("elements", Value::array::<Value, _>([]), None).unwrap();
    /// let by = factory.create_parametric_filter_selector(elements.shared(), Some("elements_by")).unwrap();
    ///
    /// let state = State::from_iter([("elements", Value::array([
    ///     Value::object([("type", "text"), ("page", "1")]),
    ///     Value::object([("type", "image"), ("page", "1")]),
    /// ]))]);
    /// let texts = by.select(&state, &[Value::object([("type", "text")])]).unwrap();
    /// assert_eq!(texts.as_array().map(Vec::len), Some(1));
    /// ```
    pub fn create_parametric_filter_selector(
        &self,
        base: Dependency,
        name: Option<&str>,
    ) -> Result<ParametricSelector> {
        let name = self.resolve_name(name, "parametric_filter", base.name());
        let mut registry = self.registry.lock();
        if let Some(existing) = registry.get(&name) {
            return match existing {
                Registered::Parametric(s) => Ok(s.clone()),
                Registered::Plain(_) => Err(Error::type_mismatch("parametric selector", "selector")),
            };
        }
        let selector =
            ParametricSelector::with_config(name.clone(), self.config, move |state: &State, args: &[Value]| {
                let constraints = merge_constraints(args)?;
                let source = base.select(state, &[])?;
                let Some(items) = source.as_array() else {
                    return Ok(Value::Array(Vec::new()));
                };
                let matched = items
                    .iter()
                    .filter(|item| constraints.iter().all(|(k, v)| item.get(k) == Some(v)))
                    .cloned()
                    .collect();
                Ok(Value::Array(matched))
            });
        registry.insert(name, Registered::Parametric(selector.clone()));
        Ok(selector)
    }

    /// Selector sorting the items of `base` by `sort_key`.
    ///
    /// The sort is stable in both directions.
    pub fn create_sorted_selector(
        &self,
        base: Dependency,
        sort_key: SortKey,
        reverse: bool,
        name: Option<&str>,
    ) -> Result<Selector> {
        let kind = format!("sorted[{}{}]", sort_key.label(), if reverse { ",desc" } else { "" });
        let name = self.resolve_name(name, &kind, base.name());
        self.plain(name.clone(), move |state: &State, args: &[Value]| {
            let source = base.select(state, args)?;
            Ok(sort_items(&name, &source, &sort_key, reverse))
        })
    }

    /// Selector combining the results of `dependencies`.
    pub fn create_computed_selector<F>(
        &self,
        dependencies: Vec<Dependency>,
        combine: F,
        name: Option<&str>,
    ) -> Result<Selector>
    where
        F: Fn(&[Arc<Value>], &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let upstream = dependencies
            .iter()
            .map(|d| d.name().to_string())
            .collect::<Vec<_>>()
            .join(",");
        let name = self.resolve_name(name, "computed", &upstream);
        let mut registry = self.registry.lock();
        if let Some(existing) = registry.get(&name) {
            return expect_plain(existing);
        }
        let selector = Selector::combine(name.clone(), self.config, dependencies, combine);
        registry.insert(name, Registered::Plain(selector.clone()));
        Ok(selector)
    }

    /// Looks up a registered selector by name.
    pub fn get(&self, name: &str) -> Option<Dependency> {
        self.registry.lock().get(name).map(Registered::as_dyn)
    }

    /// Names of every registered selector, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered selectors.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns true if no selector is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// Invalidates every registered selector.
    pub fn invalidate_all(&self, path: Option<&str>) {
        for selector in self.registry.lock().values() {
            selector.as_dyn().invalidate(path);
        }
    }

    /// Stats of every registered selector, sorted by name.
    pub fn all_stats(&self) -> Vec<SelectorStats> {
        let mut stats: Vec<SelectorStats> = self
            .registry
            .lock()
            .values()
            .map(|s| s.as_dyn().stats())
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Forgets every registered selector. Existing handles keep working.
    pub fn clear(&self) {
        self.registry.lock().clear();
    }

    fn resolve_name(&self, name: Option<&str>, kind: &str, upstream: &str) -> String {
        match name {
            Some(name) => name.to_string(),
            None => {
                let n = self.next_anonymous.fetch_add(1, AtomicOrdering::Relaxed);
                format!("{kind}:{upstream}#{n}")
            }
        }
    }

    /// Returns the selector registered under `name`, or registers `compute`
    /// under it.
    fn plain<F>(&self, name: String, compute: F) -> Result<Selector>
    where
        F: Fn(&State, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        if let Some(existing) = registry.get(&name) {
            return expect_plain(existing);
        }
        let selector = Selector::with_config(name.clone(), self.config, compute);
        registry.insert(name, Registered::Plain(selector.clone()));
        Ok(selector)
    }
}

fn expect_plain(existing: &Registered) -> Result<Selector> {
    match existing {
        Registered::Plain(s) => Ok(s.clone()),
        Registered::Parametric(_) => Err(Error::type_mismatch("selector", "parametric selector")),
    }
}

fn filter_items(name: &str, source: &Value, predicate: &Predicate) -> Vec<Value> {
    let Some(items) = source.as_array() else {
        return Vec::new();
    };
    let mut kept = Vec::new();
    for item in items {
        match predicate(item) {
            Ok(true) => kept.push(item.clone()),
            Ok(false) => {}
            Err(err) => {
                debug!(selector = %name, error = %err, "filter failed, returning empty");
                return Vec::new();
            }
        }
    }
    kept
}

fn sort_items(name: &str, source: &Value, sort_key: &SortKey, reverse: bool) -> Value {
    let Some(items) = source.as_array() else {
        return source.clone();
    };
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        match sort_key.extract(item) {
            Ok(key) => keyed.push((key, item)),
            Err(err) => {
                debug!(selector = %name, error = %err, "sort key failed, returning input order");
                return source.clone();
            }
        }
    }

    let mut incomparable = false;
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = if reverse { b.partial_cmp(a) } else { a.partial_cmp(b) };
        ordering.unwrap_or_else(|| {
            incomparable = true;
            Ordering::Equal
        })
    });
    if incomparable {
        debug!(selector = %name, "incomparable sort keys, returning input order");
        return source.clone();
    }
    Value::Array(keyed.into_iter().map(|(_, item)| item.clone()).collect())
}

fn merge_constraints(args: &[Value]) -> Result<Vec<(String, Value)>> {
    let mut constraints = Vec::new();
    for arg in args {
        let obj = arg
            .as_object()
            .ok_or_else(|| Error::type_mismatch("object", arg.type_name()))?;
        for (key, value) in obj.iter() {
            constraints.retain(|(k, _): &(String, Value)| k != key);
            constraints.push((key.to_string(), value.clone()));
        }
    }
    Ok(constraints)
}
