//! FILENAME: pivot-engine/src/metrics.rs
//! Metric Registry - named metric definitions and their evaluation.
//!
//! Requested metrics are resolved into a `MetricPlan`: a topologically
//! ordered list of steps where ratio steps refer to earlier steps. The plan
//! checks every source field against the catalog up front, so accumulating
//! and finishing a group never fails.
//!
//! Empty groups: count 0, sum 0, distinct count 0, mean null; a ratio is
//! null whenever its numerator is null or its denominator is null or zero.

use crate::definition::{MetricDef, MetricKind};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use segment_engine::{DimensionCatalog, DimensionType, SegmentError, SegmentResult, Value, ValueKey};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Name of the count metric every registry starts with.
pub const COUNT_METRIC: &str = "count";

/// Metric values of one group, aligned with the requested metric names.
pub type MetricValues = SmallVec<[Option<f64>; 4]>;

// ============================================================================
// REGISTRY
// ============================================================================

/// Named metric definitions, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MetricDef>", into = "Vec<MetricDef>")]
pub struct MetricRegistry {
    defs: Vec<MetricDef>,
    index: FxHashMap<String, usize>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        MetricRegistry::new()
    }
}

impl MetricRegistry {
    /// A registry holding only `count`.
    pub fn new() -> Self {
        let mut registry = MetricRegistry {
            defs: Vec::new(),
            index: FxHashMap::default(),
        };
        registry.insert(MetricDef::count(COUNT_METRIC));
        registry
    }

    /// The analytics metric set: Count, Total Revenue, Avg LTV,
    /// Retention Rate, Total Orders and Avg AOV.
    pub fn standard() -> Self {
        let mut registry = MetricRegistry::new();
        for def in [
            MetricDef::count("Count"),
            MetricDef::sum("Total Revenue", "total_revenue"),
            MetricDef::mean("Avg LTV", "ltv"),
            MetricDef::mean("Retention Rate", "is_retained"),
            MetricDef::sum("Total Orders", "total_orders"),
            MetricDef::ratio("Avg AOV", "Total Revenue", "Total Orders"),
        ] {
            registry.insert(def);
        }
        registry
    }

    fn insert(&mut self, def: MetricDef) {
        self.index.insert(def.name.clone(), self.defs.len());
        self.defs.push(def);
    }

    /// Registers a metric. Dependencies are resolved at plan time, so a
    /// ratio may name metrics registered later.
    pub fn register(&mut self, def: MetricDef) -> SegmentResult<()> {
        if def.name.trim().is_empty() {
            return Err(SegmentError::config("Metric name must not be empty"));
        }
        if self.index.contains_key(&def.name) {
            return Err(SegmentError::config(format!(
                "Metric '{}' is already registered",
                def.name
            )));
        }
        debug!(target: "METRIC", "Registered metric '{}'", def.name);
        self.insert(def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MetricDef> {
        self.index.get(name).map(|&i| &self.defs[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Resolves requested metrics into an evaluation plan.
    pub fn plan(&self, metrics: &[String], catalog: &DimensionCatalog) -> SegmentResult<MetricPlan> {
        if metrics.is_empty() {
            return Err(SegmentError::computation("At least one metric is required"));
        }

        let mut resolver = PlanResolver {
            registry: self,
            catalog,
            steps: Vec::new(),
            step_of: FxHashMap::default(),
            path: Vec::new(),
        };
        let outputs = metrics
            .iter()
            .map(|name| resolver.resolve(name))
            .collect::<SegmentResult<SmallVec<[usize; 4]>>>()?;

        debug!(
            target: "METRIC",
            "Planned {} metrics in {} steps",
            metrics.len(),
            resolver.steps.len()
        );
        Ok(MetricPlan {
            names: metrics.to_vec(),
            steps: resolver.steps,
            outputs,
        })
    }

    /// Computes the named metrics over one group of schema-aligned rows.
    pub fn compute<'a>(
        &self,
        rows: impl IntoIterator<Item = &'a [Value]>,
        metrics: &[String],
        catalog: &DimensionCatalog,
    ) -> SegmentResult<Vec<(String, Option<f64>)>> {
        let plan = self.plan(metrics, catalog)?;
        let mut acc = plan.accumulator();
        for row in rows {
            plan.add(&mut acc, row);
        }
        Ok(plan
            .names()
            .iter()
            .cloned()
            .zip(plan.finish(&acc))
            .collect())
    }
}

impl TryFrom<Vec<MetricDef>> for MetricRegistry {
    type Error = SegmentError;

    fn try_from(defs: Vec<MetricDef>) -> SegmentResult<Self> {
        let mut registry = MetricRegistry::new();
        for def in defs {
            if def.name == COUNT_METRIC && def.kind == MetricKind::Count {
                continue;
            }
            registry.register(def)?;
        }
        Ok(registry)
    }
}

impl From<MetricRegistry> for Vec<MetricDef> {
    fn from(registry: MetricRegistry) -> Self {
        registry.defs
    }
}

// ============================================================================
// PLAN
// ============================================================================

/// One evaluation step. Ratio operands index earlier steps.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Count,
    Sum { column: usize },
    Mean { column: usize },
    DistinctCount { column: usize },
    Ratio { numerator: usize, denominator: usize },
}

struct PlanResolver<'a> {
    registry: &'a MetricRegistry,
    catalog: &'a DimensionCatalog,
    steps: Vec<Step>,
    step_of: FxHashMap<String, usize>,
    /// Metrics currently being resolved, outermost first.
    path: Vec<String>,
}

impl PlanResolver<'_> {
    /// Depth-first resolution; dependencies get lower step indices.
    fn resolve(&mut self, name: &str) -> SegmentResult<usize> {
        if let Some(&step) = self.step_of.get(name) {
            return Ok(step);
        }
        if let Some(start) = self.path.iter().position(|n| n == name) {
            let mut cycle: Vec<&str> = self.path[start..].iter().map(String::as_str).collect();
            cycle.push(name);
            return Err(SegmentError::computation(format!(
                "Circular metric dependency: {}",
                cycle.join(" -> ")
            )));
        }

        let registry = self.registry;
        let def = registry.get(name).ok_or_else(|| match self.path.last() {
            Some(parent) => SegmentError::computation(format!(
                "Metric '{}' depends on unregistered metric '{}'",
                parent, name
            )),
            None => SegmentError::computation(format!("Metric '{}' is not registered", name)),
        })?;

        self.path.push(name.to_string());
        let step = match &def.kind {
            MetricKind::Count => Step::Count,
            MetricKind::Sum { field } => Step::Sum {
                column: numeric_column(self.catalog, field)?,
            },
            MetricKind::Mean { field } => Step::Mean {
                column: numeric_column(self.catalog, field)?,
            },
            MetricKind::DistinctCount { field } => Step::DistinctCount {
                column: self.catalog.index_of(field)?,
            },
            MetricKind::Ratio {
                numerator,
                denominator,
            } => Step::Ratio {
                numerator: self.resolve(numerator)?,
                denominator: self.resolve(denominator)?,
            },
        };
        self.path.pop();

        self.steps.push(step);
        let index = self.steps.len() - 1;
        self.step_of.insert(name.to_string(), index);
        Ok(index)
    }

}

/// Column of a field that sums and means can read: numbers, or booleans
/// counted as 1 and 0.
pub(crate) fn numeric_column(catalog: &DimensionCatalog, field: &str) -> SegmentResult<usize> {
    let info = catalog.describe(field)?;
    match info.dimension_type {
        DimensionType::Numeric | DimensionType::Boolean => Ok(info.index),
        other => Err(SegmentError::TypeMismatch {
            dimension: field.to_string(),
            expected: "numeric or boolean".to_string(),
            found: other.name().to_string(),
            position: None,
        }),
    }
}

/// A resolved, validated evaluation plan for a list of metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPlan {
    names: Vec<String>,
    steps: Vec<Step>,
    outputs: SmallVec<[usize; 4]>,
}

/// Exact running sum kept as non-overlapping partials (Shewchuk). The
/// rounded total does not depend on the order values were added in.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ExactSum {
    partials: SmallVec<[f64; 4]>,
    /// Sum of the infinite and NaN inputs.
    special: f64,
}

impl ExactSum {
    pub(crate) fn add(&mut self, value: f64) {
        if !value.is_finite() {
            self.special += value;
            return;
        }
        let mut x = value;
        let mut kept = 0;
        for j in 0..self.partials.len() {
            let mut y = self.partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                self.partials[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        self.partials.truncate(kept);
        self.partials.push(x);
    }

    /// The correctly rounded total.
    pub(crate) fn total(&self) -> f64 {
        if self.special != 0.0 {
            return self.special;
        }
        let mut n = self.partials.len();
        if n == 0 {
            return 0.0;
        }
        n -= 1;
        let mut hi = self.partials[n];
        let mut lo = 0.0;
        while n > 0 {
            let x = hi;
            let y = self.partials[n - 1];
            n -= 1;
            hi = x + y;
            lo = y - (hi - x);
            if lo != 0.0 {
                break;
            }
        }
        // Round half-even across the remaining partials.
        let same_sign = |p: f64| (lo < 0.0 && p < 0.0) || (lo > 0.0 && p > 0.0);
        if n > 0 && same_sign(self.partials[n - 1]) {
            let y = lo * 2.0;
            let x = hi + y;
            if y == x - hi {
                hi = x;
            }
        }
        hi
    }
}

/// Running state of one step.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Empty,
    Numeric { sum: ExactSum, count: u64 },
    Distinct(FxHashSet<ValueKey>),
}

/// Per-group accumulation state for a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAccumulator {
    count: u64,
    slots: SmallVec<[Slot; 4]>,
}

impl GroupAccumulator {
    /// Number of records added.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl MetricPlan {
    /// Requested metric names, in output order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn accumulator(&self) -> GroupAccumulator {
        GroupAccumulator {
            count: 0,
            slots: self
                .steps
                .iter()
                .map(|step| match step {
                    Step::Sum { .. } | Step::Mean { .. } => Slot::Numeric {
                        sum: ExactSum::default(),
                        count: 0,
                    },
                    Step::DistinctCount { .. } => Slot::Distinct(FxHashSet::default()),
                    Step::Count | Step::Ratio { .. } => Slot::Empty,
                })
                .collect(),
        }
    }

    /// Feeds one schema-aligned row into a group. Missing values are skipped.
    pub fn add(&self, acc: &mut GroupAccumulator, row: &[Value]) {
        acc.count += 1;
        for (step, slot) in self.steps.iter().zip(acc.slots.iter_mut()) {
            match (step, slot) {
                (Step::Sum { column } | Step::Mean { column }, Slot::Numeric { sum, count }) => {
                    if let Some(n) = row[*column].as_number() {
                        sum.add(n);
                        *count += 1;
                    }
                }
                (Step::DistinctCount { column }, Slot::Distinct(seen)) => {
                    let value = &row[*column];
                    if !value.is_missing() {
                        seen.insert(value.key());
                    }
                }
                _ => {}
            }
        }
    }

    /// Final metric values of a group, aligned with `names()`.
    pub fn finish(&self, acc: &GroupAccumulator) -> MetricValues {
        let mut values: SmallVec<[Option<f64>; 8]> = SmallVec::with_capacity(self.steps.len());
        for (step, slot) in self.steps.iter().zip(acc.slots.iter()) {
            let value = match (step, slot) {
                (Step::Count, _) => Some(acc.count as f64),
                (Step::Sum { .. }, Slot::Numeric { sum, .. }) => Some(sum.total()),
                (Step::Mean { .. }, Slot::Numeric { sum, count }) => {
                    if *count > 0 {
                        Some(sum.total() / *count as f64)
                    } else {
                        None
                    }
                }
                (Step::DistinctCount { .. }, Slot::Distinct(seen)) => Some(seen.len() as f64),
                (Step::Ratio { numerator, denominator }, _) => {
                    match (values[*numerator], values[*denominator]) {
                        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
                        _ => None,
                    }
                }
                _ => None,
            };
            values.push(value);
        }
        self.outputs.iter().map(|&i| values[i]).collect()
    }
}
