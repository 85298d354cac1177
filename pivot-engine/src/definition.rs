//! FILENAME: pivot-engine/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot table.
//! These structures are designed to be:
//! - Serializable (JSON requests from the rendering layer)
//! - Validated once into engine structures before any record is touched
//! - Immutable snapshots of user intent

use crate::metrics::MetricRegistry;
use rustc_hash::FxHashMap;
use segment_engine::{
    audience_filter, BucketRule, BucketRuleDefinition, DimensionCatalog, Filter, PeriodWindow,
    SegmentError, SegmentResult,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// METRICS
// ============================================================================

/// Built-in metric kinds. Closed set, dispatched by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MetricKind {
    /// Number of records in the group.
    Count,
    /// Sum of the present values of a numeric or boolean field.
    Sum { field: String },
    /// Mean of the present values; null when there are none.
    Mean { field: String },
    /// Number of distinct present values of any field.
    DistinctCount { field: String },
    /// Quotient of two other metrics evaluated on the same group.
    Ratio {
        numerator: String,
        denominator: String,
    },
}

/// A named metric definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: MetricKind,
}

impl MetricDef {
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        MetricDef {
            name: name.into(),
            kind,
        }
    }

    pub fn count(name: impl Into<String>) -> Self {
        MetricDef::new(name, MetricKind::Count)
    }

    pub fn sum(name: impl Into<String>, field: impl Into<String>) -> Self {
        MetricDef::new(name, MetricKind::Sum { field: field.into() })
    }

    pub fn mean(name: impl Into<String>, field: impl Into<String>) -> Self {
        MetricDef::new(name, MetricKind::Mean { field: field.into() })
    }

    pub fn distinct_count(name: impl Into<String>, field: impl Into<String>) -> Self {
        MetricDef::new(name, MetricKind::DistinctCount { field: field.into() })
    }

    pub fn ratio(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        MetricDef::new(
            name,
            MetricKind::Ratio {
                numerator: numerator.into(),
                denominator: denominator.into(),
            },
        )
    }

    /// Names of the metrics this one is computed from.
    pub fn dependencies(&self) -> Vec<&str> {
        match &self.kind {
            MetricKind::Ratio {
                numerator,
                denominator,
            } => vec![numerator.as_str(), denominator.as_str()],
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// PIVOT SPEC
// ============================================================================

/// What to group by and what to compute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotSpec {
    /// Dimensions on the row axis, outer to inner.
    #[serde(default)]
    pub row_dimensions: Vec<String>,

    /// Dimensions on the column axis, outer to inner.
    #[serde(default)]
    pub column_dimensions: Vec<String>,

    /// Registered metric names, in output order.
    pub metrics: Vec<String>,

    /// Emit every combination of axis labels, including empty groups.
    #[serde(default)]
    pub show_empty: bool,
}

impl PivotSpec {
    pub fn new<R, C>(rows: R, columns: C) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        PivotSpec {
            row_dimensions: rows.into_iter().map(Into::into).collect(),
            column_dimensions: columns.into_iter().map(Into::into).collect(),
            metrics: Vec::new(),
            show_empty: false,
        }
    }

    pub fn metric(mut self, name: impl Into<String>) -> Self {
        self.metrics.push(name.into());
        self
    }

    pub fn show_empty(mut self, show_empty: bool) -> Self {
        self.show_empty = show_empty;
        self
    }
}

/// How to display one metric of a computed pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShowValuesAs {
    #[default]
    Values,
    PercentOfRowTotal,
    PercentOfColumnTotal,
    PercentOfGrandTotal,
}

// ============================================================================
// PIVOT CONTEXT
// ============================================================================

/// Validated engine inputs besides the spec: bucket rules by dimension, the
/// row filter and the metric registry.
#[derive(Debug, Clone, Default)]
pub struct PivotContext {
    rules: FxHashMap<String, BucketRule>,
    pub filter: Filter,
    pub metrics: MetricRegistry,
}

impl PivotContext {
    pub fn new(metrics: MetricRegistry) -> Self {
        PivotContext {
            rules: FxHashMap::default(),
            filter: Filter::all(),
            metrics,
        }
    }

    /// Adds a bucket rule. One rule per dimension.
    pub fn with_rule(mut self, rule: BucketRule) -> SegmentResult<Self> {
        self.add_rule(rule)?;
        Ok(self)
    }

    pub fn add_rule(&mut self, rule: BucketRule) -> SegmentResult<()> {
        let dimension = rule.dimension().to_string();
        if self.rules.contains_key(&dimension) {
            return Err(SegmentError::config_for(
                &dimension,
                format!("Dimension '{}' already has a bucket rule", dimension),
            ));
        }
        self.rules.insert(dimension, rule);
        Ok(())
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn rule(&self, dimension: &str) -> Option<&BucketRule> {
        self.rules.get(dimension)
    }

    pub fn rules(&self) -> impl Iterator<Item = &BucketRule> {
        self.rules.values()
    }
}

// ============================================================================
// REQUEST DEFINITION
// ============================================================================

/// A complete pivot request as submitted in JSON by the rendering layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotRequestDefinition {
    #[serde(default)]
    pub bucket_rules: Vec<BucketRuleDefinition>,

    /// Filter text; empty matches all records.
    #[serde(default)]
    pub filter: String,

    /// Named audience, combined with `filter` by AND.
    #[serde(default)]
    pub audience: Option<String>,

    /// Extra metrics registered for this request only.
    #[serde(default)]
    pub metrics: Vec<MetricDef>,

    /// Trailing date window, combined with the filter by AND.
    #[serde(default)]
    pub period: Option<PeriodWindow>,

    pub spec: PivotSpec,
}

impl PivotRequestDefinition {
    pub fn from_json(json: &str) -> SegmentResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SegmentError::config(format!("Invalid pivot request: {}", e)))
    }

    /// Validates every part of the request against the catalog and builds
    /// the engine context. `registry` is extended, not modified.
    pub fn validate(
        &self,
        catalog: &DimensionCatalog,
        registry: &MetricRegistry,
    ) -> SegmentResult<(PivotContext, PivotSpec)> {
        let mut metrics = registry.clone();
        for def in &self.metrics {
            metrics.register(def.clone())?;
        }

        let mut context = PivotContext::new(metrics);
        for def in &self.bucket_rules {
            context.add_rule(def.validate(catalog)?)?;
        }

        let mut filter = Filter::parse(&self.filter, catalog)?;
        if let Some(name) = &self.audience {
            filter = audience_filter(name, catalog)?.and(filter);
        }
        if let Some(window) = &self.period {
            filter = filter.and(window.to_filter(catalog)?);
        }
        context.filter = filter;

        crate::engine::validate_spec(catalog, &context, &self.spec)?;
        Ok((context, self.spec.clone()))
    }
}
