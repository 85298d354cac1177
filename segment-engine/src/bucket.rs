//! FILENAME: segment-engine/src/bucket.rs
//! PURPOSE: Bucket Rule Engine - maps raw dimension values to stable labels.
//! CONTEXT: A bucket rule is a total, exhaustive partition of a dimension's
//! values. Every value maps to exactly one label: a declared bucket, the
//! fallback bucket ("Unspecified" for ranges and dates, "Other" for
//! categorical groups) or "Missing". Rules are validated when built and are
//! immutable afterwards.
//!
//! RULE KINDS:
//! - Numeric ranges: `lower <= value < upper`, first match wins, open ends allowed
//! - Categorical groups: value label -> group label, in declaration order
//! - Date granularity: calendar year, quarter, month or ISO week

use crate::catalog::DimensionCatalog;
use crate::dataset::Dataset;
use crate::error::{SegmentError, SegmentResult};
use crate::value::{format_number, DimensionType, Value, ValueKey};
use chrono::{Datelike, NaiveDate};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

pub use crate::value::MISSING_LABEL;

/// Fallback label for numeric and date values no bucket matches.
pub const UNSPECIFIED_LABEL: &str = "Unspecified";

/// Fallback label for categorical values outside every group.
pub const OTHER_LABEL: &str = "Other";

/// Most bins an equal-width rule may declare, overflow buckets excluded.
pub const MAX_EQUAL_WIDTH_BINS: usize = 10_000;

// ============================================================================
// RULE DEFINITIONS
// ============================================================================

/// A half-open numeric range `[lower, upper)`. `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericRange {
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    pub label: String,
}

impl NumericRange {
    pub fn new(lower: Option<f64>, upper: Option<f64>, label: impl Into<String>) -> Self {
        NumericRange {
            lower,
            upper,
            label: label.into(),
        }
    }

    /// `[lower, upper)`
    pub fn bounded(lower: f64, upper: f64, label: impl Into<String>) -> Self {
        NumericRange::new(Some(lower), Some(upper), label)
    }

    pub fn contains(&self, n: f64) -> bool {
        self.lower.map_or(true, |l| l <= n) && self.upper.map_or(true, |u| n < u)
    }
}

/// A named group of category values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub label: String,
    /// Value labels (as produced by `Value::label`) belonging to this group.
    pub members: Vec<String>,
}

impl CategoryGroup {
    pub fn new<S: Into<String>>(label: impl Into<String>, members: impl IntoIterator<Item = S>) -> Self {
        CategoryGroup {
            label: label.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Calendar truncation levels for date dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateGranularity {
    Year,
    Quarter,
    Month,
    Week,
}

impl DateGranularity {
    /// Label and chronological order key of the period containing `date`.
    pub fn period(&self, date: NaiveDate) -> (String, i64) {
        let year = date.year() as i64;
        match self {
            DateGranularity::Year => (format!("{}", year), year),
            DateGranularity::Quarter => {
                let quarter = date.month0() / 3 + 1;
                (format!("{}-Q{}", year, quarter), year * 4 + quarter as i64)
            }
            DateGranularity::Month => (
                format!("{}-{:02}", year, date.month()),
                year * 12 + date.month0() as i64,
            ),
            DateGranularity::Week => {
                // ISO 8601: weeks start on Monday, week 1 holds the first Thursday.
                let iso = date.iso_week();
                (
                    format!("{}-W{:02}", iso.year(), iso.week()),
                    iso.year() as i64 * 53 + iso.week() as i64,
                )
            }
        }
    }
}

/// The ordered definition of a bucket rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BucketKind {
    NumericRange { ranges: Vec<NumericRange> },
    CategoricalGroup { groups: Vec<CategoryGroup> },
    DateGranularity { granularity: DateGranularity },
}

impl BucketKind {
    pub fn name(&self) -> &'static str {
        match self {
            BucketKind::NumericRange { .. } => "numeric-range",
            BucketKind::CategoricalGroup { .. } => "categorical-group",
            BucketKind::DateGranularity { .. } => "date-granularity",
        }
    }

    /// Whether a dimension of this type can carry this rule kind.
    pub fn accepts(&self, dimension_type: DimensionType) -> bool {
        match self {
            BucketKind::NumericRange { .. } => dimension_type == DimensionType::Numeric,
            BucketKind::DateGranularity { .. } => dimension_type == DimensionType::Date,
            BucketKind::CategoricalGroup { .. } => dimension_type != DimensionType::Date,
        }
    }
}

/// Serializable rule configuration, as submitted by the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRuleDefinition {
    pub dimension: String,
    #[serde(flatten)]
    pub kind: BucketKind,
}

impl BucketRuleDefinition {
    pub fn validate(&self, catalog: &DimensionCatalog) -> SegmentResult<BucketRule> {
        define_bucket_rule(catalog, &self.dimension, self.kind.clone())
    }
}

// ============================================================================
// BUCKETS
// ============================================================================

/// Definition-order key of a bucket. Variant order is axis order:
/// declared buckets, then raw pass-through values, then the fallback
/// bucket, then Missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketOrder {
    Declared(i64),
    Value(ValueKey),
    Fallback,
    Missing,
}

/// A label together with its axis position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket {
    pub order: BucketOrder,
    pub label: String,
}

impl Bucket {
    pub fn missing() -> Self {
        Bucket {
            order: BucketOrder::Missing,
            label: MISSING_LABEL.to_string(),
        }
    }

    fn fallback(label: &str) -> Self {
        Bucket {
            order: BucketOrder::Fallback,
            label: label.to_string(),
        }
    }

    fn declared(order: i64, label: impl Into<String>) -> Self {
        Bucket {
            order: BucketOrder::Declared(order),
            label: label.into(),
        }
    }

    /// Pass-through bucket for a dimension grouped without a rule.
    pub fn raw(value: &Value) -> Self {
        if value.is_missing() {
            return Bucket::missing();
        }
        Bucket {
            order: BucketOrder::Value(value.key()),
            label: value.label(),
        }
    }
}

// ============================================================================
// BUCKET RULE
// ============================================================================

/// A validated, immutable bucket rule for one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRule {
    dimension: String,
    kind: BucketKind,
    /// Categorical member label -> group index.
    members: FxHashMap<String, usize>,
}

impl BucketRule {
    /// Validates the rule definition on its own. Use `define_bucket_rule` to
    /// also check it against the catalog.
    pub fn new(dimension: impl Into<String>, kind: BucketKind) -> SegmentResult<Self> {
        let dimension = dimension.into();
        let mut members = FxHashMap::default();

        match &kind {
            BucketKind::NumericRange { ranges } => validate_ranges(&dimension, ranges)?,
            BucketKind::CategoricalGroup { groups } => {
                if groups.is_empty() {
                    return Err(SegmentError::config_for(
                        &dimension,
                        "Categorical grouping needs at least one group",
                    ));
                }
                validate_labels(&dimension, groups.iter().map(|g| g.label.as_str()))?;
                for (i, group) in groups.iter().enumerate() {
                    for member in &group.members {
                        if members.insert(member.clone(), i).is_some() {
                            return Err(SegmentError::config_for(
                                &dimension,
                                format!("Value '{}' is mapped more than once", member),
                            ));
                        }
                    }
                }
            }
            BucketKind::DateGranularity { .. } => {}
        }

        debug!(target: "BUCKET", "Defined {} rule for '{}'", kind.name(), dimension);
        Ok(BucketRule {
            dimension,
            kind,
            members,
        })
    }

    pub fn numeric_ranges(dimension: impl Into<String>, ranges: Vec<NumericRange>) -> SegmentResult<Self> {
        BucketRule::new(dimension, BucketKind::NumericRange { ranges })
    }

    pub fn categorical_groups(dimension: impl Into<String>, groups: Vec<CategoryGroup>) -> SegmentResult<Self> {
        BucketRule::new(dimension, BucketKind::CategoricalGroup { groups })
    }

    pub fn date_granularity(dimension: impl Into<String>, granularity: DateGranularity) -> SegmentResult<Self> {
        BucketRule::new(dimension, BucketKind::DateGranularity { granularity })
    }

    /// Custom ranges `[b0,b1), [b1,b2), ...`. Default labels read `"b0-b1"`.
    pub fn from_breakpoints(
        dimension: impl Into<String>,
        breakpoints: &[f64],
        labels: Option<Vec<String>>,
    ) -> SegmentResult<Self> {
        let dimension = dimension.into();
        if breakpoints.len() < 2 {
            return Err(SegmentError::config_for(
                &dimension,
                "At least two breakpoints are required",
            ));
        }
        let labels = match labels {
            Some(labels) if labels.len() == breakpoints.len() - 1 => labels,
            Some(labels) => {
                return Err(SegmentError::config_for(
                    &dimension,
                    format!(
                        "{} breakpoints need {} labels, got {}",
                        breakpoints.len(),
                        breakpoints.len() - 1,
                        labels.len()
                    ),
                ))
            }
            None => breakpoints
                .windows(2)
                .map(|w| format!("{}-{}", format_number(w[0]), format_number(w[1])))
                .collect(),
        };
        let ranges = breakpoints
            .windows(2)
            .zip(labels)
            .map(|(w, label)| NumericRange::bounded(w[0], w[1], label))
            .collect();
        BucketRule::numeric_ranges(dimension, ranges)
    }

    /// Equal-width bins from `start` to `end`, plus open overflow buckets on
    /// both sides. The last bin is clipped at `end`.
    pub fn equal_width(dimension: impl Into<String>, start: f64, end: f64, interval: f64) -> SegmentResult<Self> {
        let dimension = dimension.into();
        if !(start.is_finite() && end.is_finite() && interval.is_finite()) {
            return Err(SegmentError::config_for(
                &dimension,
                format!(
                    "Equal-width binning needs finite bounds and interval (got {}..{} by {})",
                    start, end, interval
                ),
            ));
        }
        if !(interval > 0.0) || !(start < end) {
            return Err(SegmentError::config_for(
                &dimension,
                format!(
                    "Equal-width binning needs start < end and a positive interval (got {}..{} by {})",
                    start, end, interval
                ),
            ));
        }

        let bins = ((end - start) / interval).ceil();
        if !(bins <= MAX_EQUAL_WIDTH_BINS as f64) {
            return Err(SegmentError::config_for(
                &dimension,
                format!(
                    "Equal-width binning of {}..{} by {} needs {} bins, at most {} are allowed",
                    start, end, interval, bins, MAX_EQUAL_WIDTH_BINS
                ),
            ));
        }
        let bin_count = bins as usize;
        let mut ranges = Vec::with_capacity(bin_count + 2);
        ranges.push(NumericRange::new(None, Some(start), format!("<{}", format_number(start))));
        for bin_idx in 0..bin_count {
            let bin_start = start + (bin_idx as f64) * interval;
            let bin_end = (bin_start + interval).min(end);
            let label = if bin_start.fract() == 0.0 && bin_end.fract() == 0.0 {
                if bin_end - bin_start == 1.0 {
                    format!("{}", bin_start as i64)
                } else {
                    format!("{}-{}", bin_start as i64, (bin_end - 1.0) as i64)
                }
            } else {
                format!("{:.2}-{:.2}", bin_start, bin_end)
            };
            ranges.push(NumericRange::bounded(bin_start, bin_end, label));
        }
        ranges.push(NumericRange::new(Some(end), None, format!(">={}", format_number(end))));

        BucketRule::numeric_ranges(dimension, ranges)
    }

    /// Quantile bins computed from the dataset's present values. The number
    /// of bins is the number of labels; outer bounds are open so the rule
    /// covers every number.
    pub fn quantiles(dataset: &Dataset, dimension: &str, labels: &[&str]) -> SegmentResult<Self> {
        let declared = dataset
            .schema()
            .get(dimension)
            .ok_or_else(|| SegmentError::unknown_dimension(dimension))?
            .dimension_type;
        if declared != DimensionType::Numeric {
            return Err(SegmentError::config_for(
                dimension,
                format!("Quantile bins need a numeric dimension, '{}' is {}", dimension, declared),
            ));
        }
        if labels.is_empty() {
            return Err(SegmentError::config_for(dimension, "Quantile bins need at least one label"));
        }

        let mut values: Vec<f64> = dataset
            .column(dimension)?
            .filter_map(|v| match v {
                Value::Number(n) if !n.is_nan() => Some(*n),
                _ => None,
            })
            .collect();
        if values.is_empty() {
            return Err(SegmentError::config_for(
                dimension,
                "Quantile bins need at least one present value",
            ));
        }
        values.sort_by(f64::total_cmp);

        let q = labels.len();
        let cuts: Vec<f64> = (1..q)
            .filter_map(|k| quantile(&values, k as f64 / q as f64))
            .collect();
        if cuts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SegmentError::config_for(
                dimension,
                format!("Quantile cut points for '{}' are not distinct", dimension),
            ));
        }

        let ranges = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let lower = if i == 0 { None } else { Some(cuts[i - 1]) };
                let upper = cuts.get(i).copied();
                NumericRange::new(lower, upper, *label)
            })
            .collect();
        BucketRule::numeric_ranges(dimension, ranges)
    }

    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    pub fn kind(&self) -> &BucketKind {
        &self.kind
    }

    pub fn to_definition(&self) -> BucketRuleDefinition {
        BucketRuleDefinition {
            dimension: self.dimension.clone(),
            kind: self.kind.clone(),
        }
    }

    /// Maps a value to its label. Total: never fails.
    pub fn apply(&self, value: &Value) -> String {
        self.bucket(value).label
    }

    /// Maps a value to its bucket (label plus axis order key).
    pub fn bucket(&self, value: &Value) -> Bucket {
        if value.is_missing() {
            return Bucket::missing();
        }

        match &self.kind {
            BucketKind::NumericRange { ranges } => match value {
                Value::Number(n) if !n.is_nan() => ranges
                    .iter()
                    .position(|r| r.contains(*n))
                    .map(|i| Bucket::declared(i as i64, ranges[i].label.as_str()))
                    .unwrap_or_else(|| Bucket::fallback(UNSPECIFIED_LABEL)),
                _ => Bucket::fallback(UNSPECIFIED_LABEL),
            },
            BucketKind::CategoricalGroup { groups } => match self.members.get(&value.label()) {
                Some(&i) => Bucket::declared(i as i64, groups[i].label.as_str()),
                None => Bucket::fallback(OTHER_LABEL),
            },
            BucketKind::DateGranularity { granularity } => match value {
                Value::Date(d) => {
                    let (label, order) = granularity.period(*d);
                    Bucket::declared(order, label)
                }
                _ => Bucket::fallback(UNSPECIFIED_LABEL),
            },
        }
    }

    /// Declared buckets in declaration order. Date rules declare none; their
    /// periods come from the data.
    pub fn declared_buckets(&self) -> Vec<Bucket> {
        match &self.kind {
            BucketKind::NumericRange { ranges } => ranges
                .iter()
                .enumerate()
                .map(|(i, r)| Bucket::declared(i as i64, r.label.as_str()))
                .collect(),
            BucketKind::CategoricalGroup { groups } => groups
                .iter()
                .enumerate()
                .map(|(i, g)| Bucket::declared(i as i64, g.label.as_str()))
                .collect(),
            BucketKind::DateGranularity { .. } => Vec::new(),
        }
    }

    pub fn declared_labels(&self) -> Vec<String> {
        self.declared_buckets().into_iter().map(|b| b.label).collect()
    }
}

/// Builds a rule for a catalog dimension, checking that the dimension exists
/// and that its type fits the rule kind.
pub fn define_bucket_rule(
    catalog: &DimensionCatalog,
    dimension: &str,
    kind: BucketKind,
) -> SegmentResult<BucketRule> {
    let dimension_type = catalog.dimension_type(dimension)?;
    if !kind.accepts(dimension_type) {
        return Err(SegmentError::config_for(
            dimension,
            format!(
                "A {} rule cannot apply to {} dimension '{}'",
                kind.name(),
                dimension_type,
                dimension
            ),
        ));
    }
    BucketRule::new(dimension, kind)
}

// ============================================================================
// VALIDATION HELPERS
// ============================================================================

fn validate_ranges(dimension: &str, ranges: &[NumericRange]) -> SegmentResult<()> {
    if ranges.is_empty() {
        return Err(SegmentError::config_for(dimension, "Numeric ranges must not be empty"));
    }
    validate_labels(dimension, ranges.iter().map(|r| r.label.as_str()))?;

    for range in ranges {
        if range.lower.is_some_and(f64::is_nan) || range.upper.is_some_and(f64::is_nan) {
            return Err(SegmentError::config_for(
                dimension,
                format!("Range '{}' has a NaN bound", range.label),
            ));
        }
        if let (Some(lower), Some(upper)) = (range.lower, range.upper) {
            if lower >= upper {
                return Err(SegmentError::config_for(
                    dimension,
                    format!("Range '{}' is empty: {} >= {}", range.label, lower, upper),
                ));
            }
        }
    }

    for pair in ranges.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let ordered = match (prev.upper, next.lower) {
            (Some(upper), Some(lower)) => upper <= lower,
            _ => false,
        };
        if !ordered {
            return Err(SegmentError::config_for(
                dimension,
                format!(
                    "Ranges '{}' and '{}' overlap or are out of order",
                    prev.label, next.label
                ),
            ));
        }
    }
    Ok(())
}

fn validate_labels<'a>(dimension: &str, labels: impl Iterator<Item = &'a str>) -> SegmentResult<()> {
    let mut seen = FxHashSet::default();
    for label in labels {
        if label.trim().is_empty() {
            return Err(SegmentError::config_for(dimension, "Bucket labels must not be empty"));
        }
        if [MISSING_LABEL, UNSPECIFIED_LABEL, OTHER_LABEL].contains(&label) {
            return Err(SegmentError::config_for(
                dimension,
                format!("'{}' is a reserved bucket label", label),
            ));
        }
        if !seen.insert(label) {
            return Err(SegmentError::config_for(
                dimension,
                format!("Duplicate bucket label '{}'", label),
            ));
        }
    }
    Ok(())
}

/// Linear-interpolated quantile of ascending values, `p` in `[0, 1]`.
/// `None` for an empty slice.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}
