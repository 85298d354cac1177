//! FILENAME: segment-engine/src/value.rs
//! PURPOSE: Defines the typed values a user record can hold.
//! CONTEXT: `Value` is what records carry; `ValueKey` is its normalized,
//! hashable and totally ordered form used for grouping, distinct counts and
//! natural ordering of pass-through labels.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Label used for any missing value, regardless of dimension type.
pub const MISSING_LABEL: &str = "Missing";

/// Declared type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DimensionType {
    Numeric,
    Categorical,
    Date,
    Boolean,
}

impl DimensionType {
    pub fn name(&self) -> &'static str {
        match self {
            DimensionType::Numeric => "numeric",
            DimensionType::Categorical => "categorical",
            DimensionType::Date => "date",
            DimensionType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for DimensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single field value of a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    #[default]
    Missing,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Boolean(bool),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// The dimension type this value fits, `None` for a missing value.
    pub fn value_type(&self) -> Option<DimensionType> {
        match self {
            Value::Missing => None,
            Value::Number(_) => Some(DimensionType::Numeric),
            Value::Text(_) => Some(DimensionType::Categorical),
            Value::Date(_) => Some(DimensionType::Date),
            Value::Boolean(_) => Some(DimensionType::Boolean),
        }
    }

    /// Numeric view used by sum/mean. Booleans count as 1 and 0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self.value_type() {
            Some(t) => t.name(),
            None => "missing",
        }
    }

    /// The display label of a raw value, used when a dimension is grouped
    /// without a bucket rule and for categorical matching.
    pub fn label(&self) -> String {
        match self {
            Value::Missing => MISSING_LABEL.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub fn key(&self) -> ValueKey {
        ValueKey::from(self)
    }
}

/// Formats without unnecessary decimal places.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Missing, Into::into)
    }
}

// ============================================================================
// VALUE KEYS
// ============================================================================

/// Wrapper around f64 that implements Eq, Ord and Hash.
/// -0.0 is folded into 0.0 and every NaN into one canonical NaN, so bit
/// equality, hashing and `total_cmp` agree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(f64);

impl OrderedFloat {
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            OrderedFloat(f64::NAN)
        } else if value == 0.0 {
            OrderedFloat(0.0)
        } else {
            OrderedFloat(value)
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// A normalized, hashable, ordered representation of a value.
/// Variant order is the natural order across types; Missing sorts last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKey {
    Boolean(bool),
    Number(OrderedFloat),
    Date(NaiveDate),
    Text(String),
    Missing,
}

impl From<&Value> for ValueKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Missing => ValueKey::Missing,
            Value::Number(n) => ValueKey::Number(OrderedFloat::new(*n)),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Date(d) => ValueKey::Date(*d),
            Value::Boolean(b) => ValueKey::Boolean(*b),
        }
    }
}
