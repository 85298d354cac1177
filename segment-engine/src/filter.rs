//! FILENAME: segment-engine/src/filter.rs
//! PURPOSE: Type-checks filter expressions against the catalog and evaluates
//! them per record.
//! CONTEXT: Text goes through filter_parser into an AST; `Filter::from_expr`
//! resolves every dimension to a column index and converts every literal to a
//! typed value, so evaluation itself cannot fail. Evaluation is a pure
//! function of one row and never touches the dataset.
//!
//! MISSING VALUES: every operator except `!=` is false on a missing value;
//! `!=` is true.

use crate::catalog::DimensionCatalog;
use crate::dataset::Dataset;
use crate::error::{SegmentError, SegmentResult};
use crate::value::{DimensionType, Value};
use chrono::NaiveDate;
use filter_parser::{Comparison, ComparisonOperator, FilterExpr, Literal};
use log::debug;
use std::cmp::Ordering;

/// Right-hand side of a resolved comparison.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

/// A resolved, typed predicate tree.
#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Compare {
        index: usize,
        operator: ComparisonOperator,
        operand: Operand,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    fn eval(&self, row: &[Value]) -> bool {
        match self {
            Predicate::Compare {
                index,
                operator,
                operand,
            } => compare(&row[*index], *operator, operand),
            Predicate::And(children) => children.iter().all(|c| c.eval(row)),
            Predicate::Or(children) => children.iter().any(|c| c.eval(row)),
        }
    }
}

fn compare(value: &Value, operator: ComparisonOperator, operand: &Operand) -> bool {
    if value.is_missing() {
        return operator == ComparisonOperator::NotEqual;
    }

    match (operator, operand) {
        (ComparisonOperator::Equal, Operand::Scalar(lit)) => value == lit,
        (ComparisonOperator::NotEqual, Operand::Scalar(lit)) => value != lit,
        (ComparisonOperator::In, Operand::List(items)) => items.contains(value),
        (ComparisonOperator::Contains, Operand::Scalar(Value::Text(needle))) => {
            value.as_text().is_some_and(|s| s.contains(needle.as_str()))
        }
        (op, Operand::Scalar(lit)) => match order(value, lit) {
            Some(ordering) => match op {
                ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
                ComparisonOperator::GreaterEqual => ordering != Ordering::Less,
                ComparisonOperator::LessThan => ordering == Ordering::Less,
                ComparisonOperator::LessEqual => ordering != Ordering::Greater,
                _ => false,
            },
            None => false,
        },
        _ => false,
    }
}

/// Ordering of two values of the same orderable type. NaN compares to nothing.
fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// A validated filter, bound to the schema it was checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    source: String,
    root: Option<Predicate>,
    schema_fingerprint: Option<u64>,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::all()
    }
}

impl Filter {
    /// The filter that matches every row.
    pub fn all() -> Self {
        Filter {
            source: String::new(),
            root: None,
            schema_fingerprint: None,
        }
    }

    /// Parses and type-checks filter text. Empty text matches all rows.
    pub fn parse(text: &str, catalog: &DimensionCatalog) -> SegmentResult<Self> {
        if text.trim().is_empty() {
            return Ok(Filter::all());
        }
        let expr = filter_parser::parse(text)?;
        let mut filter = Filter::from_expr(&expr, catalog)?;
        filter.source = text.to_string();
        Ok(filter)
    }

    /// Type-checks an already parsed expression.
    pub fn from_expr(expr: &FilterExpr, catalog: &DimensionCatalog) -> SegmentResult<Self> {
        let root = resolve(expr, catalog)?;
        debug!(target: "FILTER", "Compiled filter: {}", expr);
        Ok(Filter {
            source: expr.to_string(),
            root: Some(root),
            schema_fingerprint: Some(catalog.schema().fingerprint()),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True for the match-all filter.
    pub fn is_all(&self) -> bool {
        self.root.is_none()
    }

    /// Whether this filter was checked against the given schema.
    pub fn is_compatible(&self, dataset: &Dataset) -> bool {
        self.schema_fingerprint
            .map_or(true, |fp| fp == dataset.schema().fingerprint())
    }

    /// Evaluates the filter on one schema-aligned row.
    pub fn matches(&self, row: &[Value]) -> bool {
        self.root.as_ref().map_or(true, |p| p.eval(row))
    }

    /// Indices of the matching rows, in dataset order.
    pub fn select(&self, dataset: &Dataset) -> Vec<usize> {
        let selected: Vec<usize> = dataset
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row))
            .map(|(i, _)| i)
            .collect();
        debug!(
            target: "FILTER",
            "Filter '{}' selected {} of {} rows",
            self.source,
            selected.len(),
            dataset.len()
        );
        selected
    }

    /// Conjunction of two filters checked against the same catalog.
    pub fn and(self, other: Filter) -> Filter {
        match (self.root, other.root) {
            (None, root) => Filter { root, ..other },
            (root, None) => Filter { root, ..self },
            (Some(a), Some(b)) => {
                let mut children = Vec::new();
                for p in [a, b] {
                    match p {
                        Predicate::And(inner) => children.extend(inner),
                        p => children.push(p),
                    }
                }
                Filter {
                    source: format!("({}) AND ({})", self.source, other.source),
                    root: Some(Predicate::And(children)),
                    schema_fingerprint: self.schema_fingerprint.or(other.schema_fingerprint),
                }
            }
        }
    }
}

/// Parses and type-checks filter text against the catalog.
pub fn parse_filter(text: &str, catalog: &DimensionCatalog) -> SegmentResult<Filter> {
    Filter::parse(text, catalog)
}

// ============================================================================
// TYPE CHECKING
// ============================================================================

fn resolve(expr: &FilterExpr, catalog: &DimensionCatalog) -> SegmentResult<Predicate> {
    match expr {
        FilterExpr::Comparison(c) => resolve_comparison(c, catalog),
        FilterExpr::And(children) => children
            .iter()
            .map(|c| resolve(c, catalog))
            .collect::<SegmentResult<Vec<_>>>()
            .map(Predicate::And),
        FilterExpr::Or(children) => children
            .iter()
            .map(|c| resolve(c, catalog))
            .collect::<SegmentResult<Vec<_>>>()
            .map(Predicate::Or),
    }
}

fn resolve_comparison(c: &Comparison, catalog: &DimensionCatalog) -> SegmentResult<Predicate> {
    let info = catalog.describe(&c.dimension).map_err(|e| e.at(c.position))?;

    if !info.allowed_operators.contains(&c.operator) {
        let allowed: Vec<&str> = info.allowed_operators.iter().map(|op| op.symbol()).collect();
        return Err(SegmentError::TypeMismatch {
            dimension: c.dimension.clone(),
            expected: format!("an operator for {} values ({})", info.dimension_type, allowed.join(", ")),
            found: format!("'{}'", c.operator),
            position: Some(c.position),
        });
    }

    let operand = match &c.literal {
        Literal::List(items) => Operand::List(
            items
                .iter()
                .map(|item| typed_literal(item, info.dimension_type, c))
                .collect::<SegmentResult<Vec<_>>>()?,
        ),
        literal => Operand::Scalar(typed_literal(literal, info.dimension_type, c)?),
    };

    Ok(Predicate::Compare {
        index: info.index,
        operator: c.operator,
        operand,
    })
}

/// Converts a literal to a value of the dimension's declared type.
fn typed_literal(literal: &Literal, dimension_type: DimensionType, c: &Comparison) -> SegmentResult<Value> {
    let value = match (dimension_type, literal) {
        (DimensionType::Numeric, Literal::Number(n)) => Some(Value::Number(*n)),
        (DimensionType::Categorical, Literal::Text(s)) => Some(Value::Text(s.clone())),
        (DimensionType::Boolean, Literal::Boolean(b)) => Some(Value::Boolean(*b)),
        (DimensionType::Date, Literal::Text(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(Value::Date),
        _ => None,
    };

    value.ok_or_else(|| SegmentError::TypeMismatch {
        dimension: c.dimension.clone(),
        expected: match dimension_type {
            DimensionType::Numeric => "number".to_string(),
            DimensionType::Categorical => "text".to_string(),
            DimensionType::Boolean => "boolean".to_string(),
            DimensionType::Date => "date (YYYY-MM-DD)".to_string(),
        },
        found: format!("{} {}", literal.kind_name(), literal),
        position: Some(c.literal_position),
    })
}
