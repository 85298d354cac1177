//! FILENAME: pivot-engine/src/view.rs
//! Pivot View - Read-only output for the rendering layer.
//!
//! This module holds what a computation produces and the derived views
//! built from it:
//! - `PivotResult`: labelled cells with every requested metric, plus
//!   row, column and grand totals
//! - `ValueGrid`: one metric as a dense grid, optionally as a percentage of
//!   a total
//! - `PivotComparison`: two results aligned on the union of their labels

use crate::definition::ShowValuesAs;
use crate::metrics::MetricValues;
use rustc_hash::{FxHashMap, FxHashSet};
use segment_engine::{SegmentError, SegmentResult};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

// ============================================================================
// PIVOT RESULT
// ============================================================================

/// Emitted cells of one row as `(column index, values)`, ascending by column.
pub(crate) type RowEntries = Vec<(usize, MetricValues)>;

/// Output of one pivot computation. Only emitted cells are stored, per row;
/// a combination with no records is absent unless empty cells were
/// requested.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotResult {
    row_labels: Vec<String>,
    column_labels: Vec<String>,
    metrics: Vec<String>,
    cells: Vec<RowEntries>,
    row_totals: Vec<MetricValues>,
    column_totals: Vec<MetricValues>,
    grand_total: MetricValues,
    row_index: FxHashMap<String, usize>,
    column_index: FxHashMap<String, usize>,
}

fn index_labels(labels: &[String]) -> FxHashMap<String, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.clone(), i))
        .collect()
}

impl PivotResult {
    pub(crate) fn new(
        row_labels: Vec<String>,
        column_labels: Vec<String>,
        metrics: Vec<String>,
        cells: Vec<RowEntries>,
        row_totals: Vec<MetricValues>,
        column_totals: Vec<MetricValues>,
        grand_total: MetricValues,
    ) -> Self {
        PivotResult {
            row_index: index_labels(&row_labels),
            column_index: index_labels(&column_labels),
            row_labels,
            column_labels,
            metrics,
            cells,
            row_totals,
            column_totals,
            grand_total,
        }
    }

    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn column_labels(&self) -> &[String] {
        &self.column_labels
    }

    /// Metric names, in the order values are stored.
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn metric_index(&self, metric: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m == metric)
    }

    /// Number of emitted cells.
    pub fn cell_count(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    fn cell_at(&self, row: usize, column: usize) -> Option<&[Option<f64>]> {
        let entries = self.cells.get(row)?;
        let i = entries.binary_search_by_key(&column, |(c, _)| *c).ok()?;
        Some(entries[i].1.as_slice())
    }

    /// Emitted cells as `(row label, column label, values)` in axis order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str, &[Option<f64>])> + '_ {
        self.cells.iter().enumerate().flat_map(move |(r, entries)| {
            entries.iter().map(move |(c, values)| {
                (
                    self.row_labels[r].as_str(),
                    self.column_labels[*c].as_str(),
                    values.as_slice(),
                )
            })
        })
    }

    /// Metric values of a cell, `None` when the cell was not emitted.
    pub fn cell(&self, row: &str, column: &str) -> Option<&[Option<f64>]> {
        let r = *self.row_index.get(row)?;
        let c = *self.column_index.get(column)?;
        self.cell_at(r, c)
    }

    /// One metric of one cell. `None` for an absent cell or a null value.
    pub fn value(&self, row: &str, column: &str, metric: &str) -> Option<f64> {
        let m = self.metric_index(metric)?;
        self.cell(row, column)?[m]
    }

    pub fn row_total(&self, row: &str) -> Option<&[Option<f64>]> {
        self.row_index.get(row).map(|&r| self.row_totals[r].as_slice())
    }

    pub fn column_total(&self, column: &str) -> Option<&[Option<f64>]> {
        self.column_index
            .get(column)
            .map(|&c| self.column_totals[c].as_slice())
    }

    pub fn grand_total(&self) -> &[Option<f64>] {
        &self.grand_total
    }

    fn require_metric(&self, metric: &str) -> SegmentResult<usize> {
        self.metric_index(metric).ok_or_else(|| {
            SegmentError::computation(format!("Metric '{}' is not part of this pivot", metric))
        })
    }

    /// Dense grid of one metric, optionally as a percentage of a total.
    /// Percentages use the re-aggregated totals; a null or zero base gives
    /// null.
    pub fn value_grid(&self, metric: &str, show_as: ShowValuesAs) -> SegmentResult<ValueGrid> {
        let m = self.require_metric(metric)?;
        let grand = self.grand_total[m];

        let mut values = vec![vec![None; self.column_labels.len()]; self.row_labels.len()];
        for (r, entries) in self.cells.iter().enumerate() {
            for (c, cell) in entries {
                let value = cell[m];
                values[r][*c] = match show_as {
                    ShowValuesAs::Values => value,
                    ShowValuesAs::PercentOfRowTotal => percent(value, self.row_totals[r][m]),
                    ShowValuesAs::PercentOfColumnTotal => {
                        percent(value, self.column_totals[*c][m])
                    }
                    ShowValuesAs::PercentOfGrandTotal => percent(value, grand),
                };
            }
        }

        // Totals along the percentage axis are 100; the other axis shows its
        // share of the grand total.
        let row_totals = self
            .row_totals
            .iter()
            .map(|t| match show_as {
                ShowValuesAs::Values => t[m],
                ShowValuesAs::PercentOfRowTotal => percent(t[m], t[m]),
                _ => percent(t[m], grand),
            })
            .collect();
        let column_totals = self
            .column_totals
            .iter()
            .map(|t| match show_as {
                ShowValuesAs::Values => t[m],
                ShowValuesAs::PercentOfColumnTotal => percent(t[m], t[m]),
                _ => percent(t[m], grand),
            })
            .collect();
        let grand_total = match show_as {
            ShowValuesAs::Values => grand,
            _ => percent(grand, grand),
        };

        Ok(ValueGrid {
            metric: metric.to_string(),
            show_as,
            rows: self.row_labels.clone(),
            columns: self.column_labels.clone(),
            values,
            row_totals,
            column_totals,
            grand_total,
        })
    }
}

fn percent(value: Option<f64>, base: Option<f64>) -> Option<f64> {
    match (value, base) {
        (Some(v), Some(b)) if b != 0.0 => Some(v * 100.0 / b),
        _ => None,
    }
}

/// `{metric: value}` for one group.
struct MetricMap<'a> {
    metrics: &'a [String],
    values: &'a [Option<f64>],
}

impl Serialize for MetricMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len()))?;
        for (name, value) in self.metrics.iter().zip(self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// `{label: {metric: value}}` in axis order, skipping absent entries.
struct LabelledMap<'a, I> {
    entries: I,
    metrics: &'a [String],
}

impl<'a, I> Serialize for LabelledMap<'a, I>
where
    I: Iterator<Item = (&'a String, Option<&'a [Option<f64>]>)> + Clone,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (label, values) in self.entries.clone() {
            if let Some(values) = values {
                map.serialize_entry(
                    label,
                    &MetricMap {
                        metrics: self.metrics,
                        values,
                    },
                )?;
            }
        }
        map.end()
    }
}

/// Cells of one row.
struct RowCells<'a> {
    result: &'a PivotResult,
    row: usize,
}

impl Serialize for RowCells<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let result = self.result;
        LabelledMap {
            entries: result.cells[self.row]
                .iter()
                .map(move |(c, values)| (&result.column_labels[*c], Some(values.as_slice()))),
            metrics: &result.metrics,
        }
        .serialize(serializer)
    }
}

struct Cells<'a>(&'a PivotResult);

impl Serialize for Cells<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let result = self.0;
        let mut map = serializer.serialize_map(None)?;
        for (r, label) in result.row_labels.iter().enumerate() {
            if !result.cells[r].is_empty() {
                map.serialize_entry(label, &RowCells { result, row: r })?;
            }
        }
        map.end()
    }
}

/// Serializes as `{rows, columns, cells, rowTotals, columnTotals,
/// grandTotal}` with every map in axis order and null for null metrics.
impl Serialize for PivotResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("rows", &self.row_labels)?;
        map.serialize_entry("columns", &self.column_labels)?;
        map.serialize_entry("cells", &Cells(self))?;
        map.serialize_entry(
            "rowTotals",
            &LabelledMap {
                entries: self
                    .row_labels
                    .iter()
                    .zip(self.row_totals.iter().map(|t| Some(t.as_slice()))),
                metrics: &self.metrics,
            },
        )?;
        map.serialize_entry(
            "columnTotals",
            &LabelledMap {
                entries: self
                    .column_labels
                    .iter()
                    .zip(self.column_totals.iter().map(|t| Some(t.as_slice()))),
                metrics: &self.metrics,
            },
        )?;
        map.serialize_entry(
            "grandTotal",
            &MetricMap {
                metrics: &self.metrics,
                values: &self.grand_total,
            },
        )?;
        map.end()
    }
}

// ============================================================================
// VALUE GRID
// ============================================================================

/// One metric of a pivot as a dense grid. Absent cells are null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueGrid {
    pub metric: String,
    pub show_as: ShowValuesAs,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
    pub row_totals: Vec<Option<f64>>,
    pub column_totals: Vec<Option<f64>>,
    pub grand_total: Option<f64>,
}

// ============================================================================
// COMPARISON
// ============================================================================

/// One aligned cell of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonCell {
    pub first: Option<f64>,
    pub second: Option<f64>,
    /// `first - second`.
    pub difference: Option<f64>,
    /// `difference / second * 100`.
    pub percent_difference: Option<f64>,
}

/// Two pivots of one metric aligned on the union of their labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotComparison {
    pub metric: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub cells: Vec<Vec<ComparisonCell>>,
    #[serde(skip)]
    row_index: FxHashMap<String, usize>,
    #[serde(skip)]
    column_index: FxHashMap<String, usize>,
}

impl PivotComparison {
    pub fn cell(&self, row: &str, column: &str) -> Option<&ComparisonCell> {
        let r = *self.row_index.get(row)?;
        let c = *self.column_index.get(column)?;
        Some(&self.cells[r][c])
    }
}

/// Labels of `a` in order, then those only in `b`.
fn union_labels(a: &[String], b: &[String]) -> Vec<String> {
    let known: FxHashSet<&str> = a.iter().map(String::as_str).collect();
    let mut labels = a.to_vec();
    labels.extend(b.iter().filter(|l| !known.contains(l.as_str())).cloned());
    labels
}

/// Position of each union label in `own`, if present there.
fn positions(union: &[String], own: &FxHashMap<String, usize>) -> Vec<Option<usize>> {
    union.iter().map(|l| own.get(l).copied()).collect()
}

/// Value of a cell where an absent cell counts as 0.
fn aligned_value(
    result: &PivotResult,
    metric: usize,
    row: Option<usize>,
    column: Option<usize>,
) -> Option<f64> {
    match (row, column) {
        (Some(r), Some(c)) => match result.cell_at(r, c) {
            Some(cell) => cell[metric],
            None => Some(0.0),
        },
        _ => Some(0.0),
    }
}

/// Compares one metric of two pivots cell by cell. The second pivot is the
/// base of the percentage difference.
pub fn compare(first: &PivotResult, second: &PivotResult, metric: &str) -> SegmentResult<PivotComparison> {
    let m1 = first.require_metric(metric)?;
    let m2 = second.require_metric(metric)?;
    let rows = union_labels(&first.row_labels, &second.row_labels);
    let columns = union_labels(&first.column_labels, &second.column_labels);
    let (rows_a, rows_b) = (
        positions(&rows, &first.row_index),
        positions(&rows, &second.row_index),
    );
    let (columns_a, columns_b) = (
        positions(&columns, &first.column_index),
        positions(&columns, &second.column_index),
    );

    let cells = (0..rows.len())
        .map(|r| {
            (0..columns.len())
                .map(|c| {
                    let a = aligned_value(first, m1, rows_a[r], columns_a[c]);
                    let b = aligned_value(second, m2, rows_b[r], columns_b[c]);
                    let difference = match (a, b) {
                        (Some(a), Some(b)) => Some(a - b),
                        _ => None,
                    };
                    ComparisonCell {
                        first: a,
                        second: b,
                        difference,
                        percent_difference: percent(difference, b),
                    }
                })
                .collect()
        })
        .collect();

    Ok(PivotComparison {
        metric: metric.to_string(),
        row_index: index_labels(&rows),
        column_index: index_labels(&columns),
        rows,
        columns,
        cells,
    })
}
