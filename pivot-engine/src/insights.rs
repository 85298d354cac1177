//! FILENAME: pivot-engine/src/insights.rs
//! PURPOSE: Distribution summaries of one numeric field, per segment or per
//! trailing period.
//! CONTEXT: Complements the pivot grid. A segment is one dimension, bucketed
//! by the context's rule when it has one; a period is a window over a date
//! dimension ending at a caller-supplied reference date. The context filter
//! applies to both.

use crate::definition::PivotContext;
use crate::engine::{axis_labels, check_filter, check_rules, AxisKey};
use crate::metrics::{numeric_column, ExactSum};
use chrono::NaiveDate;
use log::debug;
use segment_engine::{
    quantile, AnalysisPeriod, Bucket, Dataset, DimensionCatalog, PeriodWindow, SegmentResult,
};
use serde::Serialize;
use smallvec::smallvec;
use std::collections::BTreeMap;

// ============================================================================
// FIELD SUMMARY
// ============================================================================

/// Summary statistics over the present values of a field. Missing values are
/// skipped; every statistic but `sum` is `None` when nothing is left.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    /// Number of present values.
    pub values: usize,
    pub sum: f64,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation (n - 1). Needs two values.
    pub std_dev: Option<f64>,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
}

impl FieldSummary {
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);

        let mut sum = ExactSum::default();
        values.iter().for_each(|v| sum.add(*v));
        let sum = sum.total();
        let n = values.len();
        let mean = (n > 0).then(|| sum / n as f64);

        let std_dev = match mean {
            Some(mean) if n > 1 => {
                let mut squares = ExactSum::default();
                values.iter().for_each(|v| squares.add((v - mean) * (v - mean)));
                Some((squares.total() / (n - 1) as f64).sqrt())
            }
            _ => None,
        };

        FieldSummary {
            values: n,
            sum,
            mean,
            median: quantile(&values, 0.5),
            std_dev,
            p25: quantile(&values, 0.25),
            p75: quantile(&values, 0.75),
        }
    }
}

// ============================================================================
// SEGMENT INSIGHTS
// ============================================================================

/// One segment's size (rows, including those missing the field) and the
/// field's distribution inside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentInsight {
    pub segment: String,
    pub size: usize,
    #[serde(flatten)]
    pub summary: FieldSummary,
}

/// Summarizes `field` per label of `segment`, in bucket order. Rows missing
/// the segment value form the missing segment.
pub fn segment_insights(
    dataset: &Dataset,
    context: &PivotContext,
    segment: &str,
    field: &str,
) -> SegmentResult<Vec<SegmentInsight>> {
    let catalog = DimensionCatalog::from_schema(dataset.schema());
    let segment_column = catalog.index_of(segment)?;
    let field_column = numeric_column(&catalog, field)?;
    check_rules(&catalog, context)?;
    check_filter(context, dataset)?;

    let rule = context.rule(segment);
    let mut groups: BTreeMap<Bucket, (usize, Vec<f64>)> = BTreeMap::new();
    for i in context.filter.select(dataset) {
        let row = &dataset.rows()[i];
        let value = &row[segment_column];
        let bucket = match rule {
            Some(rule) => rule.bucket(value),
            None => Bucket::raw(value),
        };
        let group = groups.entry(bucket).or_default();
        group.0 += 1;
        if let Some(n) = row[field_column].as_number() {
            group.1.push(n);
        }
    }
    debug!(
        target: "METRIC",
        "Segment insights of '{}' over '{}': {} segments",
        field,
        segment,
        groups.len()
    );

    let keys: Vec<AxisKey> = groups.keys().map(|b| smallvec![b.clone()]).collect();
    Ok(axis_labels(&keys)
        .into_iter()
        .zip(groups.into_values())
        .map(|(segment, (size, values))| SegmentInsight {
            segment,
            size,
            summary: FieldSummary::from_values(values),
        })
        .collect())
}

// ============================================================================
// PERIOD METRICS
// ============================================================================

/// Rows inside one trailing period and the field's distribution over them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodMetrics {
    pub period: AnalysisPeriod,
    pub count: usize,
    #[serde(flatten)]
    pub summary: FieldSummary,
}

/// Summarizes `field` over each period ending at `reference`, in the order
/// the periods are given. Rows missing the date only count toward all time.
pub fn period_metrics(
    dataset: &Dataset,
    context: &PivotContext,
    date_dimension: &str,
    field: &str,
    periods: &[AnalysisPeriod],
    reference: NaiveDate,
) -> SegmentResult<Vec<PeriodMetrics>> {
    let catalog = DimensionCatalog::from_schema(dataset.schema());
    let field_column = numeric_column(&catalog, field)?;
    check_filter(context, dataset)?;

    let windows = periods
        .iter()
        .map(|&period| {
            let window = PeriodWindow::new(date_dimension, period, reference).to_filter(&catalog)?;
            Ok((period, context.filter.clone().and(window)))
        })
        .collect::<SegmentResult<Vec<_>>>()?;

    Ok(windows
        .into_iter()
        .map(|(period, filter)| {
            let selected = filter.select(dataset);
            let values = selected
                .iter()
                .filter_map(|&i| dataset.rows()[i][field_column].as_number())
                .collect();
            debug!(
                target: "METRIC",
                "Period {} ending {} kept {} rows",
                period.label(),
                reference,
                selected.len()
            );
            PeriodMetrics {
                period,
                count: selected.len(),
                summary: FieldSummary::from_values(values),
            }
        })
        .collect())
}
