//! FILENAME: pivot-engine/src/engine.rs
//! Pivot Engine - The calculation core that turns a dataset into a PivotResult.
//!
//! This module takes a PivotContext (bucket rules, filter, metrics), a
//! PivotSpec (axes and metric names) and a Dataset and produces a
//! PivotResult (labelled cells plus totals).
//!
//! Algorithm:
//! 1. Validate the spec against the catalog and resolve the metric plan
//! 2. Filter the dataset to a row subset
//! 3. Single pass: bucket every row into a (row key, column key) pair and
//!    feed the cell, row-total, column-total and grand-total accumulators
//! 4. Order both axes by bucket definition order (Cartesian product of the
//!    per-dimension domains when `show_empty` is set)
//! 5. Finish every group through the metric plan

use crate::definition::{PivotContext, PivotSpec};
use crate::metrics::{GroupAccumulator, MetricPlan};
use crate::view::{PivotResult, RowEntries};
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use segment_engine::{
    Bucket, BucketOrder, BucketRule, Dataset, DimensionCatalog, SegmentError, SegmentResult,
    Value,
};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Label of an axis with no dimensions.
pub const ALL_LABEL: &str = "All";

/// Separator between the parts of a multi-dimension axis label.
pub const LABEL_SEPARATOR: &str = " / ";

/// Buckets of one record along one axis, outer to inner.
pub type AxisKey = SmallVec<[Bucket; 4]>;

// ============================================================================
// VALIDATION
// ============================================================================

/// Checks a spec against the catalog and the context, returning the metric
/// plan. Everything a computation can reject is rejected here.
pub fn validate_spec(
    catalog: &DimensionCatalog,
    context: &PivotContext,
    spec: &PivotSpec,
) -> SegmentResult<MetricPlan> {
    let plan = context.metrics.plan(&spec.metrics, catalog)?;

    let mut seen = FxHashSet::default();
    for dimension in spec.row_dimensions.iter().chain(&spec.column_dimensions) {
        catalog.index_of(dimension)?;
        if !seen.insert(dimension.as_str()) {
            return Err(SegmentError::config_for(
                dimension,
                format!("Dimension '{}' is used more than once in the pivot axes", dimension),
            ));
        }
    }

    check_rules(catalog, context)?;
    Ok(plan)
}

/// Every bucket rule in the context must fit its catalog dimension.
pub(crate) fn check_rules(catalog: &DimensionCatalog, context: &PivotContext) -> SegmentResult<()> {
    for rule in context.rules() {
        let dimension_type = catalog.dimension_type(rule.dimension())?;
        if !rule.kind().accepts(dimension_type) {
            return Err(SegmentError::config_for(
                rule.dimension(),
                format!(
                    "A {} rule cannot apply to {} dimension '{}'",
                    rule.kind().name(),
                    dimension_type,
                    rule.dimension()
                ),
            ));
        }
    }
    Ok(())
}

/// The context's filter must have been compiled against the dataset's schema.
pub(crate) fn check_filter(context: &PivotContext, dataset: &Dataset) -> SegmentResult<()> {
    if context.filter.is_compatible(dataset) {
        return Ok(());
    }
    Err(SegmentError::config(format!(
        "Filter '{}' was compiled against a different schema",
        context.filter.source()
    )))
}

// ============================================================================
// AXIS
// ============================================================================

/// One dimension of an axis: its column and optional bucket rule.
struct AxisField<'a> {
    column: usize,
    rule: Option<&'a BucketRule>,
}

impl AxisField<'_> {
    fn bucket(&self, value: &Value) -> Bucket {
        match self.rule {
            Some(rule) => rule.bucket(value),
            None => Bucket::raw(value),
        }
    }
}

struct Axis<'a> {
    fields: Vec<AxisField<'a>>,
}

impl<'a> Axis<'a> {
    fn new(
        dimensions: &[String],
        catalog: &DimensionCatalog,
        context: &'a PivotContext,
    ) -> SegmentResult<Self> {
        let fields = dimensions
            .iter()
            .map(|name| {
                Ok(AxisField {
                    column: catalog.index_of(name)?,
                    rule: context.rule(name),
                })
            })
            .collect::<SegmentResult<Vec<_>>>()?;
        Ok(Axis { fields })
    }

    fn key(&self, row: &[Value]) -> AxisKey {
        self.fields.iter().map(|f| f.bucket(&row[f.column])).collect()
    }

    /// Every combination of per-dimension domains, in axis order. A domain is
    /// the rule's declared buckets plus the buckets observed in `keys`.
    fn product<'k>(&self, keys: impl Iterator<Item = &'k AxisKey>) -> Vec<AxisKey> {
        let mut domains: Vec<BTreeSet<Bucket>> = self
            .fields
            .iter()
            .map(|f| {
                f.rule
                    .map(|r| r.declared_buckets().into_iter().collect())
                    .unwrap_or_default()
            })
            .collect();
        for key in keys {
            for (domain, bucket) in domains.iter_mut().zip(key.iter()) {
                domain.insert(bucket.clone());
            }
        }

        let mut combos: Vec<AxisKey> = vec![AxisKey::new()];
        for domain in &domains {
            combos = combos
                .iter()
                .flat_map(|prefix| {
                    domain.iter().map(move |bucket| {
                        let mut key = prefix.clone();
                        key.push(bucket.clone());
                        key
                    })
                })
                .collect();
        }
        combos
    }
}

/// Joins the labels of an axis key.
pub fn axis_label(key: &[Bucket]) -> String {
    if key.is_empty() {
        return ALL_LABEL.to_string();
    }
    key.iter()
        .map(|b| b.label.as_str())
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}

/// Labels of an ordered axis, one per key and all distinct.
///
/// Distinct keys can render to the same text: a raw category named
/// "Missing" next to missing values, or a raw value containing the label
/// separator. Keys made only of rule buckets claim their label first; a raw
/// key whose label is taken gets a " (2)", " (3)", ... suffix.
pub(crate) fn axis_labels(keys: &[AxisKey]) -> Vec<String> {
    let mut labels: Vec<String> = keys.iter().map(|k| axis_label(k)).collect();
    let is_raw = |key: &AxisKey| key.iter().any(|b| matches!(b.order, BucketOrder::Value(_)));

    let mut claim_order: Vec<usize> = (0..keys.len()).collect();
    claim_order.sort_by_key(|&i| is_raw(&keys[i]));

    let mut taken: FxHashSet<String> = FxHashSet::default();
    for i in claim_order {
        if taken.insert(labels[i].clone()) {
            continue;
        }
        let base = std::mem::take(&mut labels[i]);
        let mut n = 2;
        let renamed = loop {
            let candidate = format!("{} ({})", base, n);
            if taken.insert(candidate.clone()) {
                break candidate;
            }
            n += 1;
        };
        warn!(
            target: "PIVOT",
            "Axis label '{}' is shared by distinct groups, one is shown as '{}'",
            base,
            renamed
        );
        labels[i] = renamed;
    }
    labels
}

// ============================================================================
// PIVOT CALCULATOR
// ============================================================================

/// Grouped accumulators produced by the single pass over the filtered rows.
struct Groups {
    cells: FxHashMap<(AxisKey, AxisKey), GroupAccumulator>,
    row_totals: FxHashMap<AxisKey, GroupAccumulator>,
    column_totals: FxHashMap<AxisKey, GroupAccumulator>,
    grand_total: GroupAccumulator,
}

/// The calculation engine for one pivot over one dataset.
pub struct PivotCalculator<'a> {
    dataset: &'a Dataset,
    context: &'a PivotContext,
    spec: &'a PivotSpec,
    plan: MetricPlan,
    rows: Axis<'a>,
    columns: Axis<'a>,
}

impl<'a> PivotCalculator<'a> {
    /// Validates the spec and prepares both axes.
    pub fn new(
        dataset: &'a Dataset,
        context: &'a PivotContext,
        spec: &'a PivotSpec,
    ) -> SegmentResult<Self> {
        let catalog = DimensionCatalog::from_schema(dataset.schema());
        let plan = validate_spec(&catalog, context, spec)?;
        check_filter(context, dataset)?;

        Ok(PivotCalculator {
            dataset,
            context,
            spec,
            rows: Axis::new(&spec.row_dimensions, &catalog, context)?,
            columns: Axis::new(&spec.column_dimensions, &catalog, context)?,
            plan,
        })
    }

    /// Executes the calculation. Does not fail once constructed.
    pub fn calculate(&self) -> PivotResult {
        // Step 1: Row subset
        let selected = self.context.filter.select(self.dataset);
        debug!(
            target: "PIVOT",
            "Filter '{}' kept {} of {} rows",
            self.context.filter.source(),
            selected.len(),
            self.dataset.len()
        );

        // Step 2: Single grouping pass
        let groups = self.group(&selected);

        // Step 3: Axis order
        let (row_keys, column_keys) = self.axis_keys(&groups);
        debug!(
            target: "PIVOT",
            "Built {} cells over {} rows x {} columns",
            groups.cells.len(),
            row_keys.len(),
            column_keys.len()
        );

        // Step 4: Finish every group, placing cells by axis position
        let row_index: FxHashMap<&AxisKey, usize> =
            row_keys.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let column_index: FxHashMap<&AxisKey, usize> =
            column_keys.iter().enumerate().map(|(i, k)| (k, i)).collect();

        let mut cells: Vec<RowEntries> = vec![RowEntries::new(); row_keys.len()];
        for ((row_key, column_key), acc) in &groups.cells {
            if let (Some(&r), Some(&c)) = (row_index.get(row_key), column_index.get(column_key)) {
                cells[r].push((c, self.plan.finish(acc)));
            }
        }
        for row in &mut cells {
            row.sort_unstable_by_key(|(c, _)| *c);
        }
        if self.spec.show_empty || self.is_single_cell() {
            self.fill_empty_cells(&mut cells, column_keys.len());
        }

        let empty = self.plan.accumulator();
        let finish = |acc: Option<&GroupAccumulator>| self.plan.finish(acc.unwrap_or(&empty));
        let row_totals = row_keys
            .iter()
            .map(|k| finish(groups.row_totals.get(k)))
            .collect();
        let column_totals = column_keys
            .iter()
            .map(|k| finish(groups.column_totals.get(k)))
            .collect();

        PivotResult::new(
            axis_labels(&row_keys),
            axis_labels(&column_keys),
            self.plan.names().to_vec(),
            cells,
            row_totals,
            column_totals,
            self.plan.finish(&groups.grand_total),
        )
    }

    /// Gives every row an entry for every column; combinations without
    /// records get the empty-group values.
    fn fill_empty_cells(&self, cells: &mut [RowEntries], columns: usize) {
        let empty = self.plan.finish(&self.plan.accumulator());
        for row in cells.iter_mut() {
            if row.len() == columns {
                continue;
            }
            let mut present = std::mem::take(row).into_iter().peekable();
            for c in 0..columns {
                match present.next_if(|(column, _)| *column == c) {
                    Some(entry) => row.push(entry),
                    None => row.push((c, empty.clone())),
                }
            }
        }
    }

    fn is_single_cell(&self) -> bool {
        self.rows.fields.is_empty() && self.columns.fields.is_empty()
    }

    fn group(&self, selected: &[usize]) -> Groups {
        let plan = &self.plan;
        let mut groups = Groups {
            cells: FxHashMap::default(),
            row_totals: FxHashMap::default(),
            column_totals: FxHashMap::default(),
            grand_total: plan.accumulator(),
        };

        let records = self.dataset.rows();
        for &index in selected {
            let record = &records[index];
            let row_key = self.rows.key(record);
            let column_key = self.columns.key(record);

            plan.add(
                groups
                    .row_totals
                    .entry(row_key.clone())
                    .or_insert_with(|| plan.accumulator()),
                record,
            );
            plan.add(
                groups
                    .column_totals
                    .entry(column_key.clone())
                    .or_insert_with(|| plan.accumulator()),
                record,
            );
            plan.add(
                groups
                    .cells
                    .entry((row_key, column_key))
                    .or_insert_with(|| plan.accumulator()),
                record,
            );
            plan.add(&mut groups.grand_total, record);
        }
        groups
    }

    fn axis_keys(&self, groups: &Groups) -> (Vec<AxisKey>, Vec<AxisKey>) {
        if self.is_single_cell() {
            return (vec![AxisKey::new()], vec![AxisKey::new()]);
        }
        if self.spec.show_empty {
            return (
                self.rows.product(groups.row_totals.keys()),
                self.columns.product(groups.column_totals.keys()),
            );
        }
        let rows: BTreeSet<&AxisKey> = groups.row_totals.keys().collect();
        let columns: BTreeSet<&AxisKey> = groups.column_totals.keys().collect();
        (
            rows.into_iter().cloned().collect(),
            columns.into_iter().cloned().collect(),
        )
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Computes a pivot over a dataset. This is the main entry point for the
/// calculation engine; all configuration errors surface before any row is
/// read.
pub fn compute_pivot(
    dataset: &Dataset,
    context: &PivotContext,
    spec: &PivotSpec,
) -> SegmentResult<PivotResult> {
    let calculator = PivotCalculator::new(dataset, context, spec)?;
    let result = calculator.calculate();
    info!(
        target: "PIVOT",
        "Computed pivot {:?} x {:?}: {} rows, {} columns",
        spec.row_dimensions,
        spec.column_dimensions,
        result.row_labels().len(),
        result.column_labels().len()
    );
    Ok(result)
}
