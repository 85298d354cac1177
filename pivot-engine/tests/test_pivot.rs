//! FILENAME: tests/test_pivot.rs
//! Integration tests for pivot computation over the users fixture.

mod common;

use common::{
    age_rule, assert_close, generated_dataset, generated_records, ltv_dataset, scrambled,
    standard_context, sum_cells, UsersFixture,
};
use pivot_engine::{
    compute_pivot, MetricDef, MetricRegistry, PivotContext, PivotSpec, ShowValuesAs, ALL_LABEL,
};
use segment_engine::{
    bucket_preset, load_dataset, BucketRule, DateGranularity, DimensionCatalog, DimensionDef,
    DimensionType, Filter, Record, Schema, SegmentError, Value, MISSING_LABEL, UNSPECIFIED_LABEL,
};
use std::collections::HashSet;

fn no_dims() -> Vec<String> {
    Vec::new()
}

fn filter(text: &str) -> Filter {
    Filter::parse(text, &UsersFixture::catalog()).unwrap()
}

// ============================================================================
// BUCKETING
// ============================================================================

#[test]
fn test_exhaustive_rule_partitions_filtered_rows() {
    let ds = UsersFixture::dataset();
    let spec = PivotSpec::new(["age"], no_dims()).metric("Count");

    for text in ["", "device_type = 'Mobile'", "total_revenue >= 500"] {
        let ctx = standard_context().with_filter(filter(text));
        let expected = ctx.filter.select(&ds).len() as f64;
        let result = compute_pivot(&ds, &ctx, &spec).unwrap();

        assert_eq!(sum_cells(&result, "Count"), expected, "filter '{}'", text);
        assert!(!result.row_labels().iter().any(|l| l == UNSPECIFIED_LABEL));
    }
}

#[test]
fn test_exhaustive_rule_partitions_generated_rows() {
    let ds = generated_dataset(5_000);
    let catalog = DimensionCatalog::from_schema(ds.schema());

    for text in ["", "device_type = 'Mobile'", "total_orders > 20 OR country = 'FR'"] {
        let ctx = standard_context().with_filter(Filter::parse(text, &catalog).unwrap());
        let expected = ctx.filter.select(&ds).len() as f64;

        for show_empty in [false, true] {
            let spec = PivotSpec::new(["age"], ["device_type"])
                .metric("Count")
                .show_empty(show_empty);
            let result = compute_pivot(&ds, &ctx, &spec).unwrap();

            assert_eq!(sum_cells(&result, "Count"), expected, "'{}' {}", text, show_empty);
            let row_sum: f64 = result
                .row_labels()
                .iter()
                .filter_map(|r| result.row_total(r).unwrap()[0])
                .sum();
            assert_eq!(row_sum, expected);
            assert!(!result.row_labels().iter().any(|l| l == UNSPECIFIED_LABEL));
        }
    }
}

#[test]
fn test_range_boundaries_are_inclusive_lower() {
    let rule = age_rule();
    assert_eq!(rule.apply(&Value::from(18)), "18-24");
    assert_eq!(rule.apply(&Value::from(25)), "25-34");
    assert_eq!(rule.apply(&Value::from(24.999)), "18-24");
    assert_eq!(rule.apply(&Value::Missing), MISSING_LABEL);
}

#[test]
fn test_rows_follow_rule_order_with_missing_last() {
    let ds = UsersFixture::dataset();
    let spec = PivotSpec::new(["age"], no_dims()).metric("Count");
    let result = compute_pivot(&ds, &standard_context(), &spec).unwrap();

    assert_eq!(result.row_labels(), ["18-24", "25-34", "35-44", "55+", MISSING_LABEL]);
    assert_eq!(result.value("55+", ALL_LABEL, "Count"), Some(2.0));
    assert_eq!(result.value(MISSING_LABEL, ALL_LABEL, "Count"), Some(1.0));
}

#[test]
fn test_preset_rule_groups_users() {
    let ds = UsersFixture::dataset();
    let rule = bucket_preset(&ds, "age", "Three Groups").unwrap();
    let ctx = PivotContext::new(MetricRegistry::standard()).with_rule(rule).unwrap();
    let spec = PivotSpec::new(["age"], no_dims()).metric("Count");
    let result = compute_pivot(&ds, &ctx, &spec).unwrap();

    assert_eq!(result.row_labels(), ["18-25", "26-45", "46+", MISSING_LABEL]);
    assert_eq!(result.value("18-25", ALL_LABEL, "Count"), Some(3.0));
}

#[test]
fn test_quantile_rule_covers_every_row() {
    let ds = UsersFixture::dataset();
    let rule = BucketRule::quantiles(&ds, "ltv", &["Q1", "Q2", "Q3", "Q4"]).unwrap();
    let ctx = PivotContext::new(MetricRegistry::standard()).with_rule(rule).unwrap();
    let spec = PivotSpec::new(["ltv"], no_dims()).metric("Count");
    let result = compute_pivot(&ds, &ctx, &spec).unwrap();

    assert_eq!(result.row_labels(), ["Q1", "Q2", "Q3", "Q4"]);
    assert_eq!(sum_cells(&result, "Count"), 8.0);
}

#[test]
fn test_signup_quarters() {
    let ds = UsersFixture::dataset();
    let ctx = standard_context()
        .with_rule(BucketRule::date_granularity("signup_date", DateGranularity::Quarter).unwrap())
        .unwrap();
    let spec = PivotSpec::new(no_dims(), ["signup_date"]).metric("Count");
    let result = compute_pivot(&ds, &ctx, &spec).unwrap();

    assert_eq!(result.column_labels(), ["2024-Q1", "2024-Q2"]);
    assert_eq!(result.value(ALL_LABEL, "2024-Q1", "Count"), Some(5.0));
    assert_eq!(result.value(ALL_LABEL, "2024-Q2", "Count"), Some(3.0));
}

// ============================================================================
// FILTERING
// ============================================================================

#[test]
fn test_conjunction_over_sample_records() {
    let ds = ltv_dataset();
    let catalog = segment_engine::DimensionCatalog::from_schema(ds.schema());
    let f = Filter::parse("age>25 AND LTV<30", &catalog).unwrap();
    assert_eq!(f.select(&ds), vec![0]);
}

#[test]
fn test_missing_age_policy() {
    let ds = UsersFixture::dataset();
    let missing_row = 5;

    let greater = filter("age > 25").select(&ds);
    assert!(!greater.contains(&missing_row));
    assert_eq!(greater.len(), 4);

    let not_equal = filter("age != 25").select(&ds);
    assert!(not_equal.contains(&missing_row));
    assert_eq!(not_equal.len(), 7);
}

#[test]
fn test_empty_dimensions_give_filtered_size() {
    let ds = UsersFixture::dataset();
    let ctx = standard_context().with_filter(filter("total_orders > 5"));
    let spec = PivotSpec::new(no_dims(), no_dims()).metric("Count");
    let result = compute_pivot(&ds, &ctx, &spec).unwrap();

    assert_eq!(result.row_labels(), [ALL_LABEL]);
    assert_eq!(result.column_labels(), [ALL_LABEL]);
    assert_eq!(result.value(ALL_LABEL, ALL_LABEL, "Count"), Some(4.0));
    assert_eq!(result.grand_total()[0], Some(4.0));
}

// ============================================================================
// METRICS AND EMPTY GROUPS
// ============================================================================

#[test]
fn test_show_empty_false_omits_empty_groups() {
    let ds = UsersFixture::dataset();
    let spec = PivotSpec::new(["age"], no_dims()).metric("Count").metric("Avg LTV");
    let result = compute_pivot(&ds, &standard_context(), &spec).unwrap();

    assert!(!result.row_labels().iter().any(|l| l == "45-54"));
    assert!(!result.row_labels().iter().any(|l| l == "Under 18"));
}

#[test]
fn test_show_empty_true_shows_zero_count_and_null_mean() {
    let ds = UsersFixture::dataset();
    let spec = PivotSpec::new(["age"], no_dims())
        .metric("Count")
        .metric("Avg LTV")
        .show_empty(true);
    let result = compute_pivot(&ds, &standard_context(), &spec).unwrap();

    assert_eq!(
        result.row_labels(),
        ["Under 18", "18-24", "25-34", "35-44", "45-54", "55+", MISSING_LABEL]
    );
    assert_eq!(result.value("45-54", ALL_LABEL, "Count"), Some(0.0));
    assert_eq!(result.value("45-54", ALL_LABEL, "Avg LTV"), None);
    assert!(result.cell("45-54", ALL_LABEL).is_some());
}

#[test]
fn test_ratio_on_empty_group_is_null() {
    let ds = UsersFixture::dataset();
    let mut metrics = MetricRegistry::standard();
    metrics
        .register(MetricDef::ratio("Revenue per User", "Total Revenue", "Count"))
        .unwrap();
    let ctx = PivotContext::new(metrics).with_rule(age_rule()).unwrap();
    let spec = PivotSpec::new(["age"], no_dims())
        .metric("Revenue per User")
        .metric("Avg AOV")
        .show_empty(true);
    let result = compute_pivot(&ds, &ctx, &spec).unwrap();

    assert_eq!(result.cell("45-54", ALL_LABEL).unwrap().to_vec(), vec![None::<f64>, None]);
    assert_close(result.value("18-24", ALL_LABEL, "Revenue per User"), 225.0);
    assert_close(result.value("18-24", ALL_LABEL, "Avg AOV"), 90.0);
}

#[test]
fn test_totals_are_reaggregated_not_summed() {
    let ds = UsersFixture::dataset();
    let spec = PivotSpec::new(["country"], ["is_retained"]).metric("Avg LTV");
    let result = compute_pivot(&ds, &standard_context(), &spec).unwrap();

    assert_eq!(result.column_labels(), ["false", "true"]);
    assert_close(result.column_total("true").unwrap()[0], 904.0);
    assert_close(result.row_total("US").unwrap()[0], 362.5);
    assert_close(result.grand_total()[0], 701.25);
}

#[test]
fn test_retention_rate_and_distinct_count() {
    let ds = UsersFixture::dataset();
    let mut metrics = MetricRegistry::standard();
    metrics
        .register(MetricDef::distinct_count("Tiers", "loyalty_tier"))
        .unwrap();
    let ctx = PivotContext::new(metrics);
    let spec = PivotSpec::new(["country"], no_dims())
        .metric("Retention Rate")
        .metric("Tiers");
    let result = compute_pivot(&ds, &ctx, &spec).unwrap();

    assert_close(result.value("US", ALL_LABEL, "Retention Rate"), 0.5);
    assert_close(result.value("DE", ALL_LABEL, "Retention Rate"), 1.0);
    assert_eq!(result.value("US", ALL_LABEL, "Tiers"), Some(3.0));
    assert_eq!(result.grand_total()[1], Some(4.0));
}

#[test]
fn test_metric_errors_surface_before_grouping() {
    let ds = UsersFixture::dataset();
    let mut metrics = MetricRegistry::new();
    metrics.register(MetricDef::ratio("a", "b", "count")).unwrap();
    metrics.register(MetricDef::ratio("b", "a", "count")).unwrap();
    metrics.register(MetricDef::sum("bad", "country")).unwrap();
    let ctx = PivotContext::new(metrics);

    let cyclic = PivotSpec::new(["country"], no_dims()).metric("a");
    assert!(matches!(
        compute_pivot(&ds, &ctx, &cyclic),
        Err(SegmentError::Computation { .. })
    ));

    let mistyped = PivotSpec::new(["country"], no_dims()).metric("bad");
    assert!(matches!(
        compute_pivot(&ds, &ctx, &mistyped),
        Err(SegmentError::TypeMismatch { .. })
    ));
}

// ============================================================================
// RESULTS
// ============================================================================

#[test]
fn test_identical_computations_are_equal() {
    let ds = UsersFixture::dataset();
    let ctx = standard_context().with_filter(filter("country in ('US', 'DE')"));
    let spec = PivotSpec::new(["age"], ["device_type"])
        .metric("Count")
        .metric("Total Revenue");

    let a = compute_pivot(&ds, &ctx, &spec).unwrap();
    let b = compute_pivot(&ds, &ctx, &spec).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_result_json_shape() {
    let ds = UsersFixture::dataset();
    let spec = PivotSpec::new(["device_type"], ["country"]).metric("Total Revenue");
    let result = compute_pivot(&ds, &standard_context(), &spec).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["rows"], serde_json::json!(["Desktop", "Mobile", "Tablet"]));
    assert_eq!(json["columns"], serde_json::json!(["DE", "UK", "US"]));
    assert_eq!(json["cells"]["Desktop"]["US"]["Total Revenue"], 1350.0);
    assert!(json["cells"]["Tablet"].get("US").is_none());
    assert_eq!(json["rowTotals"]["Mobile"]["Total Revenue"], 2750.0);
    assert_eq!(json["grandTotal"]["Total Revenue"], 7800.0);
}

#[test]
fn test_percent_of_grand_total_grid() {
    let ds = UsersFixture::dataset();
    let spec = PivotSpec::new(["device_type"], no_dims()).metric("Total Revenue");
    let result = compute_pivot(&ds, &standard_context(), &spec).unwrap();
    let grid = result
        .value_grid("Total Revenue", ShowValuesAs::PercentOfGrandTotal)
        .unwrap();

    assert_eq!(grid.rows, vec!["Desktop", "Mobile", "Tablet"]);
    assert_close(grid.values[2][0], 600.0 * 100.0 / 7800.0);
    assert_close(grid.grand_total, 100.0);
    let total: f64 = grid.values.iter().filter_map(|row| row[0]).sum();
    assert_close(Some(total), 100.0);
}

// ============================================================================
// ROBUSTNESS
// ============================================================================

#[test]
fn test_row_order_does_not_change_results() {
    let mut records = generated_records(3_000);
    for revenue in [1e16, 1.0, -1e16, 0.1, 0.2, 0.3] {
        let mut record = Record::new()
            .with("total_revenue", revenue)
            .with("total_orders", 1)
            .with("loyalty_tier", "Gold");
        record.set("age", 30);
        record.set("device_type", "Mobile");
        records.push(record);
    }
    let ordered = load_dataset(records.clone(), UsersFixture::schema()).unwrap();
    let shuffled = load_dataset(scrambled(&records), UsersFixture::schema()).unwrap();

    let mut metrics = MetricRegistry::standard();
    metrics
        .register(MetricDef::distinct_count("Countries", "country"))
        .unwrap();
    let ctx = PivotContext::new(metrics).with_rule(age_rule()).unwrap();

    for show_empty in [false, true] {
        let spec = PivotSpec::new(["age", "device_type"], ["loyalty_tier"])
            .metric("Count")
            .metric("Total Revenue")
            .metric("Avg LTV")
            .metric("Avg AOV")
            .metric("Retention Rate")
            .metric("Countries")
            .show_empty(show_empty);
        let a = compute_pivot(&ordered, &ctx, &spec).unwrap();
        let b = compute_pivot(&shuffled, &ctx, &spec).unwrap();

        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}

#[test]
fn test_pass_through_labels_stay_distinct() {
    let mut records = UsersFixture::records();
    records[0].set("device_type", "Missing");
    records[1].set("device_type", "Missing");
    records.push(Record::new().with("country", "US"));
    let ds = load_dataset(records, UsersFixture::schema()).unwrap();

    let spec = PivotSpec::new(["device_type"], no_dims()).metric("Count");
    let result = compute_pivot(&ds, &standard_context(), &spec).unwrap();

    assert_eq!(
        result.row_labels(),
        ["Desktop", "Missing (2)", "Mobile", "Tablet", MISSING_LABEL]
    );
    assert_eq!(result.value("Missing (2)", ALL_LABEL, "Count"), Some(2.0));
    assert_eq!(result.value(MISSING_LABEL, ALL_LABEL, "Count"), Some(1.0));
    assert_eq!(sum_cells(&result, "Count"), 9.0);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["cells"].as_object().unwrap().len(), 5);
}

#[test]
fn test_high_cardinality_pass_through_axes() {
    let schema = Schema::new(vec![
        DimensionDef::new("id", DimensionType::Numeric),
        DimensionDef::new("other", DimensionType::Categorical),
    ])
    .unwrap();
    let n = 20_000;
    let records = (0..n)
        .map(|i| {
            Record::new()
                .with("id", i as i64)
                .with("other", format!("u{}", n - i))
        })
        .collect();
    let ds = load_dataset(records, schema).unwrap();

    let spec = PivotSpec::new(["id"], ["other"]).metric("count");
    let result = compute_pivot(&ds, &PivotContext::default(), &spec).unwrap();

    assert_eq!(result.row_labels().len(), n);
    assert_eq!(result.column_labels().len(), n);
    assert_eq!(result.cell_count(), n);
    assert_eq!(sum_cells(&result, "count"), n as f64);

    let labels: HashSet<&String> = result.row_labels().iter().collect();
    assert_eq!(labels.len(), n);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["cells"].as_object().unwrap().len(), n);
}
