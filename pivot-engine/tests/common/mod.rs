//! FILENAME: tests/common/mod.rs
//! Fixtures and assertion helpers for pivot-engine integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use pivot_engine::{MetricRegistry, PivotContext, PivotResult};
use segment_engine::{
    load_dataset, BucketRule, Dataset, DimensionCatalog, DimensionDef, DimensionType,
    NumericRange, Record, Schema,
};
use std::sync::Arc;

// ============================================================================
// FIXTURES
// ============================================================================

/// Hand-written user records with the standard analytics dimensions.
pub struct UsersFixture;

type UserRow = (
    Option<i64>,  // age
    f64,          // ltv
    f64,          // total_revenue
    i64,          // total_orders
    bool,         // is_retained
    &'static str, // device_type
    &'static str, // country
    &'static str, // loyalty_tier
    (i32, u32, u32),
);

impl UsersFixture {
    pub fn schema() -> Schema {
        Schema::new(vec![
            DimensionDef::new("age", DimensionType::Numeric),
            DimensionDef::new("ltv", DimensionType::Numeric),
            DimensionDef::new("total_revenue", DimensionType::Numeric),
            DimensionDef::new("total_orders", DimensionType::Numeric),
            DimensionDef::new("is_retained", DimensionType::Boolean),
            DimensionDef::new("device_type", DimensionType::Categorical),
            DimensionDef::new("country", DimensionType::Categorical),
            DimensionDef::new("loyalty_tier", DimensionType::Categorical),
            DimensionDef::new("signup_date", DimensionType::Date),
        ])
        .unwrap()
    }

    pub fn data() -> Vec<UserRow> {
        vec![
            (Some(19), 120.0, 300.0, 3, true, "Mobile", "US", "Bronze", (2024, 1, 15)),
            (Some(24), 80.0, 150.0, 2, false, "Desktop", "US", "Silver", (2024, 2, 3)),
            (Some(25), 1500.0, 2000.0, 20, true, "Mobile", "UK", "Gold", (2024, 2, 20)),
            (Some(33), 400.0, 600.0, 6, true, "Tablet", "DE", "Platinum", (2024, 3, 11)),
            (Some(41), 950.0, 1200.0, 8, false, "Desktop", "US", "Gold", (2024, 3, 30)),
            (None, 60.0, 0.0, 0, false, "Mobile", "UK", "Bronze", (2024, 4, 2)),
            (Some(58), 2200.0, 3100.0, 31, true, "Desktop", "DE", "Platinum", (2024, 4, 18)),
            (Some(67), 300.0, 450.0, 5, true, "Mobile", "US", "Silver", (2024, 5, 7)),
        ]
    }

    pub fn records() -> Vec<Record> {
        Self::data()
            .into_iter()
            .map(|(age, ltv, revenue, orders, retained, device, country, tier, (y, m, d))| {
                Record::new()
                    .with("age", age)
                    .with("ltv", ltv)
                    .with("total_revenue", revenue)
                    .with("total_orders", orders)
                    .with("is_retained", retained)
                    .with("device_type", device)
                    .with("country", country)
                    .with("loyalty_tier", tier)
                    .with("signup_date", NaiveDate::from_ymd_opt(y, m, d).unwrap())
            })
            .collect()
    }

    pub fn dataset() -> Arc<Dataset> {
        load_dataset(Self::records(), Self::schema()).unwrap()
    }

    pub fn catalog() -> DimensionCatalog {
        DimensionCatalog::from_schema(&Self::schema())
    }
}

/// Deterministic users spread over every standard dimension. Every 25th user
/// has no age and every 40th no device.
pub fn generated_records(count: usize) -> Vec<Record> {
    const DEVICES: &[&str] = &["Mobile", "Desktop", "Tablet"];
    const COUNTRIES: &[&str] = &["US", "UK", "DE", "FR", "CA"];
    const TIERS: &[&str] = &["Bronze", "Silver", "Gold", "Platinum"];
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

    (0..count)
        .map(|i| {
            let mut record = Record::new()
                .with("ltv", ((i * 37) % 5000) as f64 + 0.1 * (i % 7) as f64)
                .with("total_revenue", ((i * 91) % 7000) as f64 * 1.5)
                .with("total_orders", ((i * 13) % 40) as i64)
                .with("is_retained", i % 3 != 0)
                .with("country", COUNTRIES[(i / 7) % COUNTRIES.len()])
                .with("loyalty_tier", TIERS[(i / 11) % TIERS.len()])
                .with("signup_date", start + chrono::Duration::days((i % 500) as i64));
            if i % 25 != 0 {
                record.set("age", (12 + (i * 7) % 70) as i64);
            }
            if i % 40 != 0 {
                record.set("device_type", DEVICES[i % DEVICES.len()]);
            }
            record
        })
        .collect()
}

pub fn generated_dataset(count: usize) -> Arc<Dataset> {
    load_dataset(generated_records(count), UsersFixture::schema()).unwrap()
}

/// The same records in a fixed scrambled order.
pub fn scrambled<T: Clone>(items: &[T]) -> Vec<T> {
    let n = items.len();
    // 7919 is prime, so stepping by it visits every index once unless n is a multiple.
    let step = if n % 7919 == 0 { 1 } else { 7919 };
    (0..n).map(|i| items[(i * step + 3) % n].clone()).collect()
}

/// The three records `{age, LTV}` used for filter semantics.
pub fn ltv_dataset() -> Arc<Dataset> {
    let schema = Schema::new(vec![
        DimensionDef::new("age", DimensionType::Numeric),
        DimensionDef::new("LTV", DimensionType::Numeric),
    ])
    .unwrap();
    load_dataset(
        vec![
            Record::new().with("age", 30).with("LTV", 10),
            Record::new().with("age", 20).with("LTV", 10),
            Record::new().with("age", 40).with("LTV", 50),
        ],
        schema,
    )
    .unwrap()
}

/// Exhaustive age ranges: every present age gets exactly one declared label.
pub fn age_rule() -> BucketRule {
    BucketRule::numeric_ranges(
        "age",
        vec![
            NumericRange::new(None, Some(18.0), "Under 18"),
            NumericRange::bounded(18.0, 25.0, "18-24"),
            NumericRange::bounded(25.0, 35.0, "25-34"),
            NumericRange::bounded(35.0, 45.0, "35-44"),
            NumericRange::bounded(45.0, 55.0, "45-54"),
            NumericRange::new(Some(55.0), None, "55+"),
        ],
    )
    .unwrap()
}

pub fn standard_context() -> PivotContext {
    PivotContext::new(MetricRegistry::standard())
        .with_rule(age_rule())
        .unwrap()
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Assert that two floats agree to within 1e-9.
pub fn assert_close(actual: Option<f64>, expected: f64) {
    match actual {
        Some(v) => assert!((v - expected).abs() < 1e-9, "expected {}, got {}", expected, v),
        None => panic!("expected {}, got null", expected),
    }
}

/// Sum of one metric over every emitted cell.
pub fn sum_cells(result: &PivotResult, metric: &str) -> f64 {
    let m = result.metric_index(metric).unwrap();
    result.cells().filter_map(|(_, _, values)| values[m]).sum()
}
