use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pivot_engine::{compute_pivot, MetricRegistry, PivotContext, PivotSpec};
use segment_engine::{
    bucket_preset, BucketRule, DateGranularity, Dataset, DimensionCatalog, DimensionDef,
    DimensionType, Filter, Record, Schema,
};

const DEVICES: &[&str] = &["Mobile", "Desktop", "Tablet"];
const COUNTRIES: &[&str] = &["US", "UK", "DE", "FR", "CA", "AU"];
const TIERS: &[&str] = &["Bronze", "Silver", "Gold", "Platinum"];

fn build_dataset(rows: usize) -> Dataset {
    let schema = Schema::new(vec![
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
    .unwrap();
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();

    // Deterministic spread: every 50th user has no age.
    let records = (0..rows)
        .map(|i| {
            let age = if i % 50 == 0 { None } else { Some(18 + (i * 7) % 62) };
            let orders = (i * 13) % 40;
            Record::new()
                .with("age", age.map(|a| a as i64))
                .with("ltv", ((i * 37) % 5000) as f64)
                .with("total_revenue", (orders * 45 + i % 90) as f64)
                .with("total_orders", orders as i64)
                .with("is_retained", i % 3 != 0)
                .with("device_type", DEVICES[i % DEVICES.len()])
                .with("country", COUNTRIES[(i / 7) % COUNTRIES.len()])
                .with("loyalty_tier", TIERS[(i / 11) % TIERS.len()])
                .with("signup_date", start + Duration::days((i % 1000) as i64))
        })
        .collect();
    Dataset::load(records, schema).unwrap()
}

fn bench_pivot(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_pivot");

    for rows in [10_000usize, 100_000] {
        let dataset = build_dataset(rows);
        let catalog = DimensionCatalog::from_schema(dataset.schema());
        let context = PivotContext::new(MetricRegistry::standard())
            .with_rule(bucket_preset(&dataset, "age", "Fine Grained").unwrap())
            .unwrap()
            .with_rule(BucketRule::date_granularity("signup_date", DateGranularity::Quarter).unwrap())
            .unwrap();
        let spec = PivotSpec::new(["age", "device_type"], ["signup_date"])
            .metric("Count")
            .metric("Avg LTV")
            .metric("Avg AOV");

        group.throughput(Throughput::Elements(rows as u64));

        group.bench_with_input(BenchmarkId::new("unfiltered", rows), &rows, |b, _| {
            b.iter(|| compute_pivot(black_box(&dataset), &context, &spec).unwrap())
        });

        let filtered = context.clone().with_filter(
            Filter::parse("country in ('US', 'UK') AND total_orders > 5", &catalog).unwrap(),
        );
        group.bench_with_input(BenchmarkId::new("filtered", rows), &rows, |b, _| {
            b.iter(|| compute_pivot(black_box(&dataset), &filtered, &spec).unwrap())
        });

        let dense = spec.clone().show_empty(true);
        group.bench_with_input(BenchmarkId::new("show_empty", rows), &rows, |b, _| {
            b.iter(|| compute_pivot(black_box(&dataset), &context, &dense).unwrap())
        });
    }

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let dataset = build_dataset(100_000);
    let catalog = DimensionCatalog::from_schema(dataset.schema());

    c.bench_function("filter_parse", |b| {
        b.iter(|| {
            Filter::parse(
                black_box("(age >= 18 AND age <= 35) OR loyalty_tier in ('Gold', 'Platinum')"),
                &catalog,
            )
            .unwrap()
        })
    });

    let filter = Filter::parse("age > 25 AND ltv < 3000 AND device_type != 'Tablet'", &catalog).unwrap();
    c.bench_function("filter_select_100k", |b| {
        b.iter(|| filter.select(black_box(&dataset)))
    });
}

criterion_group!(benches, bench_pivot, bench_filter);
criterion_main!(benches);
