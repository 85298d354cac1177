//! FILENAME: pivot-engine/src/lib.rs
//! Pivot subsystem for segment analysis.
//!
//! This crate groups the records of a `segment_engine::Dataset` along row
//! and column dimensions and evaluates named metrics per group. It depends on
//! `segment-engine` for the catalog, bucket rules and filters.
//!
//! Layers:
//! - `definition`: Serializable configuration (what the pivot IS)
//! - `metrics`: Metric registry and evaluation plans (WHAT we compute)
//! - `engine`: Calculation engine (HOW we group)
//! - `view`: Results, value grids and comparisons (WHAT we display)
//! - `insights`: Per-segment and per-period field distributions
//! - `session`: Per-user state with latest-wins recomputation

pub mod definition;
pub mod engine;
pub mod insights;
pub mod metrics;
pub mod session;
pub mod view;

pub use definition::*;
pub use engine::{axis_label, compute_pivot, validate_spec, PivotCalculator, ALL_LABEL, LABEL_SEPARATOR};
pub use insights::{period_metrics, segment_insights, FieldSummary, PeriodMetrics, SegmentInsight};
pub use metrics::{GroupAccumulator, MetricPlan, MetricRegistry, MetricValues, COUNT_METRIC};
pub use session::{PivotOutcome, PivotRequest, Revision, Session, Submission, MEMO_CAPACITY};
pub use view::{compare, ComparisonCell, PivotComparison, PivotResult, ValueGrid};
