//! FILENAME: segment-engine/src/lib.rs
//! PURPOSE: Main library entry point for the segmentation engine.
//! CONTEXT: Turns a flat table of typed user records into labelled, filtered
//! segments. The pivot engine builds on the catalog, bucket rules and filters
//! exported here.
//!
//! PIPELINE: Records --> Dataset --> Filter (row subset) --> BucketRule (label per value)
//!
//! Period windows (last 7/30/90 days) compile into ordinary filters.

pub mod audience;
pub mod bucket;
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod period;
pub mod presets;
pub mod schema;
pub mod value;

// Re-export commonly used types at the crate root
pub use audience::{audience_filter, audience_names, audience_text, AUDIENCES};
pub use bucket::{
    define_bucket_rule, quantile, Bucket, BucketKind, BucketOrder, BucketRule,
    BucketRuleDefinition, CategoryGroup, DateGranularity, NumericRange, MAX_EQUAL_WIDTH_BINS,
    OTHER_LABEL, UNSPECIFIED_LABEL,
};
pub use catalog::{allowed_operators, DimensionCatalog, DimensionInfo};
pub use dataset::{load_dataset, Dataset, DatasetId, Record};
pub use error::{SegmentError, SegmentResult};
pub use filter::{parse_filter, Filter};
pub use period::{AnalysisPeriod, PeriodWindow};
pub use presets::{bucket_options, bucket_preset};
pub use schema::{DimensionDef, Schema};
pub use value::{format_number, DimensionType, OrderedFloat, Value, ValueKey, MISSING_LABEL};
