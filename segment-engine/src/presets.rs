//! FILENAME: segment-engine/src/presets.rs
//! PURPOSE: Named bucket presets for the standard user-analytics dimensions.
//! CONTEXT: The rendering layer offers these by name next to custom rules.
//! Integer dimensions (ages, day counts, order counts) use bounds shifted so
//! every label reads inclusively, e.g. "0-7 days" is `[0, 8)`.

use crate::bucket::{define_bucket_rule, BucketKind, BucketRule, DateGranularity, NumericRange};
use crate::catalog::DimensionCatalog;
use crate::dataset::Dataset;
use crate::error::{SegmentError, SegmentResult};

enum PresetShape {
    /// Range `i` is `[lowers[i], lowers[i + 1])`; the last range is open-ended.
    Ranges {
        lowers: &'static [f64],
        labels: &'static [&'static str],
    },
    Dates(DateGranularity),
    /// Quartile cut points computed from the dataset.
    Quartiles,
}

struct Preset {
    dimension: &'static str,
    name: &'static str,
    shape: PresetShape,
}

impl Preset {
    /// The rule definition, `None` for dataset-dependent quartiles.
    fn kind(&self) -> Option<BucketKind> {
        match &self.shape {
            PresetShape::Ranges { lowers, labels } => Some(BucketKind::NumericRange {
                ranges: lowers
                    .iter()
                    .zip(labels.iter())
                    .enumerate()
                    .map(|(i, (lower, label))| {
                        NumericRange::new(Some(*lower), lowers.get(i + 1).copied(), *label)
                    })
                    .collect(),
            }),
            PresetShape::Dates(granularity) => Some(BucketKind::DateGranularity {
                granularity: *granularity,
            }),
            PresetShape::Quartiles => None,
        }
    }
}

const QUARTILE_LABELS: &[&str] = &["Q1 (Bottom 25%)", "Q2", "Q3", "Q4 (Top 25%)"];

const PRESETS: &[Preset] = &[
    // age
    Preset {
        dimension: "age",
        name: "Young/Old",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 36.0],
            labels: &["Young (18-35)", "Mature (35+)"],
        },
    },
    Preset {
        dimension: "age",
        name: "Three Groups",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 26.0, 46.0],
            labels: &["18-25", "26-45", "46+"],
        },
    },
    Preset {
        dimension: "age",
        name: "Fine Grained",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 21.0, 26.0, 36.0, 51.0],
            labels: &["18-20", "21-25", "26-35", "36-50", "50+"],
        },
    },
    // days_since_signup
    Preset {
        dimension: "days_since_signup",
        name: "New/Established",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 91.0],
            labels: &["New (0-90 days)", "Established (90+ days)"],
        },
    },
    Preset {
        dimension: "days_since_signup",
        name: "Quarterly",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 91.0, 181.0, 366.0],
            labels: &["0-3 months", "3-6 months", "6-12 months", "1+ years"],
        },
    },
    Preset {
        dimension: "days_since_signup",
        name: "Monthly",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 31.0, 61.0, 91.0, 181.0, 366.0],
            labels: &[
                "0-1 month",
                "1-2 months",
                "2-3 months",
                "3-6 months",
                "6-12 months",
                "1+ years",
            ],
        },
    },
    // days_since_last_purchase
    Preset {
        dimension: "days_since_last_purchase",
        name: "Recent/Lapsed",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 31.0],
            labels: &["Recent (0-30 days)", "Lapsed (30+ days)"],
        },
    },
    Preset {
        dimension: "days_since_last_purchase",
        name: "Recency Groups",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 8.0, 31.0, 91.0],
            labels: &["0-7 days", "8-30 days", "31-90 days", "90+ days"],
        },
    },
    Preset {
        dimension: "days_since_last_purchase",
        name: "Weekly",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 8.0, 15.0, 22.0, 31.0, 61.0, 91.0],
            labels: &[
                "0-1 week",
                "1-2 weeks",
                "2-3 weeks",
                "3-4 weeks",
                "1-2 months",
                "2-3 months",
                "3+ months",
            ],
        },
    },
    // signup_date
    Preset {
        dimension: "signup_date",
        name: "By Year",
        shape: PresetShape::Dates(DateGranularity::Year),
    },
    Preset {
        dimension: "signup_date",
        name: "By Quarter",
        shape: PresetShape::Dates(DateGranularity::Quarter),
    },
    Preset {
        dimension: "signup_date",
        name: "By Month",
        shape: PresetShape::Dates(DateGranularity::Month),
    },
    Preset {
        dimension: "signup_date",
        name: "By Week",
        shape: PresetShape::Dates(DateGranularity::Week),
    },
    // total_revenue
    Preset {
        dimension: "total_revenue",
        name: "Low/Medium/High",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 100.0, 500.0],
            labels: &["Low (<$100)", "Medium ($100-500)", "High ($500+)"],
        },
    },
    Preset {
        dimension: "total_revenue",
        name: "Quartiles",
        shape: PresetShape::Quartiles,
    },
    Preset {
        dimension: "total_revenue",
        name: "Detailed",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 50.0, 100.0, 250.0, 500.0, 1000.0],
            labels: &["<$50", "$50-100", "$100-250", "$250-500", "$500-1000", "$1000+"],
        },
    },
    // ltv
    Preset {
        dimension: "ltv",
        name: "Low/Medium/High",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 200.0, 1000.0],
            labels: &["Low (<$200)", "Medium ($200-1000)", "High ($1000+)"],
        },
    },
    Preset {
        dimension: "ltv",
        name: "Quartiles",
        shape: PresetShape::Quartiles,
    },
    Preset {
        dimension: "ltv",
        name: "Detailed",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 100.0, 250.0, 500.0, 1000.0, 2000.0],
            labels: &["<$100", "$100-250", "$250-500", "$500-1000", "$1000-2000", "$2000+"],
        },
    },
    // total_orders
    Preset {
        dimension: "total_orders",
        name: "Low/Medium/High",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 3.0, 11.0],
            labels: &["Low (0-2)", "Medium (3-10)", "High (10+)"],
        },
    },
    Preset {
        dimension: "total_orders",
        name: "Detailed",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 2.0, 4.0, 6.0, 11.0, 21.0],
            labels: &["0-1", "2-3", "4-5", "6-10", "11-20", "20+"],
        },
    },
    // scores
    Preset {
        dimension: "churn_risk_score",
        name: "Risk Levels",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 0.3, 0.7],
            labels: &["Low Risk", "Medium Risk", "High Risk"],
        },
    },
    Preset {
        dimension: "nps_score",
        name: "NPS Categories",
        shape: PresetShape::Ranges {
            lowers: &[0.0, 7.0, 9.0],
            labels: &["Detractors (0-6)", "Passives (7-8)", "Promoters (9-10)"],
        },
    },
];

/// Preset names available for a dimension, in display order.
pub fn bucket_options(dimension: &str) -> Vec<&'static str> {
    PRESETS
        .iter()
        .filter(|p| p.dimension == dimension)
        .map(|p| p.name)
        .collect()
}

/// Builds the named preset rule for a dataset dimension.
pub fn bucket_preset(dataset: &Dataset, dimension: &str, name: &str) -> SegmentResult<BucketRule> {
    let preset = PRESETS
        .iter()
        .find(|p| p.dimension == dimension && p.name == name)
        .ok_or_else(|| {
            SegmentError::config_for(
                dimension,
                format!("No bucket preset '{}' for '{}'", name, dimension),
            )
        })?;

    let Some(kind) = preset.kind() else {
        return BucketRule::quantiles(dataset, dimension, QUARTILE_LABELS);
    };
    let catalog = DimensionCatalog::from_schema(dataset.schema());
    define_bucket_rule(&catalog, dimension, kind)
}
