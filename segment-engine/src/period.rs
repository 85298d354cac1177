//! FILENAME: segment-engine/src/period.rs
//! PURPOSE: Trailing analysis periods (last 7, 30 or 90 days, all time).
//! CONTEXT: A period window keeps the rows whose date dimension falls on or
//! after `reference - days`. The reference date is supplied by the caller,
//! so filtering never reads the clock and stays reproducible.

use crate::catalog::DimensionCatalog;
use crate::error::{SegmentError, SegmentResult};
use crate::filter::Filter;
use crate::value::DimensionType;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A trailing window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnalysisPeriod {
    #[serde(rename = "L7D")]
    Last7Days,
    #[default]
    #[serde(rename = "L30D")]
    Last30Days,
    #[serde(rename = "L90D")]
    Last90Days,
    #[serde(rename = "All Time")]
    AllTime,
}

impl AnalysisPeriod {
    /// Every period, in menu order.
    pub const ALL: [AnalysisPeriod; 4] = [
        AnalysisPeriod::Last30Days,
        AnalysisPeriod::Last7Days,
        AnalysisPeriod::Last90Days,
        AnalysisPeriod::AllTime,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisPeriod::Last7Days => "L7D",
            AnalysisPeriod::Last30Days => "L30D",
            AnalysisPeriod::Last90Days => "L90D",
            AnalysisPeriod::AllTime => "All Time",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        AnalysisPeriod::ALL.into_iter().find(|p| p.label() == label)
    }

    /// Window length in days; `None` for all time.
    pub fn days(&self) -> Option<i64> {
        match self {
            AnalysisPeriod::Last7Days => Some(7),
            AnalysisPeriod::Last30Days => Some(30),
            AnalysisPeriod::Last90Days => Some(90),
            AnalysisPeriod::AllTime => None,
        }
    }

    /// First date inside the window ending at `reference`.
    pub fn cutoff(&self, reference: NaiveDate) -> Option<NaiveDate> {
        reference.checked_sub_signed(Duration::days(self.days()?))
    }
}

/// A period applied to one date dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodWindow {
    pub dimension: String,
    #[serde(default)]
    pub period: AnalysisPeriod,
    pub reference: NaiveDate,
}

impl PeriodWindow {
    pub fn new(dimension: impl Into<String>, period: AnalysisPeriod, reference: NaiveDate) -> Self {
        PeriodWindow {
            dimension: dimension.into(),
            period,
            reference,
        }
    }

    /// Compiles the window into a filter. The dimension must be a date.
    pub fn to_filter(&self, catalog: &DimensionCatalog) -> SegmentResult<Filter> {
        let found = catalog.dimension_type(&self.dimension)?;
        if found != DimensionType::Date {
            return Err(SegmentError::TypeMismatch {
                dimension: self.dimension.clone(),
                expected: DimensionType::Date.name().to_string(),
                found: found.name().to_string(),
                position: None,
            });
        }

        match self.period.cutoff(self.reference) {
            Some(cutoff) => Filter::parse(
                &format!("`{}` >= '{}'", self.dimension, cutoff.format("%Y-%m-%d")),
                catalog,
            ),
            None => Ok(Filter::all()),
        }
    }
}
