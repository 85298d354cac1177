//! FILENAME: segment-engine/src/audience.rs
//! PURPOSE: Named audience segments expressed as filter text.
//! CONTEXT: Audiences compile through the same parser and type checker as
//! user-typed filters, so a preset naming a dimension the dataset lacks
//! fails with `UnknownDimension` like any other filter.

use crate::catalog::DimensionCatalog;
use crate::error::{SegmentError, SegmentResult};
use crate::filter::Filter;

/// (name, filter text). Empty text selects every user.
pub const AUDIENCES: &[(&str, &str)] = &[
    ("All Users", ""),
    ("High Value Customers", "ltv > 1000"),
    ("Recent Signups", "days_since_signup < 30"),
    ("Churned Users", "is_churned = TRUE"),
    ("Mobile Users", "device_type = 'Mobile'"),
    ("Email Subscribers", "email_subscriber = TRUE"),
    ("High AOV Customers", "average_order_value > 100"),
    ("Frequent Buyers", "total_orders > 10"),
    ("Gold+ Members", "loyalty_tier in ('Gold', 'Platinum')"),
    ("At-Risk Customers", "churn_risk_score > 0.7"),
    ("Social Followers", "social_media_follower = TRUE"),
    ("High Engagement", "website_visits_l30d > 10"),
    ("Recent Purchasers", "days_since_last_purchase < 30"),
    ("High NPS", "nps_score > 8"),
    ("Fashion Lovers", "product_category_preference = 'Fashion'"),
    ("Price Sensitive", "price_sensitivity = 'High'"),
    ("Young Adults", "age >= 18 AND age <= 35"),
    ("US Customers", "country = 'US'"),
    ("New Customers", "total_orders <= 2"),
    ("VIP Customers", "loyalty_tier = 'Platinum'"),
];

pub fn audience_names() -> Vec<&'static str> {
    AUDIENCES.iter().map(|(name, _)| *name).collect()
}

/// Filter text of a named audience.
pub fn audience_text(name: &str) -> Option<&'static str> {
    AUDIENCES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, text)| *text)
}

/// Compiles a named audience against the catalog.
pub fn audience_filter(name: &str, catalog: &DimensionCatalog) -> SegmentResult<Filter> {
    let text = audience_text(name)
        .ok_or_else(|| SegmentError::config(format!("Unknown audience '{}'", name)))?;
    Filter::parse(text, catalog)
}
