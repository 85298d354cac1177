//! FILENAME: segment-engine/src/catalog.rs
//! PURPOSE: Dimension Catalog - names, types and legal filter operators.
//! CONTEXT: Built once from a dataset schema and shared read-only by the
//! bucket rule engine, the filter type checker and the pivot aggregator.
//! The rendering layer only ever submits names it got from `list()`.

use crate::error::{SegmentError, SegmentResult};
use crate::schema::Schema;
use crate::value::DimensionType;
use filter_parser::ComparisonOperator;
use serde::Serialize;

const NUMERIC_OPERATORS: &[ComparisonOperator] = &[
    ComparisonOperator::Equal,
    ComparisonOperator::NotEqual,
    ComparisonOperator::GreaterThan,
    ComparisonOperator::GreaterEqual,
    ComparisonOperator::LessThan,
    ComparisonOperator::LessEqual,
    ComparisonOperator::In,
];

const CATEGORICAL_OPERATORS: &[ComparisonOperator] = &[
    ComparisonOperator::Equal,
    ComparisonOperator::NotEqual,
    ComparisonOperator::Contains,
    ComparisonOperator::In,
];

const BOOLEAN_OPERATORS: &[ComparisonOperator] =
    &[ComparisonOperator::Equal, ComparisonOperator::NotEqual];

/// Operators a filter may apply to a dimension of the given type.
pub fn allowed_operators(dimension_type: DimensionType) -> &'static [ComparisonOperator] {
    match dimension_type {
        DimensionType::Numeric | DimensionType::Date => NUMERIC_OPERATORS,
        DimensionType::Categorical => CATEGORICAL_OPERATORS,
        DimensionType::Boolean => BOOLEAN_OPERATORS,
    }
}

/// What the catalog knows about one dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionInfo {
    pub name: String,
    pub dimension_type: DimensionType,
    #[serde(serialize_with = "serialize_operators")]
    pub allowed_operators: &'static [ComparisonOperator],
    /// Column position in dataset rows.
    #[serde(skip)]
    pub index: usize,
}

fn serialize_operators<S: serde::Serializer>(
    operators: &&'static [ComparisonOperator],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(operators.iter().map(|op| op.symbol()))
}

/// Read-only registry of the dataset's dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionCatalog {
    schema: Schema,
}

impl DimensionCatalog {
    pub fn from_schema(schema: &Schema) -> Self {
        DimensionCatalog {
            schema: schema.clone(),
        }
    }

    pub fn describe(&self, name: &str) -> SegmentResult<DimensionInfo> {
        let index = self.index_of(name)?;
        let dimension_type = self.schema.dimensions()[index].dimension_type;
        Ok(DimensionInfo {
            name: name.to_string(),
            dimension_type,
            allowed_operators: allowed_operators(dimension_type),
            index,
        })
    }

    /// Dimension names in schema order.
    pub fn list(&self) -> Vec<&str> {
        self.schema
            .dimensions()
            .iter()
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Names of the dimensions of one type, in schema order.
    pub fn list_of_type(&self, dimension_type: DimensionType) -> Vec<&str> {
        self.schema
            .dimensions()
            .iter()
            .filter(|d| d.dimension_type == dimension_type)
            .map(|d| d.name.as_str())
            .collect()
    }

    pub fn index_of(&self, name: &str) -> SegmentResult<usize> {
        self.schema
            .index_of(name)
            .ok_or_else(|| SegmentError::unknown_dimension(name))
    }

    pub fn dimension_type(&self, name: &str) -> SegmentResult<DimensionType> {
        let index = self.index_of(name)?;
        Ok(self.schema.dimensions()[index].dimension_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schema.index_of(name).is_some()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DimensionDef;

    fn catalog() -> DimensionCatalog {
        let schema = Schema::new(vec![
            DimensionDef::new("age", DimensionType::Numeric),
            DimensionDef::new("country", DimensionType::Categorical),
            DimensionDef::new("signup_date", DimensionType::Date),
            DimensionDef::new("is_churned", DimensionType::Boolean),
        ])
        .unwrap();
        DimensionCatalog::from_schema(&schema)
    }

    #[test]
    fn lists_in_schema_order() {
        assert_eq!(
            catalog().list(),
            vec!["age", "country", "signup_date", "is_churned"]
        );
    }

    #[test]
    fn describes_operators_by_type() {
        let c = catalog();
        let age = c.describe("age").unwrap();
        assert_eq!(age.dimension_type, DimensionType::Numeric);
        assert!(!age.allowed_operators.contains(&ComparisonOperator::Contains));

        let country = c.describe("country").unwrap();
        assert!(country.allowed_operators.contains(&ComparisonOperator::Contains));
        assert!(!country.allowed_operators.contains(&ComparisonOperator::GreaterThan));

        let churned = c.describe("is_churned").unwrap();
        assert_eq!(churned.allowed_operators.len(), 2);
        assert_eq!(churned.index, 3);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = catalog().describe("height").unwrap_err();
        assert_eq!(err, SegmentError::unknown_dimension("height"));
    }

    #[test]
    fn info_serializes_operator_symbols() {
        let json = serde_json::to_value(catalog().describe("is_churned").unwrap()).unwrap();
        assert_eq!(json["dimensionType"], "boolean");
        assert_eq!(json["allowedOperators"], serde_json::json!(["=", "!="]));
    }
}
