//! FILENAME: segment-engine/src/dataset.rs
//! PURPOSE: Immutable, type-checked table of user records.
//! CONTEXT: Records arrive as name -> value maps. Loading validates each
//! present value against the schema and stores rows column-aligned, with
//! omitted fields as `Value::Missing`. A dataset is never mutated after
//! loading; regenerating data produces a new dataset with a new id.

use crate::error::{SegmentError, SegmentResult};
use crate::schema::Schema;
use crate::value::Value;
use log::debug;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Content fingerprint of a dataset, used as a memoization key.
pub type DatasetId = u64;

/// One user record: dimension name -> value. Omitted fields are missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

/// Validated records stored as rows aligned to the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    id: DatasetId,
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Validates and loads records. Fails on the first field that is not in
    /// the schema or whose value does not fit the declared type.
    pub fn load(records: Vec<Record>, schema: Schema) -> SegmentResult<Self> {
        let width = schema.len();
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            let mut row = vec![Value::Missing; width];
            for (name, value) in record.fields {
                let index = schema
                    .index_of(&name)
                    .ok_or_else(|| SegmentError::unknown_dimension(&name))?;
                let declared = schema.dimensions()[index].dimension_type;
                if let Some(found) = value.value_type() {
                    if found != declared {
                        return Err(SegmentError::TypeMismatch {
                            dimension: name,
                            expected: declared.name().to_string(),
                            found: found.name().to_string(),
                            position: None,
                        });
                    }
                }
                row[index] = value;
            }
            rows.push(row);
        }

        let id = fingerprint(&schema, &rows);
        debug!(target: "DATASET", "Loaded dataset {:016x}: {} rows x {} dimensions", id, rows.len(), width);
        Ok(Dataset { id, schema, rows })
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Values of one dimension, in row order.
    pub fn column(&self, name: &str) -> SegmentResult<impl Iterator<Item = &Value> + '_> {
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| SegmentError::unknown_dimension(name))?;
        Ok(self.rows.iter().map(move |row| &row[index]))
    }
}

fn fingerprint(schema: &Schema, rows: &[Vec<Value>]) -> DatasetId {
    let mut hasher = FxHasher::default();
    schema.fingerprint().hash(&mut hasher);
    rows.len().hash(&mut hasher);
    for row in rows {
        for value in row {
            value.key().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Loads records into a shareable, immutable dataset.
pub fn load_dataset(records: Vec<Record>, schema: Schema) -> SegmentResult<Arc<Dataset>> {
    Dataset::load(records, schema).map(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DimensionDef;
    use crate::value::DimensionType;

    fn schema() -> Schema {
        Schema::new(vec![
            DimensionDef::new("age", DimensionType::Numeric),
            DimensionDef::new("country", DimensionType::Categorical),
        ])
        .unwrap()
    }

    #[test]
    fn omitted_fields_load_as_missing() {
        let ds = Dataset::load(vec![Record::new().with("age", 30)], schema()).unwrap();
        assert_eq!(ds.row(0).unwrap(), &[Value::Number(30.0), Value::Missing]);
    }

    #[test]
    fn number_in_categorical_column_is_a_type_mismatch() {
        let err = Dataset::load(vec![Record::new().with("country", 5)], schema()).unwrap_err();
        match err {
            SegmentError::TypeMismatch {
                dimension,
                expected,
                found,
                ..
            } => {
                assert_eq!(dimension, "country");
                assert_eq!(expected, "categorical");
                assert_eq!(found, "numeric");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = Dataset::load(vec![Record::new().with("height", 180)], schema()).unwrap_err();
        assert!(matches!(err, SegmentError::UnknownDimension { ref name, .. } if name == "height"));
    }

    #[test]
    fn id_tracks_content() {
        let a = Dataset::load(vec![Record::new().with("age", 30)], schema()).unwrap();
        let b = Dataset::load(vec![Record::new().with("age", 30)], schema()).unwrap();
        let c = Dataset::load(vec![Record::new().with("age", 31)], schema()).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn column_reads_one_dimension() {
        let ds = Dataset::load(
            vec![
                Record::new().with("country", "US"),
                Record::new().with("country", "DE"),
            ],
            schema(),
        )
        .unwrap();
        let labels: Vec<String> = ds.column("country").unwrap().map(Value::label).collect();
        assert_eq!(labels, vec!["US", "DE"]);
        assert!(ds.column("nope").is_err());
    }
}
