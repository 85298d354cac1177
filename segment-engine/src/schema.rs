//! FILENAME: segment-engine/src/schema.rs
//! PURPOSE: The ordered list of typed dimensions a dataset is declared with.

use crate::error::{SegmentError, SegmentResult};
use crate::value::DimensionType;
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A named, typed dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionDef {
    pub name: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
}

impl DimensionDef {
    pub fn new(name: impl Into<String>, dimension_type: DimensionType) -> Self {
        DimensionDef {
            name: name.into(),
            dimension_type,
        }
    }
}

/// Ordered dimensions with unique names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DimensionDef>", into = "Vec<DimensionDef>")]
pub struct Schema {
    dimensions: Vec<DimensionDef>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

impl Schema {
    /// Validates names (non-empty, unique) and builds the name index.
    pub fn new(dimensions: Vec<DimensionDef>) -> SegmentResult<Self> {
        let mut index = FxHashMap::default();
        for (i, dim) in dimensions.iter().enumerate() {
            if dim.name.trim().is_empty() {
                return Err(SegmentError::config(format!(
                    "Dimension #{} has an empty name",
                    i + 1
                )));
            }
            if index.insert(dim.name.clone(), i).is_some() {
                return Err(SegmentError::config_for(
                    &dim.name,
                    format!("Duplicate dimension name '{}'", dim.name),
                ));
            }
        }
        Ok(Schema { dimensions, index })
    }

    pub fn dimensions(&self) -> &[DimensionDef] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&DimensionDef> {
        self.index_of(name).map(|i| &self.dimensions[i])
    }

    /// Stable hash of names and types, in order.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.dimensions.hash(&mut hasher);
        hasher.finish()
    }
}

impl TryFrom<Vec<DimensionDef>> for Schema {
    type Error = SegmentError;

    fn try_from(dimensions: Vec<DimensionDef>) -> SegmentResult<Self> {
        Schema::new(dimensions)
    }
}

impl From<Schema> for Vec<DimensionDef> {
    fn from(schema: Schema) -> Self {
        schema.dimensions
    }
}
