use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stored row, independent of any particular collection's shape.
///
/// `data` holds the text fields and `vectors` the embedding fields, both
/// keyed by field name. A vector field missing from `vectors` is stored as
/// NULL and the row is skipped by searches over that field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    pub key: u64,
    pub data: BTreeMap<String, String>,
    pub vectors: BTreeMap<String, Vec<f32>>,
}

impl Record {
    pub fn new(key: u64) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    pub fn with_data(mut self, field: &str, value: impl Into<String>) -> Self {
        self.data.insert(field.to_string(), value.into());
        self
    }

    pub fn with_vector(mut self, field: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(field.to_string(), vector);
        self
    }
}

/// A search hit. `score` is the distance to the query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: Record,
    pub score: f32,
}
