//! Collection schema descriptors
//!
//! A collection is declared by listing its fields and the role each one
//! plays: exactly one key, any number of text data fields, and at least one
//! vector field carrying its dimension and distance function.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Distance between two embedding vectors. Lower is always more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFunction {
    #[default]
    EuclideanDistance,
    /// `1 - cosine_similarity`
    CosineDistance,
}

impl DistanceFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceFunction::EuclideanDistance => "euclidean_distance",
            DistanceFunction::CosineDistance => "cosine_distance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum FieldRole {
    Key,
    Data,
    Vector {
        dimensions: usize,
        distance: DistanceFunction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub role: FieldRole,
}

impl FieldDescriptor {
    pub fn key(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: FieldRole::Key,
        }
    }

    pub fn data(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: FieldRole::Data,
        }
    }

    pub fn vector(name: &str, dimensions: usize, distance: DistanceFunction) -> Self {
        Self {
            name: name.to_string(),
            role: FieldRole::Vector {
                dimensions,
                distance,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: Vec<FieldDescriptor>,
}

impl CollectionSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Check the schema is usable by a store.
    ///
    /// Field names double as SQL column names, so they must be plain
    /// identifiers. Exactly one key field and at least one vector field are
    /// required.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(StoreError::InvalidSchema(format!(
                    "field name '{}' is not a valid identifier",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(StoreError::InvalidSchema(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
            if let FieldRole::Vector { dimensions: 0, .. } = field.role {
                return Err(StoreError::InvalidSchema(format!(
                    "vector field '{}' has zero dimensions",
                    field.name
                )));
            }
        }

        let keys = self
            .fields
            .iter()
            .filter(|f| f.role == FieldRole::Key)
            .count();
        if keys != 1 {
            return Err(StoreError::InvalidSchema(format!(
                "expected exactly one key field, found {keys}"
            )));
        }

        if self.vector_fields().next().is_none() {
            return Err(StoreError::InvalidSchema(
                "at least one vector field is required".to_string(),
            ));
        }

        Ok(())
    }

    pub fn key_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.role == FieldRole::Key)
    }

    pub fn data_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.role == FieldRole::Data)
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| matches!(f.role, FieldRole::Vector { .. }))
    }

    /// Dimension and distance function of the named vector field.
    pub fn vector_spec(&self, name: &str) -> Option<(usize, DistanceFunction)> {
        self.fields.iter().find_map(|f| match f.role {
            FieldRole::Vector {
                dimensions,
                distance,
            } if f.name == name => Some((dimensions, distance)),
            _ => None,
        })
    }
}

/// A named collection together with its schema.
///
/// Construction validates both, so stores can splice the names into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    name: String,
    schema: CollectionSchema,
}

impl Collection {
    pub fn new(name: &str, schema: CollectionSchema) -> Result<Self, StoreError> {
        if !is_identifier(name) {
            return Err(StoreError::InvalidSchema(format!(
                "collection name '{name}' is not a valid identifier"
            )));
        }
        schema.validate()?;
        Ok(Self {
            name: name.to_string(),
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn key_name(&self) -> &str {
        // validate() guarantees a key field
        self.schema
            .key_field()
            .map(|f| f.name.as_str())
            .unwrap_or("key")
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
