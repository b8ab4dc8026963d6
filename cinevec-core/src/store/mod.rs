//! Record store: keyed records with vector fields, grouped in collections
//!
//! The `RecordStore` trait is the only thing the pipelines see. Two
//! backends implement it:
//! - **SQLite**: a local database file, created on first open. Vectors are
//!   little-endian `f32` blobs ranked by the sqlite-vec extension.
//! - **PostgreSQL**: pgvector `vector(D)` columns ordered by `<->` / `<=>`.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Collection, DistanceFunction, Record, ScoredRecord};

pub mod postgres;
pub mod sqlite;

pub use postgres::PgVectorStore;
pub use sqlite::SqliteVectorStore;

/// Options for a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchOptions {
    /// Maximum number of results.
    pub top: usize,
    /// Vector field to search.
    pub vector_field: String,
    /// Overrides the distance function declared in the schema.
    pub distance: Option<DistanceFunction>,
}

impl VectorSearchOptions {
    pub fn new(top: usize, vector_field: &str) -> Self {
        Self {
            top,
            vector_field: vector_field.to_string(),
            distance: None,
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the collection's backing table if it does not exist yet.
    async fn ensure_collection(&self, collection: &Collection) -> Result<(), StoreError>;

    /// Insert `record`, or fully replace the record with the same key.
    async fn upsert(&self, collection: &Collection, record: &Record) -> Result<(), StoreError>;

    async fn get(&self, collection: &Collection, key: u64) -> Result<Option<Record>, StoreError>;

    async fn count(&self, collection: &Collection) -> Result<usize, StoreError>;

    /// The `options.top` records nearest to `query`, best match first.
    ///
    /// Ties on distance are broken by ascending key. Records with no vector
    /// in the searched field are skipped.
    async fn vector_search(
        &self,
        collection: &Collection,
        query: &[f32],
        options: &VectorSearchOptions,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Release the underlying connections.
    async fn close(&self);

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Check `record` carries exactly the collection's fields with the right
/// vector lengths. Vector fields may be absent.
pub(crate) fn validate_record(collection: &Collection, record: &Record) -> Result<(), StoreError> {
    let schema = collection.schema();

    for field in schema.data_fields() {
        if !record.data.contains_key(&field.name) {
            return Err(StoreError::InvalidRecord(format!(
                "record {} is missing data field '{}'",
                record.key, field.name
            )));
        }
    }
    if let Some(extra) = record
        .data
        .keys()
        .find(|name| !schema.data_fields().any(|f| &f.name == *name))
    {
        return Err(StoreError::InvalidRecord(format!(
            "record {} has unknown data field '{extra}'",
            record.key
        )));
    }

    for (name, vector) in &record.vectors {
        let (dimensions, _) =
            schema
                .vector_spec(name)
                .ok_or_else(|| StoreError::UnknownVectorField {
                    collection: collection.name().to_string(),
                    field: name.clone(),
                })?;
        if vector.len() != dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: dimensions,
                actual: vector.len(),
            });
        }
    }

    Ok(())
}

/// Resolve the searched field's distance function and check the query
/// vector matches its dimension.
pub(crate) fn resolve_search(
    collection: &Collection,
    query: &[f32],
    options: &VectorSearchOptions,
) -> Result<DistanceFunction, StoreError> {
    let (dimensions, declared) = collection
        .schema()
        .vector_spec(&options.vector_field)
        .ok_or_else(|| StoreError::UnknownVectorField {
            collection: collection.name().to_string(),
            field: options.vector_field.clone(),
        })?;

    if query.len() != dimensions {
        return Err(StoreError::DimensionMismatch {
            expected: dimensions,
            actual: query.len(),
        });
    }

    Ok(options.distance.unwrap_or(declared))
}

pub(crate) fn key_to_i64(key: u64) -> Result<i64, StoreError> {
    i64::try_from(key).map_err(|_| StoreError::KeyOutOfRange(key))
}

pub(crate) fn key_from_i64(key: i64) -> Result<u64, StoreError> {
    u64::try_from(key).map_err(|_| StoreError::InvalidRecord(format!("negative key {key} in store")))
}

/// Double-quote an identifier. Names are validated by `Collection::new`.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieRecord;

    fn collection() -> Collection {
        Collection::new("movies", MovieRecord::schema(2)).unwrap()
    }

    fn movie(key: u64) -> Record {
        Record::new(key)
            .with_data("title", "t")
            .with_data("description", "d")
    }

    #[test]
    fn test_validate_record_accepts_full_and_vectorless_records() {
        let c = collection();
        assert!(validate_record(&c, &movie(1)).is_ok());
        assert!(validate_record(&c, &movie(1).with_vector("vector", vec![0.0, 1.0])).is_ok());
    }

    #[test]
    fn test_validate_record_rejects_bad_shapes() {
        let c = collection();
        let missing = Record::new(1).with_data("title", "t");
        assert!(matches!(validate_record(&c, &missing), Err(StoreError::InvalidRecord(_))));

        let extra = movie(1).with_data("year", "1994");
        assert!(matches!(validate_record(&c, &extra), Err(StoreError::InvalidRecord(_))));

        let wrong_dims = movie(1).with_vector("vector", vec![1.0]);
        assert!(matches!(
            validate_record(&c, &wrong_dims),
            Err(StoreError::DimensionMismatch { expected: 2, actual: 1 })
        ));

        let unknown = movie(1).with_vector("other", vec![1.0, 2.0]);
        assert!(matches!(
            validate_record(&c, &unknown),
            Err(StoreError::UnknownVectorField { .. })
        ));
    }

    #[test]
    fn test_resolve_search_checks_field_and_dimension() {
        let c = collection();
        let options = VectorSearchOptions::new(2, "vector");
        assert_eq!(
            resolve_search(&c, &[0.0, 0.0], &options).unwrap(),
            DistanceFunction::EuclideanDistance
        );
        assert!(matches!(
            resolve_search(&c, &[0.0; 3], &options),
            Err(StoreError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(resolve_search(&c, &[0.0, 0.0], &VectorSearchOptions::new(2, "nope")).is_err());

        let mut cosine = options.clone();
        cosine.distance = Some(DistanceFunction::CosineDistance);
        assert_eq!(
            resolve_search(&c, &[0.0, 0.0], &cosine).unwrap(),
            DistanceFunction::CosineDistance
        );
    }

    #[test]
    fn test_key_conversion_bounds() {
        assert_eq!(key_to_i64(5).unwrap(), 5);
        assert!(matches!(key_to_i64(u64::MAX), Err(StoreError::KeyOutOfRange(_))));
        assert!(key_from_i64(-1).is_err());
    }
}
