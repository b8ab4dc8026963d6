use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::record::{Record, ScoredRecord};
use crate::models::schema::{CollectionSchema, DistanceFunction, FieldDescriptor};

pub const KEY_FIELD: &str = "key";
pub const TITLE_FIELD: &str = "title";
pub const DESCRIPTION_FIELD: &str = "description";
pub const VECTOR_FIELD: &str = "vector";

/// A movie as it moves through the demo: built by the catalog without a
/// vector, given one during ingestion, read back from the store on search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub key: u64,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

impl MovieRecord {
    pub fn new(key: u64, title: &str, description: &str) -> Self {
        Self {
            key,
            title: title.to_string(),
            description: description.to_string(),
            vector: None,
        }
    }

    /// Schema for a movies collection with `dimensions`-long embeddings.
    pub fn schema(dimensions: usize) -> CollectionSchema {
        CollectionSchema::new(vec![
            FieldDescriptor::key(KEY_FIELD),
            FieldDescriptor::data(TITLE_FIELD),
            FieldDescriptor::data(DESCRIPTION_FIELD),
            FieldDescriptor::vector(VECTOR_FIELD, dimensions, DistanceFunction::EuclideanDistance),
        ])
    }
}

impl From<MovieRecord> for Record {
    fn from(movie: MovieRecord) -> Self {
        let record = Record::new(movie.key)
            .with_data(TITLE_FIELD, movie.title)
            .with_data(DESCRIPTION_FIELD, movie.description);
        match movie.vector {
            Some(v) => record.with_vector(VECTOR_FIELD, v),
            None => record,
        }
    }
}

impl TryFrom<Record> for MovieRecord {
    type Error = StoreError;

    fn try_from(mut record: Record) -> Result<Self, Self::Error> {
        let mut take = |field: &str| {
            record.data.remove(field).ok_or_else(|| {
                StoreError::InvalidRecord(format!("record {} has no '{field}' field", record.key))
            })
        };
        let title = take(TITLE_FIELD)?;
        let description = take(DESCRIPTION_FIELD)?;

        Ok(Self {
            key: record.key,
            title,
            description,
            vector: record.vectors.remove(VECTOR_FIELD),
        })
    }
}

/// One nearest-neighbour hit. `score` is the distance; lower is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub record: MovieRecord,
    pub score: f32,
}

impl TryFrom<ScoredRecord> for QueryResult {
    type Error = StoreError;

    fn try_from(scored: ScoredRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            record: MovieRecord::try_from(scored.record)?,
            score: scored.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_converts_to_record_and_back() {
        let mut movie = MovieRecord::new(7, "Shrek", "An ogre and a dragon");
        movie.vector = Some(vec![0.5, 0.25]);

        let record = Record::from(movie.clone());
        assert_eq!(record.key, 7);
        assert_eq!(record.data.get(TITLE_FIELD).map(String::as_str), Some("Shrek"));
        assert_eq!(record.vectors.get(VECTOR_FIELD), Some(&vec![0.5, 0.25]));

        let back = MovieRecord::try_from(record).unwrap();
        assert_eq!(back, movie);
    }

    #[test]
    fn test_movie_without_vector_has_no_vector_field() {
        let record = Record::from(MovieRecord::new(1, "Inception", "Dreams"));
        assert!(record.vectors.is_empty());
    }

    #[test]
    fn test_record_missing_title_is_rejected() {
        let record = Record::new(3).with_data(DESCRIPTION_FIELD, "no title here");
        match MovieRecord::try_from(record) {
            Err(StoreError::InvalidRecord(msg)) => assert!(msg.contains("title"), "msg: {msg}"),
            other => panic!("Expected InvalidRecord, got: {other:?}"),
        }
    }

    #[test]
    fn test_schema_is_valid_for_embedding_dimension() {
        let schema = MovieRecord::schema(384);
        assert!(schema.validate().is_ok());
        assert_eq!(
            schema.vector_spec(VECTOR_FIELD),
            Some((384, DistanceFunction::EuclideanDistance))
        );
    }
}
