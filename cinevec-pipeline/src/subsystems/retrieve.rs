//! Retrieval subsystem: nearest-neighbour search over embedded movies
//!
//! - Embeds the query text with the same backend used for ingestion
//! - Asks the store for the `top_k` closest vectors
//! - Returns results best match first (ascending distance, key on ties)

use cinevec_core::models::movie::VECTOR_FIELD;
use cinevec_core::{
    Collection, EmbeddingBackend, QueryResult, RecordStore, StoreError, VectorSearchOptions,
};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub top_k: usize,
    pub vector_field: String,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 2,
            vector_field: VECTOR_FIELD.to_string(),
        }
    }
}

/// Search movies semantically similar to `query`.
///
/// # Constraints
/// * `top_k == 0` returns no results without calling the embedding backend
/// * The query text is embedded exactly as given
/// * At most `top_k` results; fewer when the store holds fewer movies
/// * Read-only: the store is never modified
pub async fn search_movies(
    query: &str,
    backend: &dyn EmbeddingBackend,
    store: &dyn RecordStore,
    collection: &Collection,
    options: &QueryOptions,
) -> Result<Vec<QueryResult>, PipelineError> {
    if options.top_k == 0 {
        tracing::debug!("top_k is 0, skipping search");
        return Ok(Vec::new());
    }

    let query_vector = backend.embed(query).await.map_err(PipelineError::EmbedQuery)?;

    let search = VectorSearchOptions::new(options.top_k, &options.vector_field);
    let hits = store
        .vector_search(collection, &query_vector, &search)
        .await
        .map_err(PipelineError::Search)?;

    let results = hits
        .into_iter()
        .map(QueryResult::try_from)
        .collect::<Result<Vec<_>, StoreError>>()
        .map_err(PipelineError::Search)?;

    tracing::info!(query = %query, results = results.len(), "Search complete");
    Ok(results)
}
