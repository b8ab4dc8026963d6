use cinevec_core::{EmbeddingError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to embed movie {key}: {source}")]
    EmbedRecord { key: u64, source: EmbeddingError },

    #[error("Failed to upsert movie {key}: {source}")]
    Upsert { key: u64, source: StoreError },

    #[error("Failed to embed query: {0}")]
    EmbedQuery(#[source] EmbeddingError),

    #[error("Vector search failed: {0}")]
    Search(#[source] StoreError),
}
