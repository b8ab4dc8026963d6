//! Ingestion subsystem: embeds catalog descriptions and upserts the movies
//!
//! Records are processed one at a time, in catalog order. The first
//! embedding or store failure stops the run; movies upserted before it stay
//! in the store.

use cinevec_core::{Collection, EmbeddingBackend, MovieRecord, Record, RecordStore};

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Keys upserted, in the order they were written.
    pub keys: Vec<u64>,
}

/// Embed every movie's description and upsert it by key.
///
/// `on_progress` is called with each movie just before it is written.
pub async fn ingest_catalog(
    catalog: &[MovieRecord],
    backend: &dyn EmbeddingBackend,
    store: &dyn RecordStore,
    collection: &Collection,
    mut on_progress: impl FnMut(&MovieRecord) + Send,
) -> Result<IngestReport, PipelineError> {
    let mut report = IngestReport::default();

    for movie in catalog {
        let vector = backend
            .embed(&movie.description)
            .await
            .map_err(|source| PipelineError::EmbedRecord {
                key: movie.key,
                source,
            })?;

        let enriched = MovieRecord {
            vector: Some(vector),
            ..movie.clone()
        };

        on_progress(&enriched);
        tracing::info!(key = movie.key, title = %movie.title, backend = backend.name(), "Upserting movie");

        store
            .upsert(collection, &Record::from(enriched))
            .await
            .map_err(|source| PipelineError::Upsert {
                key: movie.key,
                source,
            })?;

        report.keys.push(movie.key);
    }

    tracing::info!(count = report.keys.len(), store = store.name(), "Ingestion complete");
    Ok(report)
}
