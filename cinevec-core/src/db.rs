use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::store::{PgVectorStore, RecordStore, SqliteVectorStore};

/// Open the configured record store.
///
/// The returned handle is the session both pipelines share; callers close
/// it with [`RecordStore::close`] once they are done.
pub async fn open_store(config: &StoreConfig) -> Result<Box<dyn RecordStore>, StoreError> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = config.resolved_db_path();
            let store = SqliteVectorStore::open(&path, config.max_connections).await?;
            Ok(Box::new(store))
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(StoreError::MissingDatabaseUrl)?;
            let store = PgVectorStore::connect(url, config.max_connections).await?;
            match store.pgvector_version().await {
                Ok(v) => tracing::info!(version = %v, "pgvector available"),
                Err(e) => tracing::warn!(error = %e, "Could not read pgvector version"),
            }
            Ok(Box::new(store))
        }
    }
}
