//! SQLite record store
//!
//! One table per collection: the key as `INTEGER PRIMARY KEY`, data fields as
//! `TEXT`, vector fields as little-endian `f32` BLOBs (the float32 layout
//! sqlite-vec reads). Searches are ordered in SQL by sqlite-vec's
//! `vec_distance_l2` / `vec_distance_cosine`.

use std::os::raw::c_int;
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use libsqlite3_sys::{sqlite3_auto_extension, SQLITE_OK};
use sqlite_vec::sqlite3_vec_init;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::{
    key_from_i64, key_to_i64, quote, resolve_search, validate_record, RecordStore,
    VectorSearchOptions,
};
use crate::error::StoreError;
use crate::models::{Collection, DistanceFunction, FieldRole, Record, ScoredRecord};

static VEC_EXTENSION: OnceLock<c_int> = OnceLock::new();

/// Register sqlite-vec with every SQLite connection opened afterwards.
fn load_vec_extension() -> Result<(), StoreError> {
    let rc = *VEC_EXTENSION.get_or_init(|| unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())))
    });
    if rc != SQLITE_OK {
        return Err(StoreError::VectorExtension(format!(
            "sqlite3_auto_extension returned {rc}"
        )));
    }
    Ok(())
}

/// sqlite-vec scalar function for `function`.
fn sql_function(function: DistanceFunction) -> &'static str {
    match function {
        DistanceFunction::EuclideanDistance => "vec_distance_l2",
        DistanceFunction::CosineDistance => "vec_distance_cosine",
    }
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorStore").finish_non_exhaustive()
    }
}

impl SqliteVectorStore {
    /// Open the database file at `path`, creating it if absent.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        load_vec_extension()?;

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        let version = store.vec_version().await?;
        tracing::info!(path = %path.display(), sqlite_vec = %version, "Opened SQLite vector store");
        Ok(store)
    }

    /// Version of the loaded sqlite-vec extension.
    pub async fn vec_version(&self) -> Result<String, StoreError> {
        let (version,): (String,) = sqlx::query_as("SELECT vec_version()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::VectorExtension(e.to_string()))?;
        Ok(version)
    }

    /// Columns in schema order, key first.
    fn columns(collection: &Collection) -> Vec<&str> {
        let schema = collection.schema();
        std::iter::once(collection.key_name())
            .chain(schema.data_fields().map(|f| f.name.as_str()))
            .chain(schema.vector_fields().map(|f| f.name.as_str()))
            .collect()
    }

    fn select_list(collection: &Collection) -> String {
        Self::columns(collection)
            .into_iter()
            .map(quote)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn decode_row(collection: &Collection, row: &SqliteRow) -> Result<Record, StoreError> {
        let key = key_from_i64(row.try_get::<i64, _>(collection.key_name())?)?;
        let mut record = Record::new(key);

        for field in collection.schema().data_fields() {
            let value: String = row.try_get(field.name.as_str())?;
            record.data.insert(field.name.clone(), value);
        }
        for field in collection.schema().vector_fields() {
            let blob: Option<Vec<u8>> = row.try_get(field.name.as_str())?;
            if let Some(blob) = blob {
                record
                    .vectors
                    .insert(field.name.clone(), decode_vector(key, &blob)?);
            }
        }

        Ok(record)
    }
}

#[async_trait]
impl RecordStore for SqliteVectorStore {
    async fn ensure_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        let columns: Vec<String> = collection
            .schema()
            .fields
            .iter()
            .map(|field| match field.role {
                FieldRole::Key => format!("{} INTEGER PRIMARY KEY", quote(&field.name)),
                FieldRole::Data => format!("{} TEXT NOT NULL", quote(&field.name)),
                FieldRole::Vector { .. } => format!("{} BLOB", quote(&field.name)),
            })
            .collect();

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(collection.name()),
            columns.join(", ")
        );
        sqlx::query(&sql).execute(&self.pool).await?;

        tracing::debug!(collection = collection.name(), "Collection ready");
        Ok(())
    }

    async fn upsert(&self, collection: &Collection, record: &Record) -> Result<(), StoreError> {
        validate_record(collection, record)?;
        let key = key_to_i64(record.key)?;

        let columns = Self::columns(collection);
        let placeholders = vec!["?"; columns.len()].join(", ");
        // INSERT OR REPLACE deletes the old row first, so nothing survives
        // from a previous version of the record.
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote(collection.name()),
            Self::select_list(collection),
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(key);
        for field in collection.schema().data_fields() {
            query = query.bind(record.data.get(&field.name).cloned());
        }
        for field in collection.schema().vector_fields() {
            query = query.bind(record.vectors.get(&field.name).map(|v| encode_vector(v)));
        }
        query.execute(&self.pool).await?;

        Ok(())
    }

    async fn get(&self, collection: &Collection, key: u64) -> Result<Option<Record>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            Self::select_list(collection),
            quote(collection.name()),
            quote(collection.key_name())
        );

        let row = sqlx::query(&sql)
            .bind(key_to_i64(key)?)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::decode_row(collection, &r)).transpose()
    }

    async fn count(&self, collection: &Collection) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(collection.name()));
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as usize)
    }

    async fn vector_search(
        &self,
        collection: &Collection,
        query: &[f32],
        options: &VectorSearchOptions,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let function = resolve_search(collection, query, options)?;
        if options.top == 0 {
            return Ok(Vec::new());
        }

        // Distance is the column after the record's own columns
        let distance_column = Self::columns(collection).len();
        let sql = format!(
            "SELECT {select}, {func}({field}, ?1) FROM {table} \
             WHERE {field} IS NOT NULL \
             ORDER BY {func}({field}, ?1) ASC, {key} ASC \
             LIMIT ?2",
            select = Self::select_list(collection),
            func = sql_function(function),
            field = quote(&options.vector_field),
            table = quote(collection.name()),
            key = quote(collection.key_name()),
        );

        let rows = sqlx::query(&sql)
            .bind(encode_vector(query))
            .bind(i64::try_from(options.top).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let results = rows
            .iter()
            .map(|row| -> Result<ScoredRecord, StoreError> {
                // sqlite-vec yields NULL for an undefined cosine (zero vector)
                let distance: Option<f64> = row.try_get(distance_column)?;
                Ok(ScoredRecord {
                    record: Self::decode_row(collection, row)?,
                    score: distance.map_or(f32::NAN, |d| d as f32),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            collection = collection.name(),
            function = function.as_str(),
            results = results.len(),
            "Vector search complete"
        );
        Ok(results)
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(key: u64, blob: &[u8]) -> Result<Vec<f32>, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::CorruptVector {
            key,
            len: blob.len(),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionSchema, FieldDescriptor, MovieRecord};
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, SqliteVectorStore, Collection) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteVectorStore::open(&dir.path().join("movies.db"), 1)
            .await
            .expect("Failed to open store");
        let collection = Collection::new("movies", MovieRecord::schema(2)).unwrap();
        store.ensure_collection(&collection).await.unwrap();
        (dir, store, collection)
    }

    fn movie(key: u64, title: &str, vector: Option<Vec<f32>>) -> Record {
        let mut m = MovieRecord::new(key, title, &format!("{title} description"));
        m.vector = vector;
        Record::from(m)
    }

    #[test]
    fn test_vector_blob_layout_is_little_endian_f32() {
        let blob = encode_vector(&[1.0, -2.5]);
        assert_eq!(blob.len(), 8);
        assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_vector(0, &blob).unwrap(), vec![1.0, -2.5]);
        assert!(matches!(
            decode_vector(9, &blob[..5]),
            Err(StoreError::CorruptVector { key: 9, len: 5 })
        ));
    }

    #[tokio::test]
    async fn test_open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("movies.db");
        assert!(!path.exists());

        let store = SqliteVectorStore::open(&path, 1).await.unwrap();
        let collection = Collection::new("movies", MovieRecord::schema(2)).unwrap();
        store.ensure_collection(&collection).await.unwrap();
        // Idempotent
        store.ensure_collection(&collection).await.unwrap();
        store.close().await;

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let (_dir, store, collection) = open_store().await;

        store
            .upsert(&collection, &movie(0, "Lion King", Some(vec![1.0, 0.0])))
            .await
            .unwrap();
        store
            .upsert(&collection, &movie(0, "The Lion King", Some(vec![0.0, 1.0])))
            .await
            .unwrap();

        assert_eq!(store.count(&collection).await.unwrap(), 1);
        let stored = store.get(&collection, 0).await.unwrap().expect("record 0");
        assert_eq!(stored.data["title"], "The Lion King");
        assert_eq!(stored.vectors["vector"], vec![0.0, 1.0]);

        assert!(store.get(&collection, 42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replacing_with_vectorless_record_clears_vector() {
        let (_dir, store, collection) = open_store().await;

        store
            .upsert(&collection, &movie(1, "Inception", Some(vec![1.0, 1.0])))
            .await
            .unwrap();
        store
            .upsert(&collection, &movie(1, "Inception", None))
            .await
            .unwrap();

        let stored = store.get(&collection, 1).await.unwrap().unwrap();
        assert!(stored.vectors.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let (_dir, store, collection) = open_store().await;
        let result = store
            .upsert(&collection, &movie(0, "Lion King", Some(vec![1.0, 0.0, 0.0])))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert_eq!(store.count(&collection).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_orders_by_distance_with_key_tiebreak() {
        let (_dir, store, collection) = open_store().await;
        let rows = [
            (0, "a", vec![3.0, 4.0]),
            (1, "b", vec![1.0, 0.0]),
            (2, "c", vec![0.0, 1.0]),
            (3, "d", vec![10.0, 10.0]),
        ];
        // Insert out of key order to make sure ordering comes from the search
        for (key, title, v) in rows.iter().rev() {
            store
                .upsert(&collection, &movie(*key, title, Some(v.clone())))
                .await
                .unwrap();
        }

        let results = store
            .vector_search(&collection, &[0.0, 0.0], &VectorSearchOptions::new(3, "vector"))
            .await
            .unwrap();

        let keys: Vec<u64> = results.iter().map(|r| r.record.key).collect();
        assert_eq!(keys, vec![1, 2, 0]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[2].score - 5.0).abs() < 1e-6);
        assert_eq!(results[0].record.data["title"], "b");
    }

    #[tokio::test]
    async fn test_search_boundaries() {
        let (_dir, store, collection) = open_store().await;
        let options = |top| VectorSearchOptions::new(top, "vector");

        // Empty store
        let results = store
            .vector_search(&collection, &[0.0, 0.0], &options(5))
            .await
            .unwrap();
        assert!(results.is_empty());

        store
            .upsert(&collection, &movie(0, "a", Some(vec![0.0, 0.0])))
            .await
            .unwrap();
        store
            .upsert(&collection, &movie(1, "b", Some(vec![1.0, 1.0])))
            .await
            .unwrap();
        store
            .upsert(&collection, &movie(2, "no vector", None))
            .await
            .unwrap();

        let none = store
            .vector_search(&collection, &[0.0, 0.0], &options(0))
            .await
            .unwrap();
        assert!(none.is_empty());

        let all = store
            .vector_search(&collection, &[0.0, 0.0], &options(10))
            .await
            .unwrap();
        assert_eq!(all.len(), 2, "vectorless record must not be returned");
    }

    #[tokio::test]
    async fn test_search_rejects_query_dimension_mismatch() {
        let (_dir, store, collection) = open_store().await;
        let result = store
            .vector_search(&collection, &[0.0; 3], &VectorSearchOptions::new(1, "vector"))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_search_with_cosine_override() {
        let (_dir, store, collection) = open_store().await;
        store
            .upsert(&collection, &movie(0, "far but aligned", Some(vec![10.0, 0.0])))
            .await
            .unwrap();
        store
            .upsert(&collection, &movie(1, "near but skewed", Some(vec![0.5, 0.5])))
            .await
            .unwrap();

        let mut options = VectorSearchOptions::new(1, "vector");
        let euclid = store
            .vector_search(&collection, &[1.0, 0.0], &options)
            .await
            .unwrap();
        assert_eq!(euclid[0].record.key, 1);

        options.distance = Some(DistanceFunction::CosineDistance);
        let cosine = store
            .vector_search(&collection, &[1.0, 0.0], &options)
            .await
            .unwrap();
        assert_eq!(cosine[0].record.key, 0);
    }

    #[tokio::test]
    async fn test_data_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.db");
        let collection = Collection::new("movies", MovieRecord::schema(2)).unwrap();

        let store = SqliteVectorStore::open(&path, 1).await.unwrap();
        store.ensure_collection(&collection).await.unwrap();
        store
            .upsert(&collection, &movie(3, "Shrek", Some(vec![0.25, 0.75])))
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteVectorStore::open(&path, 1).await.unwrap();
        let stored = reopened.get(&collection, 3).await.unwrap().unwrap();
        assert_eq!(stored.vectors["vector"], vec![0.25, 0.75]);
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_vec_extension_is_loaded() {
        let (_dir, store, _) = open_store().await;
        let version = store.vec_version().await.unwrap();
        assert!(version.starts_with('v'), "unexpected sqlite-vec version: {version}");

        let (distance,): (f64,) = sqlx::query_as("SELECT vec_distance_l2(?1, ?2)")
            .bind(encode_vector(&[0.0, 0.0]))
            .bind(encode_vector(&[3.0, 4.0]))
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert!((distance - 5.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_with_data_field_named_distance() {
        let (_dir, store, _) = open_store().await;
        let schema = CollectionSchema::new(vec![
            FieldDescriptor::key("key"),
            FieldDescriptor::data("distance"),
            FieldDescriptor::vector("vector", 2, DistanceFunction::EuclideanDistance),
        ]);
        let trips = Collection::new("trips", schema).unwrap();
        store.ensure_collection(&trips).await.unwrap();

        for (key, label, v) in [(0, "far", [9.0, 9.0]), (1, "near", [1.0, 0.0])] {
            let record = Record::new(key)
                .with_data("distance", label)
                .with_vector("vector", v.to_vec());
            store.upsert(&trips, &record).await.unwrap();
        }

        let results = store
            .vector_search(&trips, &[0.0, 0.0], &VectorSearchOptions::new(2, "vector"))
            .await
            .unwrap();
        let keys: Vec<u64> = results.iter().map(|r| r.record.key).collect();
        assert_eq!(keys, vec![1, 0]);
        assert_eq!(results[0].record.data["distance"], "near");
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_fails_on_stored_vector_of_other_length() {
        let (_dir, store, collection) = open_store().await;
        // Bypass upsert validation to plant a 3-dim vector in a 2-dim field
        sqlx::query("INSERT INTO \"movies\" VALUES (?1, 'odd', 'odd', ?2)")
            .bind(7i64)
            .bind(encode_vector(&[1.0, 2.0, 3.0]))
            .execute(&store.pool)
            .await
            .unwrap();

        let result = store
            .vector_search(&collection, &[0.0, 0.0], &VectorSearchOptions::new(1, "vector"))
            .await;
        assert!(matches!(result, Err(StoreError::Database(_))), "got: {result:?}");
    }
}
