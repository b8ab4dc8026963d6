//! PostgreSQL + pgvector record store
//!
//! Vector fields are `vector(D)` columns. Ranking happens in the database
//! with `<->` (L2) or `<=>` (cosine distance), key ascending on ties.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::{
    key_from_i64, key_to_i64, quote, resolve_search, validate_record, RecordStore,
    VectorSearchOptions,
};
use crate::error::StoreError;
use crate::models::{Collection, DistanceFunction, FieldRole, Record, ScoredRecord};

#[derive(Debug, Clone)]
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&pool)
            .await?;

        tracing::info!("Connected to PostgreSQL vector store");
        Ok(Self { pool })
    }

    /// Installed pgvector version.
    pub async fn pgvector_version(&self) -> Result<String, StoreError> {
        let row: (String,) =
            sqlx::query_as("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

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

    fn decode_row(collection: &Collection, row: &PgRow) -> Result<Record, StoreError> {
        let key = key_from_i64(row.try_get::<i64, _>(collection.key_name())?)?;
        let mut record = Record::new(key);

        for field in collection.schema().data_fields() {
            let value: String = row.try_get(field.name.as_str())?;
            record.data.insert(field.name.clone(), value);
        }
        for field in collection.schema().vector_fields() {
            let vector: Option<Vector> = row.try_get(field.name.as_str())?;
            if let Some(vector) = vector {
                record.vectors.insert(field.name.clone(), vector.to_vec());
            }
        }

        Ok(record)
    }
}

fn operator(function: DistanceFunction) -> &'static str {
    match function {
        DistanceFunction::EuclideanDistance => "<->",
        DistanceFunction::CosineDistance => "<=>",
    }
}

#[async_trait]
impl RecordStore for PgVectorStore {
    async fn ensure_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        let columns: Vec<String> = collection
            .schema()
            .fields
            .iter()
            .map(|field| match field.role {
                FieldRole::Key => format!("{} BIGINT PRIMARY KEY", quote(&field.name)),
                FieldRole::Data => format!("{} TEXT NOT NULL", quote(&field.name)),
                FieldRole::Vector { dimensions, .. } => {
                    format!("{} vector({dimensions})", quote(&field.name))
                }
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
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
        let updates: Vec<String> = columns
            .iter()
            .skip(1)
            .map(|c| format!("{0} = EXCLUDED.{0}", quote(c)))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            quote(collection.name()),
            Self::select_list(collection),
            placeholders.join(", "),
            quote(collection.key_name()),
            updates.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(key);
        for field in collection.schema().data_fields() {
            query = query.bind(record.data.get(&field.name).cloned());
        }
        for field in collection.schema().vector_fields() {
            query = query.bind(record.vectors.get(&field.name).cloned().map(Vector::from));
        }
        query.execute(&self.pool).await?;

        Ok(())
    }

    async fn get(&self, collection: &Collection, key: u64) -> Result<Option<Record>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1",
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
        let distance = format!("({} {} $1)", quote(&options.vector_field), operator(function));
        let sql = format!(
            r#"
            SELECT {select}, {distance}::float8
            FROM {table}
            WHERE {field} IS NOT NULL
            ORDER BY {distance} ASC, {key} ASC
            LIMIT $2
            "#,
            select = Self::select_list(collection),
            field = quote(&options.vector_field),
            table = quote(collection.name()),
            key = quote(collection.key_name()),
        );

        let rows = sqlx::query(&sql)
            .bind(Vector::from(query.to_vec()))
            .bind(i64::try_from(options.top).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ScoredRecord, StoreError> {
                let distance: f64 = row.try_get(distance_column)?;
                Ok(ScoredRecord {
                    record: Self::decode_row(collection, row)?,
                    score: distance as f32,
                })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// TESTS
// ============================================================================
