use thiserror::Error;

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Unknown vector field '{field}' in collection '{collection}'")]
    UnknownVectorField { collection: String, field: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Key {0} does not fit in a signed 64-bit column")]
    KeyOutOfRange(u64),

    #[error("Corrupt vector blob for key {key}: {len} bytes is not a multiple of 4")]
    CorruptVector { key: u64, len: usize },

    #[error("sqlite-vec extension unavailable: {0}")]
    VectorExtension(String),

    #[error("The postgres store backend requires store.database_url")]
    MissingDatabaseUrl,
}
