use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use shellexpand::tilde;

use crate::embeddings::DEFAULT_DIMENSIONS;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CinevecConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub db_path: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            db_path: "movies.db".to_string(),
            database_url: None,
            max_connections: 1,
            collection: "movies".to_string(),
        }
    }
}

impl StoreConfig {
    /// `db_path` with a leading `~` expanded.
    pub fn resolved_db_path(&self) -> PathBuf {
        PathBuf::from(tilde(&self.db_path).into_owned())
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    #[default]
    Ollama,
    Onnx,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackendKind,
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
    pub onnx_model_path: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackendKind::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            model: "all-minilm:l6-v2".to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            max_retries: 3,
            retry_delay_ms: 500,
            timeout_seconds: 30,
            onnx_model_path: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub text: String,
    pub top_k: usize,
    pub vector_field: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            text: "A movie about lions".to_string(),
            top_k: 2,
            vector_field: "vector".to_string(),
        }
    }
}

impl CinevecConfig {
    /// Load defaults, then `path` if it exists, then `CINEVEC__*` variables
    /// (e.g. `CINEVEC__EMBEDDING__MODEL`).
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("CINEVEC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Message(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Postgres && self.store.database_url.is_none() {
            return Err(ConfigError::Message(
                "store.database_url is required for the postgres backend".to_string(),
            ));
        }
        if self.store.collection.is_empty() {
            return Err(ConfigError::Message(
                "store.collection must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
