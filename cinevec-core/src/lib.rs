pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod onnx_embedder;
pub mod store;

pub use config::CinevecConfig;
pub use embeddings::{
    create_backend, BackendConfig, EmbeddingBackend, EmbeddingError, OllamaConfig,
    OllamaEmbeddingClient, OnnxConfig, DEFAULT_DIMENSIONS,
};
pub use error::StoreError;
pub use models::{Collection, MovieRecord, QueryResult, Record, ScoredRecord};
pub use onnx_embedder::OnnxEmbeddingClient;
pub use store::{RecordStore, VectorSearchOptions};
