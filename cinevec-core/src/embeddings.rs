//! Embeddings module for cinevec: text to fixed-length vectors
//!
//! Provides an `EmbeddingBackend` trait with implementations for:
//! - **Ollama**: a local Ollama server's `/api/embed` endpoint
//!   (`all-minilm:l6-v2`, 384-dim)
//! - **ONNX**: in-process `all-MiniLM-L6-v2` inference (384-dim)

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::{EmbeddingBackendKind, EmbeddingConfig};

/// all-MiniLM-L6-v2 embedding dimensions
pub const DEFAULT_DIMENSIONS: usize = 384;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text into a `dimensions()`-long vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Returns the embedding dimension (e.g., 384).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("ONNX model not found at {path}")]
    ModelNotFound { path: String },

    #[error("ONNX inference error: {0}")]
    OnnxInference(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

impl EmbeddingError {
    /// Transport failures, rate limiting and server errors are worth another
    /// attempt. Everything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Http(e) => !e.is_decode() && !e.is_builder(),
            EmbeddingError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Config types
// ============================================================================

/// Ollama embedding client configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout: Duration,
}

impl OllamaConfig {
    pub fn new(base_url: &str, model: &str, dimensions: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
            max_retries: 3,
            retry_delay_ms: 500,
            timeout: Duration::from_secs(30),
        }
    }
}

/// ONNX backend configuration
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimensions: usize,
}

/// Configuration union for the backend factory.
pub enum BackendConfig {
    Ollama(OllamaConfig),
    Onnx(OnnxConfig),
}

impl From<&EmbeddingConfig> for BackendConfig {
    fn from(config: &EmbeddingConfig) -> Self {
        match config.backend {
            EmbeddingBackendKind::Ollama => BackendConfig::Ollama(OllamaConfig {
                max_retries: config.max_retries,
                retry_delay_ms: config.retry_delay_ms,
                timeout: Duration::from_secs(config.timeout_seconds),
                ..OllamaConfig::new(&config.endpoint, &config.model, config.dimensions)
            }),
            EmbeddingBackendKind::Onnx => {
                let (model_path, tokenizer_path) =
                    crate::onnx_embedder::resolve_onnx_paths(&config.onnx_model_path);
                BackendConfig::Onnx(OnnxConfig {
                    model_path,
                    tokenizer_path,
                    dimensions: config.dimensions,
                })
            }
        }
    }
}

/// Create the appropriate backend from configuration.
pub fn create_backend(config: BackendConfig) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    match config {
        BackendConfig::Ollama(c) => Ok(Box::new(OllamaEmbeddingClient::new(c)?)),
        BackendConfig::Onnx(c) => Ok(Box::new(crate::onnx_embedder::OnnxEmbeddingClient::new(c)?)),
    }
}

// ============================================================================
// Ollama API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

// ============================================================================
// OllamaEmbeddingClient
// ============================================================================

/// Ollama embedding client, calling `POST {base_url}/api/embed`.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaEmbeddingClient {
    pub fn new(config: OllamaConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Embed `text`, retrying transient failures with exponential backoff.
    pub async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms.max(1))
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        RetryIf::spawn(
            retry_strategy,
            || self.embed_once(text),
            |e: &EmbeddingError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!(error = %e, model = %self.config.model, "Embedding request failed, retrying");
                }
                retry
            },
        )
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, model = %self.config.model, "Embedding request failed");
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embed", self.config.base_url);
        let request = EmbedRequest {
            model: &self.config.model,
            input: text,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorResponse>(&error_body)
                .map(|e| e.error)
                .unwrap_or(error_body);

            return Err(EmbeddingError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: EmbedResponse = response.json().await?;
        let values = body
            .embeddings
            .into_iter()
            .next()
            .ok_or(EmbeddingError::MissingEmbedding)?;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_raw(text).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ============================================================================
// TESTS
// ============================================================================
