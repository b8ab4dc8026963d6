//! ONNX embedding backend: in-process `all-MiniLM-L6-v2`
//!
//! Produces the same 384-dimensional sentence embeddings as the Ollama
//! `all-minilm:l6-v2` model, without a server.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;

use crate::embeddings::{EmbeddingBackend, EmbeddingError, OnnxConfig};

pub struct OnnxEmbeddingClient {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<tokenizers::Tokenizer>,
    dimensions: usize,
}

impl std::fmt::Debug for OnnxEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingClient")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingClient {
    /// Load the model and tokenizer named in `config`.
    pub fn new(config: OnnxConfig) -> Result<Self, EmbeddingError> {
        for path in [&config.model_path, &config.tokenizer_path] {
            if !path.exists() {
                return Err(EmbeddingError::ModelNotFound {
                    path: path.display().to_string(),
                });
            }
        }

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        tracing::info!(model = %config.model_path.display(), "Loaded ONNX embedding model");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OnnxEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let dimensions = self.dimensions;
        let text = text.to_string();

        // CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let mut session = session
                .lock()
                .map_err(|e| EmbeddingError::OnnxInference(format!("session lock poisoned: {e}")))?;
            run_model(&mut session, &tokenizer, &text, dimensions)
        })
        .await
        .map_err(|e| EmbeddingError::OnnxInference(format!("spawn_blocking join error: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

fn onnx_err(e: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::OnnxInference(e.to_string())
}

fn run_model(
    session: &mut Session,
    tokenizer: &tokenizers::Tokenizer,
    text: &str,
    expected_dims: usize,
) -> Result<Vec<f32>, EmbeddingError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

    let to_i64 = |xs: &[u32]| xs.iter().map(|&x| x as i64).collect::<Vec<i64>>();
    let input_ids = to_i64(encoding.get_ids());
    let attention_mask = to_i64(encoding.get_attention_mask());
    let token_type_ids = to_i64(encoding.get_type_ids());

    let shape = vec![1i64, input_ids.len() as i64];
    let inputs = ort::inputs! {
        "input_ids" => Tensor::from_array((shape.clone(), input_ids)).map_err(onnx_err)?,
        "attention_mask" => Tensor::from_array((shape.clone(), attention_mask.clone())).map_err(onnx_err)?,
        "token_type_ids" => Tensor::from_array((shape, token_type_ids)).map_err(onnx_err)?,
    };

    let outputs = session.run(inputs).map_err(onnx_err)?;

    // Last hidden state, [1, seq_len, hidden_dim]
    let (out_shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(onnx_err)?;
    if out_shape.len() != 3 {
        return Err(EmbeddingError::OnnxInference(format!(
            "Expected 3D output, got {}D",
            out_shape.len()
        )));
    }

    let mut pooled = mean_pool(data, out_shape[1] as usize, out_shape[2] as usize, &attention_mask);
    l2_normalize(&mut pooled);

    if pooled.len() != expected_dims {
        return Err(EmbeddingError::InvalidDimensions {
            expected: expected_dims,
            actual: pooled.len(),
        });
    }
    Ok(pooled)
}

/// Average the token vectors of a flat `[seq_len, hidden_dim]` buffer,
/// counting only tokens whose mask is set.
fn mean_pool(data: &[f32], seq_len: usize, hidden_dim: usize, mask: &[i64]) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (tok, row) in data.chunks_exact(hidden_dim).take(seq_len).enumerate() {
        if mask.get(tok).copied().unwrap_or(0) == 0 {
            continue;
        }
        count += 1.0;
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
    }

    if count > 0.0 {
        pooled.iter_mut().for_each(|v| *v /= count);
    }
    pooled
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// `$XDG_DATA_HOME/cinevec/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    let data_home = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share")
        });
    data_home.join("cinevec/models")
}

/// Model and tokenizer paths. The tokenizer sits next to the model as
/// `<stem>-tokenizer.json`; an empty path means the default model dir.
pub fn resolve_onnx_paths(onnx_model_path: &str) -> (PathBuf, PathBuf) {
    let model = if onnx_model_path.is_empty() {
        default_model_dir().join("all-MiniLM-L6-v2.onnx")
    } else {
        PathBuf::from(onnx_model_path)
    };
    let stem = model
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let tokenizer = model.with_file_name(format!("{stem}-tokenizer.json"));
    (model, tokenizer)
}

// ============================================================================
// TESTS
// ============================================================================
