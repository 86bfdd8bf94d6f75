//! ONNX-based dense embedding model implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use hybrid_core::{DenseEmbedder, DenseVector, EmbeddingConfig, HybridError, Result};

/// Sentence encoder running on ONNX Runtime, e.g. all-MiniLM-L6-v2.
pub struct OnnxEmbedder {
    /// ONNX inference session (wrapped in Mutex for interior mutability).
    session: Mutex<Session>,

    /// Tokenizer for the model.
    tokenizer: Arc<Tokenizer>,

    /// Embedding dimension.
    dimension: usize,

    /// Maximum token count.
    max_tokens: usize,

    /// Whether the model graph takes a `token_type_ids` input.
    token_type_ids: bool,

    query_prefix: String,
    document_prefix: String,

    /// blake3 digest of the model file.
    model_digest: String,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from the configured model directory.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let model_path = config.model_path.join("model.onnx");
        let tokenizer_path = config.model_path.join("tokenizer.json");

        let mut embedder = Self::new(&model_path, &tokenizer_path, config.num_threads)?;
        embedder.dimension = config.dimension;
        embedder.max_tokens = config.max_tokens;
        embedder.token_type_ids = config.token_type_ids;
        embedder.query_prefix = config.query_prefix.clone();
        embedder.document_prefix = config.document_prefix.clone();
        Ok(embedder)
    }

    /// Create a new embedder from model and tokenizer paths.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `tokenizer_path` - Path to the tokenizer.json file
    /// * `num_threads` - Intra-op threads for CPU inference
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        num_threads: usize,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();
        let defaults = EmbeddingConfig::default();

        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| HybridError::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| HybridError::embedding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(num_threads.max(1))
            .map_err(|e| HybridError::embedding(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| HybridError::embedding(format!("Failed to load model: {}", e)))?;

        let model_digest = blake3::hash(&std::fs::read(model_path)?).to_hex()[..16].to_string();

        info!("Loading tokenizer from {:?}", tokenizer_path);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| HybridError::embedding(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            "Embedder initialized: dim={}, max_tokens={}",
            defaults.dimension, defaults.max_tokens
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer: Arc::new(tokenizer),
            dimension: defaults.dimension,
            max_tokens: defaults.max_tokens,
            token_type_ids: defaults.token_type_ids,
            query_prefix: defaults.query_prefix,
            document_prefix: defaults.document_prefix,
            model_digest,
        })
    }

    /// Embed a batch of texts with a given prefix.
    fn embed_batch(&self, texts: &[&str], prefix: &str) -> Result<Vec<DenseVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed: Vec<String> = texts.iter().map(|t| format!("{}{}", prefix, t)).collect();
        let prefixed_refs: Vec<&str> = prefixed.iter().map(|s| s.as_str()).collect();

        let encodings = self
            .tokenizer
            .encode_batch(prefixed_refs, true)
            .map_err(|e| HybridError::embedding(format!("Tokenization failed: {}", e)))?;

        // Pad to the longest input, capped at the model context
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_tokens)
            .max(1);

        let batch_size = encodings.len();

        debug!("Embedding batch: size={}, max_len={}", batch_size, max_len);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let input_ids_tensor = Tensor::from_array((vec![batch_size, max_len], input_ids))
            .map_err(|e| HybridError::embedding(format!("Failed to create input tensor: {}", e)))?;

        let attention_mask_tensor =
            Tensor::from_array((vec![batch_size, max_len], attention_mask)).map_err(|e| {
                HybridError::embedding(format!("Failed to create mask tensor: {}", e))
            })?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| HybridError::embedding(format!("Failed to lock session: {}", e)))?;

        let outputs = (if self.token_type_ids {
            let token_type_tensor =
                Tensor::from_array((vec![batch_size, max_len], vec![0i64; batch_size * max_len]))
                    .map_err(|e| {
                        HybridError::embedding(format!("Failed to create token type tensor: {}", e))
                    })?;
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_tensor
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])
        })
        .map_err(|e| HybridError::embedding(format!("Inference failed: {}", e)))?;

        // First output is either token states (batch, seq, hidden) or pooled (batch, hidden)
        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| HybridError::embedding("No output tensor found"))?;

        let view = output
            .try_extract_array::<f32>()
            .map_err(|e| HybridError::embedding(format!("Failed to extract tensor: {}", e)))?;

        let shape_dims: Vec<usize> = view.shape().to_vec();
        debug!("Output shape: {:?}", shape_dims);

        let embeddings = if shape_dims.len() == 3 {
            self.mean_pool_3d_ndarray(&view, &encodings, max_len)?
        } else if shape_dims.len() == 2 {
            let hidden_dim = shape_dims[1];
            (0..batch_size)
                .map(|i| DenseVector::new((0..hidden_dim).map(|j| view[[i, j]]).collect()))
                .collect()
        } else {
            return Err(HybridError::embedding(format!(
                "Unexpected output shape: {:?}",
                shape_dims
            )));
        };

        if let Some(first) = embeddings.first() {
            if first.dimension() != self.dimension {
                return Err(HybridError::DimensionMismatch {
                    space: hybrid_core::VectorSpace::Dense,
                    expected: self.dimension,
                    actual: first.dimension(),
                });
            }
        }

        Ok(embeddings)
    }

    /// Mean pooling over sequence dimension with attention mask.
    ///
    /// Works with ndarray view of shape [batch, seq, hidden]
    fn mean_pool_3d_ndarray(
        &self,
        tensor: &ArrayViewD<'_, f32>,
        encodings: &[tokenizers::Encoding],
        max_len: usize,
    ) -> Result<Vec<DenseVector>> {
        let shape = tensor.shape();
        let seq_len = shape[1];
        let hidden_dim = shape[2];

        let mut embeddings = Vec::with_capacity(shape[0]);

        for (i, encoding) in encodings.iter().enumerate() {
            let attention_mask = encoding.get_attention_mask();
            let limit = attention_mask.len().min(max_len).min(seq_len);

            let mut sum = vec![0.0f32; hidden_dim];
            let mut valid = 0usize;
            for j in 0..limit {
                if attention_mask[j] == 1 {
                    valid += 1;
                    for (k, s) in sum.iter_mut().enumerate() {
                        *s += tensor[[i, j, k]];
                    }
                }
            }

            if valid == 0 {
                embeddings.push(DenseVector::new(sum));
                continue;
            }

            let mean: Vec<f32> = sum.iter().map(|s| s / valid as f32).collect();
            embeddings.push(DenseVector::new(mean));
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl DenseEmbedder for OnnxEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<DenseVector>> {
        // Session is guarded by a Mutex; inference runs on the calling task
        self.embed_batch(texts, &self.document_prefix)
    }

    async fn embed_query(&self, text: &str) -> Result<DenseVector> {
        let texts = [text];
        let results = self.embed_batch(&texts, &self.query_prefix)?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| HybridError::embedding("No embedding returned"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn model_id(&self) -> String {
        format!("onnx-{}-{}", self.dimension, self.model_digest)
    }
}
