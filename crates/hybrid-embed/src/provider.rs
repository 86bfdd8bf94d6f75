//! Embedding provider: one dense model plus a write-once sparse vocabulary.

use std::sync::{Arc, OnceLock};

use tracing::info;

use hybrid_core::{
    DenseEmbedder, DenseVector, HybridError, Result, SparseConfig, SparseVector, Vocabulary,
};

use crate::tfidf;

/// Produces both vector representations of a text.
///
/// The dense side is usable immediately. The sparse side needs a vocabulary,
/// either fit over the corpus or installed from storage; it is set at most
/// once and shared read-only afterwards.
pub struct EmbeddingProvider {
    embedder: Arc<dyn DenseEmbedder>,
    sparse_config: SparseConfig,
    vocabulary: OnceLock<Arc<Vocabulary>>,
}

impl EmbeddingProvider {
    pub fn new(embedder: Arc<dyn DenseEmbedder>, sparse_config: SparseConfig) -> Self {
        Self {
            embedder,
            sparse_config,
            vocabulary: OnceLock::new(),
        }
    }

    /// Embed a query text into the dense space.
    pub async fn embed_dense(&self, text: &str) -> Result<DenseVector> {
        self.embedder.embed_query(text).await
    }

    /// Embed a batch of document texts into the dense space.
    pub async fn embed_dense_documents(&self, texts: &[&str]) -> Result<Vec<DenseVector>> {
        let vectors = self.embedder.embed_documents(texts).await?;
        if vectors.len() != texts.len() {
            return Err(HybridError::embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    /// Fit the sparse vocabulary over the whole corpus.
    ///
    /// Fails with `VocabularyAlreadyFitted` if a vocabulary is already set.
    pub fn fit_sparse_vocabulary(&self, texts: &[&str]) -> Result<Arc<Vocabulary>> {
        if self.is_fitted() {
            return Err(HybridError::VocabularyAlreadyFitted);
        }
        let vocabulary = tfidf::fit_vocabulary(texts, &self.sparse_config)?;
        self.install_vocabulary(vocabulary)
    }

    /// Install a previously fitted vocabulary, e.g. one loaded from the store.
    pub fn install_vocabulary(&self, vocabulary: Vocabulary) -> Result<Arc<Vocabulary>> {
        let terms = vocabulary.len();
        let vocabulary = Arc::new(vocabulary);
        self.vocabulary
            .set(Arc::clone(&vocabulary))
            .map_err(|_| HybridError::VocabularyAlreadyFitted)?;
        info!("Sparse vocabulary installed: terms={}", terms);
        Ok(vocabulary)
    }

    /// Embed a text into the sparse space.
    pub fn embed_sparse(&self, text: &str) -> Result<SparseVector> {
        let vocabulary = self.vocabulary.get().ok_or(HybridError::NotFitted)?;
        Ok(tfidf::embed_sparse(vocabulary, text))
    }

    /// The installed vocabulary.
    pub fn vocabulary(&self) -> Result<Arc<Vocabulary>> {
        self.vocabulary.get().cloned().ok_or(HybridError::NotFitted)
    }

    pub fn is_fitted(&self) -> bool {
        self.vocabulary.get().is_some()
    }

    /// Identity of the dense model, recorded alongside stored dense vectors.
    pub fn dense_model_id(&self) -> String {
        self.embedder.model_id()
    }

    pub fn dense_dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Sparse dimension, once a vocabulary is set.
    pub fn sparse_dimension(&self) -> Option<usize> {
        self.vocabulary.get().map(|v| v.len())
    }
}
