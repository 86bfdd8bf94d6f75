//! Query engine for dense, sparse and hybrid search.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use hybrid_core::{
    DocumentId, HybridError, IndexState, Result, SearchConfig, SearchMode, SearchResult,
    SearchResults, Store, VectorSpace,
};
use hybrid_embed::EmbeddingProvider;

use crate::fusion::linear_fusion;

/// Parameters of one search call.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Retrieval strategy.
    pub mode: SearchMode,

    /// Maximum number of results to return.
    pub limit: usize,

    /// Dense weight for hybrid mode; the configured default when `None`.
    pub dense_weight: Option<f32>,
}

impl SearchRequest {
    pub fn new(mode: SearchMode, limit: usize) -> Self {
        Self {
            mode,
            limit,
            dense_weight: None,
        }
    }

    pub fn with_dense_weight(mut self, dense_weight: f32) -> Self {
        self.dense_weight = Some(dense_weight);
        self
    }
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self::new(SearchMode::Hybrid, 10)
    }
}

/// Ranks stored documents against a query.
///
/// The ranker never writes to the store. It is handed its embedding provider
/// and only reads the persisted vocabulary to fill an unfitted provider.
/// Queries are refused when the provider's vocabulary or dense model differs
/// from the ones the index was built with.
pub struct FusionRanker<S> {
    /// Storage backend.
    store: Arc<S>,

    /// Query-side embeddings.
    provider: Arc<EmbeddingProvider>,

    config: SearchConfig,
}

impl<S> FusionRanker<S>
where
    S: Store + Send + Sync,
{
    /// Create a ranker with default search settings.
    pub fn new(store: Arc<S>, provider: Arc<EmbeddingProvider>) -> Self {
        Self::with_config(store, provider, SearchConfig::default())
    }

    pub fn with_config(
        store: Arc<S>,
        provider: Arc<EmbeddingProvider>,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Search with the mode given by name (`dense`, `sparse` or `hybrid`).
    pub async fn search_str(
        &self,
        query: &str,
        mode: &str,
        limit: usize,
        dense_weight: Option<f32>,
    ) -> Result<SearchResults> {
        let mode: SearchMode = mode.parse()?;
        let request = SearchRequest {
            mode,
            limit,
            dense_weight,
        };
        self.search(query, request).await
    }

    /// Rank documents for `query`.
    ///
    /// Fails with `IndexNotBuilt` until indexing has completed, with
    /// `VocabularyMismatch` or `EmbedderMismatch` when the query side would
    /// project into a different space than the stored vectors, and with
    /// `Timeout` when the call exceeds the configured bound.
    pub async fn search(&self, query: &str, request: SearchRequest) -> Result<SearchResults> {
        let timeout_ms = self.config.timeout_ms;
        tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.search_inner(query, request),
        )
        .await
        .map_err(|_| HybridError::Timeout { timeout_ms })?
    }

    async fn search_inner(&self, query: &str, request: SearchRequest) -> Result<SearchResults> {
        let start = Instant::now();

        if request.limit == 0 || request.limit > self.config.max_limit {
            return Err(HybridError::invalid_argument(format!(
                "limit must be within 1..={}, got {}",
                self.config.max_limit, request.limit
            )));
        }

        let state = self.store.index_state().await?;
        if state != IndexState::Ready {
            debug!("Search refused in state {}", state);
            return Err(HybridError::IndexNotBuilt);
        }

        info!("Searching ({}) for: {:?}", request.mode, query);

        let (hits, dense_weight) = match request.mode {
            SearchMode::Dense => (self.dense_search(query, request.limit).await?, None),
            SearchMode::Sparse => (self.sparse_search(query, request.limit).await?, None),
            SearchMode::Hybrid => {
                let w = request.dense_weight.unwrap_or(self.config.dense_weight);
                if !(0.0..=1.0).contains(&w) {
                    return Err(HybridError::invalid_argument(format!(
                        "dense weight must be within [0, 1], got {}",
                        w
                    )));
                }
                (self.hybrid_search(query, w, request.limit).await?, Some(w))
            }
        };

        let results = self.hydrate(&hits).await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Search completed in {}ms, returned {} results",
            latency_ms,
            results.len()
        );

        Ok(SearchResults {
            query: query.to_string(),
            mode: request.mode,
            dense_weight,
            total_results: results.len(),
            latency_ms,
            results,
        })
    }

    async fn dense_search(&self, query: &str, k: usize) -> Result<Vec<(DocumentId, f32)>> {
        self.check_dense_model().await?;
        let embedding = self.provider.embed_dense(query).await?;
        self.store.nearest_dense(&embedding, k).await
    }

    async fn sparse_search(&self, query: &str, k: usize) -> Result<Vec<(DocumentId, f32)>> {
        self.check_vocabulary().await?;
        let embedding = self.provider.embed_sparse(query)?;
        self.store.nearest_sparse(&embedding, k).await
    }

    async fn hybrid_search(
        &self,
        query: &str,
        dense_weight: f32,
        k: usize,
    ) -> Result<Vec<(DocumentId, f32)>> {
        self.check_dense_model().await?;
        self.check_vocabulary().await?;
        let dense_query = self.provider.embed_dense(query).await?;
        let sparse_query = self.provider.embed_sparse(query)?;

        // Full score maps for both spaces, fetched concurrently
        let (dense_scores, sparse_scores) = tokio::join!(
            self.store
                .similarities(VectorSpace::Dense, dense_query.as_slice()),
            self.store
                .similarities(VectorSpace::Sparse, sparse_query.as_slice())
        );

        let dense_scores = dense_scores?;
        let sparse_scores = sparse_scores?;

        debug!(
            "Dense scan returned {} scores, sparse scan returned {} scores",
            dense_scores.len(),
            sparse_scores.len()
        );

        let fused = linear_fusion(&dense_scores, &sparse_scores, dense_weight, k);

        debug!("Fused to {} results", fused.len());

        Ok(fused)
    }

    /// Fill an unfitted provider from the vocabulary persisted with the index,
    /// then make sure the provider's vocabulary is the one the index used.
    async fn check_vocabulary(&self) -> Result<()> {
        if !self.provider.is_fitted() {
            let vocabulary = self
                .store
                .load_vocabulary()
                .await?
                .ok_or(HybridError::NotFitted)?;

            match self.provider.install_vocabulary(vocabulary) {
                // Another search installed it first
                Ok(_) | Err(HybridError::VocabularyAlreadyFitted) => {}
                Err(e) => return Err(e),
            }
        }

        let stored = self
            .store
            .vocabulary_fingerprint()
            .await?
            .ok_or(HybridError::NotFitted)?;
        let active = self.provider.vocabulary()?.fingerprint();
        if stored != active {
            warn!("Vocabulary mismatch: stored {}, active {}", stored, active);
            return Err(HybridError::VocabularyMismatch { stored, active });
        }
        Ok(())
    }

    /// Make sure query vectors come from the model that embedded the corpus.
    ///
    /// An index with no recorded model is accepted as-is.
    async fn check_dense_model(&self) -> Result<()> {
        let Some(stored) = self.store.dense_model().await? else {
            debug!("No dense model recorded for this index");
            return Ok(());
        };
        let active = self.provider.dense_model_id();
        if stored != active {
            warn!("Dense model mismatch: stored {}, active {}", stored, active);
            return Err(HybridError::EmbedderMismatch { stored, active });
        }
        Ok(())
    }

    /// Attach documents to scored ids, keeping the score order.
    async fn hydrate(&self, hits: &[(DocumentId, f32)]) -> Result<Vec<SearchResult>> {
        let ids: Vec<DocumentId> = hits.iter().map(|(id, _)| *id).collect();
        let mut documents: HashMap<DocumentId, _> = self
            .store
            .get_documents(&ids)
            .await?
            .into_iter()
            .map(|doc| (doc.id, doc))
            .collect();

        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let Some(document) = documents.remove(id) else {
                continue;
            };
            results.push(SearchResult {
                rank: results.len() as u32 + 1,
                score: *score,
                document,
            });
        }

        Ok(results)
    }
}
