//! Full index builds.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use hybrid_core::{
    DenseVector, HybridError, IndexFailure, IndexReport, IndexState, IndexingConfig, NewDocument,
    Result, SparseVector, Store, VectorSpace,
};
use hybrid_embed::EmbeddingProvider;

/// One corpus record after embedding, waiting to be committed.
struct Embedded {
    position: usize,
    record: NewDocument,
    vectors: std::result::Result<(DenseVector, SparseVector), String>,
}

/// Builds the dense and sparse index for a corpus.
///
/// An index is always built from scratch: the vocabulary is fit once over
/// every record, so adding documents later would need a full rebuild anyway.
/// Progress is mirrored into the store as `Empty -> VocabularyFitting ->
/// PerDocumentEmbedding -> Ready`.
pub struct CorpusIndexer<S> {
    store: Arc<S>,
    provider: Arc<EmbeddingProvider>,
    config: IndexingConfig,
    rebuild: bool,
}

impl<S> CorpusIndexer<S>
where
    S: Store + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, provider: Arc<EmbeddingProvider>, config: IndexingConfig) -> Self {
        Self {
            store,
            provider,
            config,
            rebuild: false,
        }
    }

    /// Clear an existing index before building instead of refusing.
    pub fn with_rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }

    /// Current lifecycle state, as recorded in the store.
    pub async fn state(&self) -> Result<IndexState> {
        self.store.index_state().await
    }

    /// Index every record.
    ///
    /// In best-effort mode a failing record is logged, skipped and listed in
    /// the report. In strict mode the first failure aborts the build with
    /// `PartialIndexing`, leaving the index short of `Ready`.
    pub async fn index(&self, records: Vec<NewDocument>) -> Result<IndexReport> {
        let start = Instant::now();
        let total = records.len();

        // Checked before `prepare`, which may clear the store
        if self.provider.is_fitted() {
            return Err(HybridError::VocabularyAlreadyFitted);
        }

        self.prepare().await?;

        info!("Indexing {} documents", total);

        // Vocabulary fit over the whole corpus in one batch
        self.store
            .set_index_state(IndexState::VocabularyFitting)
            .await?;
        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        let vocabulary = self.provider.fit_sparse_vocabulary(&contents)?;
        self.store.save_vocabulary(&vocabulary).await?;
        self.store
            .declare_space(VectorSpace::Dense, self.provider.dense_dimension())
            .await?;
        self.store
            .save_dense_model(&self.provider.dense_model_id())
            .await?;
        self.store
            .declare_space(VectorSpace::Sparse, vocabulary.len())
            .await?;

        self.store
            .set_index_state(IndexState::PerDocumentEmbedding)
            .await?;

        let mut report = IndexReport {
            vocabulary_terms: vocabulary.len(),
            ..IndexReport::default()
        };

        let workers = self.config.workers.max(1);
        let batch_size = self.config.batch_size.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        let mut batch = Vec::with_capacity(batch_size);
        for (position, record) in records.into_iter().enumerate() {
            batch.push((position, record));
            if batch.len() == batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                self.spawn_batch(&mut tasks, &semaphore, full);
            }
        }
        if !batch.is_empty() {
            self.spawn_batch(&mut tasks, &semaphore, batch);
        }

        debug!(
            "Spawned {} embedding batches (workers={}, batch_size={})",
            tasks.len(),
            workers,
            batch_size
        );

        // Commit in corpus order so ids follow record positions
        let mut pending: BTreeMap<usize, Embedded> = BTreeMap::new();
        let mut next = 0;
        while let Some(joined) = tasks.join_next().await {
            let embedded = match joined {
                Ok(embedded) => embedded,
                Err(e) => {
                    tasks.abort_all();
                    return Err(HybridError::internal(format!("Embedding task failed: {}", e)));
                }
            };
            for item in embedded {
                pending.insert(item.position, item);
            }

            while let Some(item) = pending.remove(&next) {
                next += 1;
                if let Err(e) = self.commit(item, &mut report).await {
                    tasks.abort_all();
                    return Err(e);
                }
                if self.config.strict && report.failed > 0 {
                    tasks.abort_all();
                    let first = report
                        .failures
                        .first()
                        .map(|f| format!("{} ({})", f.title, f.reason))
                        .unwrap_or_default();
                    warn!("Strict indexing aborted: {}", first);
                    return Err(HybridError::PartialIndexing {
                        failed: report.failed,
                        total,
                        first,
                    });
                }
            }
        }

        self.store.set_index_state(IndexState::Ready).await?;

        report.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            "Indexing complete: {} indexed, {} failed, {} terms in {}ms",
            report.indexed, report.failed, report.vocabulary_terms, report.elapsed_ms
        );

        Ok(report)
    }

    /// Make sure the build starts from an empty store.
    async fn prepare(&self) -> Result<()> {
        let stats = self.store.get_stats().await?;
        if stats.documents == 0 && stats.state == IndexState::Empty {
            return Ok(());
        }

        if !self.rebuild {
            return Err(HybridError::invalid_argument(format!(
                "store already holds an index ({} documents, state {}); rebuild to replace it",
                stats.documents, stats.state
            )));
        }

        info!("Clearing existing index of {} documents", stats.documents);
        self.store.clear().await
    }

    fn spawn_batch(
        &self,
        tasks: &mut JoinSet<Vec<Embedded>>,
        semaphore: &Arc<Semaphore>,
        batch: Vec<(usize, NewDocument)>,
    ) {
        let provider = Arc::clone(&self.provider);
        let semaphore = Arc::clone(semaphore);
        tasks.spawn(async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire_owned().await.ok();
            embed_batch(&provider, batch).await
        });
    }

    /// Store one embedded record, or record why it failed.
    async fn commit(&self, item: Embedded, report: &mut IndexReport) -> Result<()> {
        let reason = match item.vectors {
            Ok((dense, sparse)) => {
                match self
                    .store
                    .insert_indexed_document(&item.record, &dense, &sparse)
                    .await
                {
                    Ok(id) => {
                        debug!("Indexed record {} as document {}", item.position, id);
                        report.indexed += 1;
                        return Ok(());
                    }
                    Err(e @ HybridError::StoreUnavailable { .. }) => return Err(e),
                    Err(e) => e.to_string(),
                }
            }
            Err(reason) => reason,
        };

        warn!(
            "Failed to index record {} ({:?}): {}",
            item.position, item.record.title, reason
        );
        report.failed += 1;
        report.failures.push(IndexFailure {
            position: item.position,
            title: item.record.title,
            reason,
        });
        Ok(())
    }
}

/// Embed a batch into both spaces.
///
/// When the dense batch call fails, each record is retried alone so one bad
/// record only fails itself.
async fn embed_batch(
    provider: &EmbeddingProvider,
    batch: Vec<(usize, NewDocument)>,
) -> Vec<Embedded> {
    let texts: Vec<&str> = batch.iter().map(|(_, r)| r.content.as_str()).collect();

    let dense: Vec<std::result::Result<DenseVector, String>> =
        match provider.embed_dense_documents(&texts).await {
            Ok(vectors) => vectors.into_iter().map(Ok).collect(),
            Err(e) => {
                debug!("Batch of {} failed ({}), embedding one by one", texts.len(), e);
                let mut single = Vec::with_capacity(texts.len());
                for text in &texts {
                    let result = provider
                        .embed_dense_documents(&[*text])
                        .await
                        .and_then(|mut v| {
                            v.pop()
                                .ok_or_else(|| HybridError::embedding("No embedding returned"))
                        })
                        .map_err(|e| e.to_string());
                    single.push(result);
                }
                single
            }
        };

    batch
        .into_iter()
        .zip(dense)
        .map(|((position, record), dense)| {
            let vectors = dense.and_then(|dense| {
                provider
                    .embed_sparse(&record.content)
                    .map(|sparse| (dense, sparse))
                    .map_err(|e| e.to_string())
            });
            Embedded {
                position,
                record,
                vectors,
            }
        })
        .collect()
}
