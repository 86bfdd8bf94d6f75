//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    DenseVector, Document, DocumentId, IndexState, NewDocument, SparseVector, Stats, VectorSpace,
    Vocabulary,
};

/// Storage layer trait: document records plus one vector store per space.
///
/// Each document owns at most one vector per space; writing a second one is
/// rejected with `VectorExists`. Every vector written to or compared against a
/// space must match the dimension declared for it.
#[async_trait]
pub trait Store: Send + Sync {
    // Document operations
    async fn insert_document(&self, doc: &NewDocument) -> Result<DocumentId>;
    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>>;
    async fn get_documents(&self, ids: &[DocumentId]) -> Result<Vec<Document>>;
    async fn list_documents(&self, limit: u32, offset: u32) -> Result<Vec<Document>>;

    // Vector space operations
    async fn declare_space(&self, space: VectorSpace, dimension: usize) -> Result<()>;
    async fn space_dimension(&self, space: VectorSpace) -> Result<Option<usize>>;
    async fn put_vector(&self, id: DocumentId, space: VectorSpace, vector: &[f32]) -> Result<()>;

    /// Insert a document and both of its vectors atomically.
    async fn insert_indexed_document(
        &self,
        doc: &NewDocument,
        dense: &DenseVector,
        sparse: &SparseVector,
    ) -> Result<DocumentId>;

    // Search operations

    /// Cosine similarity of `query` to every vector in `space`, ascending id.
    async fn similarities(&self, space: VectorSpace, query: &[f32]) -> Result<Vec<(DocumentId, f32)>>;

    /// Up to `k` documents by descending similarity, ties by ascending id.
    async fn nearest(
        &self,
        space: VectorSpace,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(DocumentId, f32)>>;

    // Fit state and lifecycle
    async fn save_vocabulary(&self, vocabulary: &Vocabulary) -> Result<()>;
    async fn load_vocabulary(&self) -> Result<Option<Vocabulary>>;

    /// Fingerprint of the persisted vocabulary, if one is saved.
    async fn vocabulary_fingerprint(&self) -> Result<Option<String>>;

    /// Record which dense model produced the stored dense vectors.
    async fn save_dense_model(&self, model_id: &str) -> Result<()>;
    async fn dense_model(&self) -> Result<Option<String>>;

    async fn set_index_state(&self, state: IndexState) -> Result<()>;
    async fn index_state(&self) -> Result<IndexState>;

    /// Remove every document, vector, vocabulary and declared space.
    async fn clear(&self) -> Result<()>;

    // Stats
    async fn get_stats(&self) -> Result<Stats>;

    async fn put_dense(&self, id: DocumentId, vector: &DenseVector) -> Result<()> {
        self.put_vector(id, VectorSpace::Dense, vector.as_slice()).await
    }

    async fn put_sparse(&self, id: DocumentId, vector: &SparseVector) -> Result<()> {
        self.put_vector(id, VectorSpace::Sparse, vector.as_slice()).await
    }

    async fn nearest_dense(&self, query: &DenseVector, k: usize) -> Result<Vec<(DocumentId, f32)>> {
        self.nearest(VectorSpace::Dense, query.as_slice(), k).await
    }

    async fn nearest_sparse(
        &self,
        query: &SparseVector,
        k: usize,
    ) -> Result<Vec<(DocumentId, f32)>> {
        self.nearest(VectorSpace::Sparse, query.as_slice(), k).await
    }
}

/// Dense embedding model trait.
#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    /// Embed a batch of document texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<DenseVector>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<DenseVector>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the maximum context length in tokens.
    fn max_tokens(&self) -> usize;

    /// Identity of the model; vectors from different ids are not comparable.
    fn model_id(&self) -> String;
}
