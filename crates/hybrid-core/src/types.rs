//! Core domain types for hybrid retrieval.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::HybridError;
use crate::vector::l2_normalize;

/// Store-assigned document identifier.
pub type DocumentId = i64;

/// A corpus record before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Short title.
    pub title: String,

    /// Full text body; the only field that is embedded.
    pub content: String,

    /// Provenance, e.g. a file path or "synthetic".
    #[serde(default)]
    pub source: String,

    /// Categorical tag such as "annual_report".
    #[serde(default)]
    pub document_type: String,
}

impl NewDocument {
    /// Create a new corpus record.
    pub fn new(title: &str, content: &str, source: &str, document_type: &str) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
            source: source.to_string(),
            document_type: document_type.to_string(),
        }
    }
}

/// A stored document. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier assigned by the store.
    pub id: DocumentId,

    /// Short title.
    pub title: String,

    /// Full text body.
    pub content: String,

    /// Provenance string.
    pub source: String,

    /// Categorical tag.
    pub document_type: String,

    /// Creation timestamp (Unix millis).
    pub created_at: u64,
}

/// The two independent vector spaces a document is embedded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorSpace {
    Dense,
    Sparse,
}

impl VectorSpace {
    /// Stable name used as a storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
        }
    }
}

impl std::fmt::Display for VectorSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit-normalized semantic embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseVector(Vec<f32>);

impl DenseVector {
    /// Normalize raw model output into a dense vector.
    pub fn new(values: Vec<f32>) -> Self {
        Self(l2_normalize(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }
}

/// Unit-normalized TF-IDF embedding over a fitted vocabulary.
///
/// Held densely in memory; stores are free to persist only the non-zero slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector(Vec<f32>);

impl SparseVector {
    /// Normalize raw term weights. An all-zero input stays all-zero.
    pub fn new(values: Vec<f32>) -> Self {
        Self(l2_normalize(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Number of non-zero slots.
    pub fn nnz(&self) -> usize {
        self.0.iter().filter(|v| **v != 0.0).count()
    }

    pub fn is_zero(&self) -> bool {
        self.nnz() == 0
    }

    /// Non-zero `(column, weight)` pairs in column order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, v)| (i as u32, *v))
    }
}

/// Fit state of the sparse model: term columns and their idf weights.
///
/// Produced once per corpus and never mutated. Sparse vectors are only
/// comparable when they were produced by the same vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VocabularyRepr", into = "VocabularyRepr")]
pub struct Vocabulary {
    terms: Vec<String>,
    idf: Vec<f32>,
    stop_words: bool,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct VocabularyRepr {
    terms: Vec<String>,
    idf: Vec<f32>,
    #[serde(default)]
    stop_words: bool,
}

impl TryFrom<VocabularyRepr> for Vocabulary {
    type Error = HybridError;

    fn try_from(repr: VocabularyRepr) -> Result<Self, Self::Error> {
        Vocabulary::new(repr.terms, repr.idf, repr.stop_words)
    }
}

impl From<Vocabulary> for VocabularyRepr {
    fn from(vocab: Vocabulary) -> Self {
        Self {
            terms: vocab.terms,
            idf: vocab.idf,
            stop_words: vocab.stop_words,
        }
    }
}

impl Vocabulary {
    /// Build a vocabulary from parallel term and idf columns.
    pub fn new(terms: Vec<String>, idf: Vec<f32>, stop_words: bool) -> crate::Result<Self> {
        if terms.len() != idf.len() {
            return Err(HybridError::invalid_argument(format!(
                "vocabulary has {} terms but {} idf weights",
                terms.len(),
                idf.len()
            )));
        }

        let mut index = HashMap::with_capacity(terms.len());
        for (column, term) in terms.iter().enumerate() {
            if index.insert(term.clone(), column).is_some() {
                return Err(HybridError::invalid_argument(format!(
                    "duplicate vocabulary term: {}",
                    term
                )));
            }
        }

        Ok(Self {
            terms,
            idf,
            stop_words,
            index,
        })
    }

    /// Number of columns, i.e. the sparse dimension.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Column of a term, if it is in the vocabulary.
    pub fn column(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    /// Idf weight of a column.
    pub fn idf(&self, column: usize) -> f32 {
        self.idf.get(column).copied().unwrap_or(0.0)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether English stop words were excluded when fitting.
    pub fn stop_words(&self) -> bool {
        self.stop_words
    }

    /// Content hash identifying this exact fit.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.stop_words as u8]);
        for (term, idf) in self.terms.iter().zip(&self.idf) {
            hasher.update(term.as_bytes());
            hasher.update(&[0]);
            hasher.update(&idf.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Retrieval strategy for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Dense,
    Sparse,
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = HybridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dense" => Ok(Self::Dense),
            "sparse" => Ok(Self::Sparse),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(HybridError::unknown_mode(other)),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
            Self::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// A ranked document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result rank (1-indexed).
    pub rank: u32,

    /// Similarity score; cosine in [-1, 1], or the fused score for hybrid.
    pub score: f32,

    /// The matched document.
    pub document: Document,
}

/// Search results container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// The original query.
    pub query: String,

    /// Strategy used.
    pub mode: SearchMode,

    /// Dense weight applied, for hybrid searches.
    pub dense_weight: Option<f32>,

    /// Total results returned.
    pub total_results: usize,

    /// Search latency in milliseconds.
    pub latency_ms: u64,

    /// Individual results.
    pub results: Vec<SearchResult>,
}

/// Lifecycle of a corpus index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Empty,
    VocabularyFitting,
    PerDocumentEmbedding,
    Ready,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::VocabularyFitting => "vocabulary_fitting",
            Self::PerDocumentEmbedding => "per_document_embedding",
            Self::Ready => "ready",
        }
    }
}

impl FromStr for IndexState {
    type Err = HybridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(Self::Empty),
            "vocabulary_fitting" => Ok(Self::VocabularyFitting),
            "per_document_embedding" => Ok(Self::PerDocumentEmbedding),
            "ready" => Ok(Self::Ready),
            other => Err(HybridError::internal(format!(
                "unknown index state: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document that could not be indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFailure {
    /// Position of the record in the corpus.
    pub position: usize,

    /// Title of the record, for reporting.
    pub title: String,

    /// Why it failed.
    pub reason: String,
}

/// Outcome of a full index build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    /// Documents stored with both vectors.
    pub indexed: usize,

    /// Documents skipped after a failure.
    pub failed: usize,

    /// Per-document failures, in corpus order.
    pub failures: Vec<IndexFailure>,

    /// Vocabulary size after fitting.
    pub vocabulary_terms: usize,

    /// Wall time of the build in milliseconds.
    pub elapsed_ms: u64,
}

/// Statistics about the stored corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    /// Number of documents.
    pub documents: u64,

    /// Number of dense vectors.
    pub dense_vectors: u64,

    /// Number of sparse vectors.
    pub sparse_vectors: u64,

    /// Declared dense dimension, if any.
    pub dense_dimension: Option<usize>,

    /// Declared sparse dimension, if any.
    pub sparse_dimension: Option<usize>,

    /// Terms in the persisted vocabulary.
    pub vocabulary_terms: usize,

    /// Current index state.
    pub state: IndexState,

    /// Database size in bytes.
    pub storage_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_from_str() {
        assert_eq!("dense".parse::<SearchMode>().unwrap(), SearchMode::Dense);
        assert_eq!("sparse".parse::<SearchMode>().unwrap(), SearchMode::Sparse);
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);

        let err = "semantic".parse::<SearchMode>().unwrap_err();
        assert!(matches!(err, HybridError::UnknownMode { ref mode } if mode == "semantic"));
    }

    #[test]
    fn test_index_state_roundtrip_names() {
        for state in [
            IndexState::Empty,
            IndexState::VocabularyFitting,
            IndexState::PerDocumentEmbedding,
            IndexState::Ready,
        ] {
            assert_eq!(state.as_str().parse::<IndexState>().unwrap(), state);
        }
    }

    #[test]
    fn test_sparse_vector_zero_stays_zero() {
        let v = SparseVector::new(vec![0.0; 5]);
        assert!(v.is_zero());
        assert_eq!(v.dimension(), 5);
        assert!(v.as_slice().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_sparse_vector_entries() {
        let v = SparseVector::new(vec![0.0, 3.0, 0.0, 4.0]);
        let entries: Vec<_> = v.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, 1);
        assert!((entries[0].1 - 0.6).abs() < 1e-6);
        assert_eq!(entries[1].0, 3);
        assert!((entries[1].1 - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_vocabulary_lookup() {
        let vocab = Vocabulary::new(
            vec!["growth".to_string(), "revenue".to_string()],
            vec![1.5, 1.2],
            true,
        )
        .unwrap();

        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.column("revenue"), Some(1));
        assert_eq!(vocab.column("margin"), None);
        assert!((vocab.idf(0) - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_vocabulary_rejects_mismatched_columns() {
        assert!(Vocabulary::new(vec!["a".to_string()], vec![], false).is_err());
        assert!(Vocabulary::new(
            vec!["aa".to_string(), "aa".to_string()],
            vec![1.0, 1.0],
            false
        )
        .is_err());
    }

    #[test]
    fn test_vocabulary_serde_rebuilds_index() {
        let vocab = Vocabulary::new(
            vec!["digital".to_string(), "transformation".to_string()],
            vec![1.1, 1.3],
            true,
        )
        .unwrap();

        let json = serde_json::to_string(&vocab).unwrap();
        let back: Vocabulary = serde_json::from_str(&json).unwrap();

        assert_eq!(back.column("transformation"), Some(1));
        assert_eq!(back.fingerprint(), vocab.fingerprint());
    }

    #[test]
    fn test_vocabulary_fingerprint_changes_with_weights() {
        let a = Vocabulary::new(vec!["term".to_string()], vec![1.0], true).unwrap();
        let b = Vocabulary::new(vec!["term".to_string()], vec![2.0], true).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
