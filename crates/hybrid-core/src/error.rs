//! Error types for hybrid retrieval.

use thiserror::Error;

use crate::types::{DocumentId, VectorSpace};

/// Result type alias using HybridError.
pub type Result<T> = std::result::Result<T, HybridError>;

/// Errors that can occur while indexing or searching.
#[derive(Error, Debug)]
pub enum HybridError {
    /// Sparse embedding requested before the vocabulary was fit.
    #[error("Sparse vocabulary has not been fit; index the corpus first")]
    NotFitted,

    /// A vocabulary is already installed; re-fitting needs a full re-index.
    #[error("Sparse vocabulary is already fit; re-fitting requires a full re-index")]
    VocabularyAlreadyFitted,

    /// Search type is not one of dense, sparse or hybrid.
    #[error("Unknown search type: {mode} (expected dense, sparse or hybrid)")]
    UnknownMode { mode: String },

    /// Vector length does not match the dimension declared for its space.
    #[error("Dimension mismatch in {space} space: expected {expected}, got {actual}")]
    DimensionMismatch {
        space: VectorSpace,
        expected: usize,
        actual: usize,
    },

    /// The query-side vocabulary is not the one the stored sparse vectors were built with.
    #[error("Vocabulary mismatch: index built with {stored}, query side has {active}")]
    VocabularyMismatch { stored: String, active: String },

    /// The query-side dense model is not the one the stored dense vectors came from.
    #[error("Dense model mismatch: index built with {stored}, query side uses {active}")]
    EmbedderMismatch { stored: String, active: String },

    /// A document already owns a vector in this space.
    #[error("Document {id} already has a {space} vector")]
    VectorExists { id: DocumentId, space: VectorSpace },

    /// Search invoked before indexing completed.
    #[error("Index not built: documents must be indexed before searching")]
    IndexNotBuilt,

    /// Strict indexing aborted on a per-document failure.
    #[error("Indexing failed for {failed} of {total} documents: {first}")]
    PartialIndexing {
        failed: usize,
        total: usize,
        first: String,
    },

    /// Document not found.
    #[error("Document not found: {id}")]
    DocumentNotFound { id: DocumentId },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Storage backend could not be reached or opened.
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Embedding model error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Search exceeded its time budget.
    #[error("Search timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl HybridError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a store-unavailable error.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an unknown search mode error.
    pub fn unknown_mode(mode: impl Into<String>) -> Self {
        Self::UnknownMode { mode: mode.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller violated a precondition (as opposed to a backend fault).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotFitted
                | Self::VocabularyAlreadyFitted
                | Self::UnknownMode { .. }
                | Self::IndexNotBuilt
                | Self::VocabularyMismatch { .. }
                | Self::EmbedderMismatch { .. }
                | Self::InvalidArgument { .. }
        )
    }

    /// Get a stable error code for CLI and JSON output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFitted => "NOT_FITTED",
            Self::VocabularyAlreadyFitted => "VOCABULARY_ALREADY_FITTED",
            Self::UnknownMode { .. } => "UNKNOWN_MODE",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::VocabularyMismatch { .. } => "VOCABULARY_MISMATCH",
            Self::EmbedderMismatch { .. } => "EMBEDDER_MISMATCH",
            Self::VectorExists { .. } => "VECTOR_EXISTS",
            Self::IndexNotBuilt => "INDEX_NOT_BUILT",
            Self::PartialIndexing { .. } => "PARTIAL_INDEXING_FAILURE",
            Self::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HybridError::DimensionMismatch {
            space: VectorSpace::Sparse,
            expected: 1000,
            actual: 998,
        };
        let msg = err.to_string();
        assert!(msg.contains("sparse"));
        assert!(msg.contains("1000"));
        assert!(msg.contains("998"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(HybridError::NotFitted.error_code(), "NOT_FITTED");
        assert_eq!(
            HybridError::unknown_mode("fuzzy").error_code(),
            "UNKNOWN_MODE"
        );
        assert_eq!(
            HybridError::store_unavailable("down").error_code(),
            "STORE_UNAVAILABLE"
        );
        assert_eq!(
            HybridError::VocabularyMismatch {
                stored: "a".into(),
                active: "b".into()
            }
            .error_code(),
            "VOCABULARY_MISMATCH"
        );
    }

    #[test]
    fn test_precondition_classification() {
        assert!(HybridError::NotFitted.is_precondition());
        assert!(HybridError::IndexNotBuilt.is_precondition());
        assert!(HybridError::EmbedderMismatch {
            stored: "mock-hash-64".into(),
            active: "mock-hash-32".into(),
        }
        .is_precondition());
        assert!(!HybridError::database("locked").is_precondition());
    }
}
