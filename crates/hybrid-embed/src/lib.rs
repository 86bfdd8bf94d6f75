//! hybrid-embed - Dense and sparse text embeddings
//!
//! This crate turns text into the two vector representations used for
//! hybrid retrieval.
//!
//! # Features
//!
//! - ONNX Runtime sentence encoder with mean pooling and L2 normalization
//! - Deterministic feature-hashing embedder for tests and offline runs
//! - TF-IDF vocabulary fitting and sparse projection
//! - [`EmbeddingProvider`] tying both together around a write-once vocabulary

mod mock;
mod onnx;
mod provider;
mod stop_words;
mod tfidf;

pub use mock::MockEmbedder;
pub use onnx::OnnxEmbedder;
pub use provider::EmbeddingProvider;
pub use tfidf::{embed_sparse, fit_vocabulary, tokenize};

// Re-export the embedder trait for convenience
pub use hybrid_core::DenseEmbedder;
