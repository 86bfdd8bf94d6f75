//! hybrid-query - Search and ranking engine
//!
//! This crate ranks stored documents against a query in one of three modes:
//! dense (semantic), sparse (TF-IDF) or hybrid, where the two cosine scores
//! are combined linearly with a tunable dense weight.
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_query::{FusionRanker, SearchRequest};
//! use hybrid_core::SearchMode;
//! use std::sync::Arc;
//!
//! let ranker = FusionRanker::new(Arc::new(store), Arc::new(provider));
//! let request = SearchRequest::new(SearchMode::Hybrid, 10).with_dense_weight(0.7);
//! let results = ranker.search("revenue growth", request).await?;
//! ```

mod engine;
mod fusion;

pub use engine::{FusionRanker, SearchRequest};
pub use fusion::linear_fusion;

// Re-export for convenience
pub use hybrid_core::{SearchMode, SearchResult, SearchResults};
