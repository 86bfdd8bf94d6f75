//! hybrid-core - Core types and traits for hybrid retrieval
//!
//! This crate provides the foundational types, traits, vector math and error
//! handling shared by the embedding, storage, ranking and indexing crates.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod vector;

pub use config::*;
pub use error::{HybridError, Result};
pub use traits::*;
pub use types::*;
pub use vector::{cosine_similarity, dot, l2_norm, l2_normalize};
