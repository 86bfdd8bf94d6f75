//! hybrid-index - Corpus indexing
//!
//! Builds a hybrid index in one pass: the sparse vocabulary is fit over the
//! whole corpus, then every document is embedded into both spaces and
//! stored, with a bounded number of embedding batches in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_index::{load_corpus, CorpusIndexer};
//!
//! let records = load_corpus("corpus.jsonl")?;
//! let indexer = CorpusIndexer::new(store, provider, config.indexing.clone());
//! let report = indexer.index(records).await?;
//! println!("indexed {} documents", report.indexed);
//! ```

mod corpus;
mod indexer;

pub use corpus::{load_corpus, parse_corpus};
pub use indexer::CorpusIndexer;
