//! Deterministic dense embedder for tests and model-free runs.

use async_trait::async_trait;

use hybrid_core::{DenseEmbedder, DenseVector, Result};

use crate::tfidf::tokenize;

/// Feature-hashing embedder.
///
/// Each lowercase word token is hashed with blake3 into one of `dimension`
/// buckets, so texts sharing words point in similar directions. Not semantic,
/// but deterministic and cheap, which is what tests need.
pub struct MockEmbedder {
    dimension: usize,
    max_tokens: usize,
}

impl MockEmbedder {
    /// Create a new mock embedder with default settings.
    pub fn new() -> Self {
        Self {
            dimension: 384,
            max_tokens: 256,
        }
    }

    /// Create a mock embedder with custom settings.
    pub fn with_config(dimension: usize, max_tokens: usize) -> Self {
        Self {
            dimension,
            max_tokens,
        }
    }

    fn embed_one(&self, text: &str) -> DenseVector {
        let mut embedding = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return DenseVector::new(embedding);
        }

        for token in tokenize(text).into_iter().take(self.max_tokens) {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) % self.dimension as u64;
            embedding[bucket as usize] += 1.0;
        }

        // Empty text stays a zero vector
        DenseVector::new(embedding)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DenseEmbedder for MockEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<DenseVector>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<DenseVector> {
        Ok(self.embed_one(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn model_id(&self) -> String {
        format!("mock-hash-{}", self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_core::{cosine_similarity, l2_norm};

    #[tokio::test]
    async fn test_mock_embedder() {
        let embedder = MockEmbedder::new();

        assert_eq!(embedder.dimension(), 384);

        let texts = ["Revenue grew strongly", "Digital transformation program"];
        let embeddings = embedder.embed_documents(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].dimension(), 384);

        for e in &embeddings {
            assert!((l2_norm(e.as_slice()) - 1.0).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_deterministic_embeddings() {
        let embedder = MockEmbedder::new();

        let e1 = embedder.embed_query("consistent input").await.unwrap();
        let e2 = embedder.embed_query("consistent input").await.unwrap();
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn test_shared_words_are_closer() {
        let embedder = MockEmbedder::new();

        let query = embedder.embed_query("revenue growth").await.unwrap();
        let near = embedder
            .embed_query("strong revenue growth this year")
            .await
            .unwrap();
        let far = embedder
            .embed_query("digital transformation program")
            .await
            .unwrap();

        assert!(
            cosine_similarity(query.as_slice(), near.as_slice())
                > cosine_similarity(query.as_slice(), far.as_slice())
        );
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = MockEmbedder::with_config(16, 64);
        let e = embedder.embed_query("").await.unwrap();
        assert_eq!(e.dimension(), 16);
        assert!(e.as_slice().iter().all(|x| *x == 0.0));
    }
}
