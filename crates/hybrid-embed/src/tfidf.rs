//! TF-IDF vocabulary fitting and sparse projection.
//!
//! Tokens are lowercase runs of at least two word characters. Fitting keeps
//! the `max_features` terms with the highest corpus-wide count, orders the
//! columns alphabetically and weights each with the smoothed idf
//! `ln((1 + n) / (1 + df)) + 1`. Projection multiplies raw term counts by idf
//! and L2-normalizes.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use hybrid_core::{Result, SparseConfig, SparseVector, Vocabulary};

use crate::stop_words::is_stop_word;

/// Split text into lowercase word tokens of two or more characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn analyze(text: &str, stop_words: bool) -> Vec<String> {
    let mut tokens = tokenize(text);
    if stop_words {
        tokens.retain(|t| !is_stop_word(t));
    }
    tokens
}

#[derive(Default)]
struct TermStats {
    document_frequency: usize,
    total_count: usize,
}

/// Fit a vocabulary over a corpus.
///
/// An empty corpus, or one with no usable tokens, yields an empty vocabulary.
/// A `max_features` of zero keeps every term.
pub fn fit_vocabulary(texts: &[&str], config: &SparseConfig) -> Result<Vocabulary> {
    let mut stats: BTreeMap<String, TermStats> = BTreeMap::new();

    for text in texts {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in analyze(text, config.stop_words) {
            *counts.entry(token).or_default() += 1;
        }
        for (term, count) in counts {
            let entry = stats.entry(term).or_default();
            entry.document_frequency += 1;
            entry.total_count += count;
        }
    }

    // BTreeMap iteration is alphabetical; stable sort keeps that order among ties
    let mut ranked: Vec<(String, TermStats)> = stats.into_iter().collect();
    if config.max_features > 0 && ranked.len() > config.max_features {
        ranked.sort_by(|a, b| b.1.total_count.cmp(&a.1.total_count));
        ranked.truncate(config.max_features);
        ranked.sort_by(|a, b| a.0.cmp(&b.0));
    }

    let n = texts.len() as f64;
    let (terms, idf): (Vec<String>, Vec<f32>) = ranked
        .into_iter()
        .map(|(term, s)| {
            let idf = ((1.0 + n) / (1.0 + s.document_frequency as f64)).ln() + 1.0;
            (term, idf as f32)
        })
        .unzip();

    debug!(
        "Fit sparse vocabulary: documents={}, terms={}",
        texts.len(),
        terms.len()
    );

    Vocabulary::new(terms, idf, config.stop_words)
}

/// Project text onto a fitted vocabulary.
///
/// Text sharing no terms with the vocabulary maps to the zero vector.
pub fn embed_sparse(vocabulary: &Vocabulary, text: &str) -> SparseVector {
    let mut weights = vec![0.0f32; vocabulary.len()];
    for token in analyze(text, vocabulary.stop_words()) {
        if let Some(column) = vocabulary.column(&token) {
            weights[column] += 1.0;
        }
    }
    for (column, weight) in weights.iter_mut().enumerate() {
        if *weight != 0.0 {
            *weight *= vocabulary.idf(column);
        }
    }
    SparseVector::new(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_features: usize) -> SparseConfig {
        SparseConfig {
            max_features,
            stop_words: true,
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Q3 Revenue-growth: a 12% rise!"),
            vec!["q3", "revenue", "growth", "12", "rise"]
        );
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_stop_words_excluded() {
        let vocab = fit_vocabulary(&["the revenue of the company"], &config(100)).unwrap();
        assert_eq!(vocab.terms(), &["company".to_string(), "revenue".to_string()]);
    }

    #[test]
    fn test_smoothed_idf() {
        let vocab = fit_vocabulary(&["revenue growth", "revenue decline"], &config(100)).unwrap();
        let revenue = vocab.column("revenue").unwrap();
        let growth = vocab.column("growth").unwrap();

        // df = 2 of 3 smoothed documents
        assert!((vocab.idf(revenue) - 1.0).abs() < 1e-6);
        let expected = ((3.0f64 / 2.0).ln() + 1.0) as f32;
        assert!((vocab.idf(growth) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let vocab = fit_vocabulary(
            &["revenue revenue growth", "revenue margin growth", "digital"],
            &config(2),
        )
        .unwrap();
        assert_eq!(vocab.terms(), &["growth".to_string(), "revenue".to_string()]);
    }

    #[test]
    fn test_max_features_ties_prefer_alphabetical() {
        let vocab = fit_vocabulary(&["zeta alpha mid"], &config(2)).unwrap();
        assert_eq!(vocab.terms(), &["alpha".to_string(), "mid".to_string()]);
    }

    #[test]
    fn test_embed_sparse_is_unit_norm() {
        let vocab = fit_vocabulary(&["revenue growth", "digital program"], &config(100)).unwrap();
        let v = embed_sparse(&vocab, "revenue revenue growth");
        assert_eq!(v.dimension(), vocab.len());
        assert!((hybrid_core::l2_norm(v.as_slice()) - 1.0).abs() < 1e-6);

        let revenue = vocab.column("revenue").unwrap();
        let growth = vocab.column("growth").unwrap();
        assert!((v.as_slice()[revenue] / v.as_slice()[growth] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_vocabulary_is_zero() {
        let vocab = fit_vocabulary(&["revenue growth"], &config(100)).unwrap();
        let v = embed_sparse(&vocab, "blockchain synergy");
        assert!(v.is_zero());
        assert_eq!(v.dimension(), 2);
    }

    #[test]
    fn test_empty_corpus() {
        let vocab = fit_vocabulary(&[], &config(100)).unwrap();
        assert!(vocab.is_empty());
        assert_eq!(embed_sparse(&vocab, "anything").dimension(), 0);
    }
}
