//! Linear fusion of dense and sparse similarity scores.

use std::collections::HashMap;

use hybrid_core::DocumentId;

/// Fuse two score lists with `score = w * dense + (1 - w) * sparse`.
///
/// Only documents present in both lists are scored (inner join on id).
/// Output is sorted by fused score descending, ties by ascending id, and
/// truncated to `k`.
///
/// # Arguments
/// * `dense` - (id, dense cosine) pairs
/// * `sparse` - (id, sparse cosine) pairs
/// * `dense_weight` - `w`, expected within [0, 1]
/// * `k` - Maximum number of results to return
pub fn linear_fusion(
    dense: &[(DocumentId, f32)],
    sparse: &[(DocumentId, f32)],
    dense_weight: f32,
    k: usize,
) -> Vec<(DocumentId, f32)> {
    let sparse_scores: HashMap<DocumentId, f32> = sparse.iter().copied().collect();

    let mut fused: Vec<(DocumentId, f32)> = dense
        .iter()
        .filter_map(|(id, dense_score)| {
            sparse_scores.get(id).map(|sparse_score| {
                (
                    *id,
                    dense_weight * dense_score + (1.0 - dense_weight) * sparse_score,
                )
            })
        })
        .collect();

    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    fused.truncate(k);

    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_formula() {
        let dense = vec![(1, 0.9), (2, 0.2)];
        let sparse = vec![(1, 0.1), (2, 0.8)];

        let w: f32 = 0.3;
        let fused = linear_fusion(&dense, &sparse, w, 10);

        let expected_1 = w * 0.9 + (1.0 - w) * 0.1;
        let expected_2 = w * 0.2 + (1.0 - w) * 0.8;
        assert_eq!(fused, vec![(2, expected_2), (1, expected_1)]);
    }

    #[test]
    fn test_inner_join_drops_one_sided_documents() {
        let dense = vec![(1, 0.9), (2, 0.8), (3, 0.7)];
        let sparse = vec![(2, 0.5), (3, 0.4), (4, 0.99)];

        let fused = linear_fusion(&dense, &sparse, 0.5, 10);

        let ids: Vec<_> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_weight_one_is_dense_order() {
        let dense = vec![(1, 0.2), (2, 0.9), (3, 0.5)];
        let sparse = vec![(1, 0.9), (2, 0.1), (3, 0.3)];

        let fused = linear_fusion(&dense, &sparse, 1.0, 10);
        let ids: Vec<_> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let fused = linear_fusion(&dense, &sparse, 0.0, 10);
        let ids: Vec<_> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let dense = vec![(7, 0.5), (3, 0.5), (5, 0.5)];
        let sparse = vec![(3, 0.5), (5, 0.5), (7, 0.5)];

        let fused = linear_fusion(&dense, &sparse, 0.5, 10);
        let ids: Vec<_> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }

    #[test]
    fn test_truncation() {
        let dense: Vec<_> = (1..=5).map(|i| (i, i as f32 / 10.0)).collect();
        let sparse = dense.clone();

        let fused = linear_fusion(&dense, &sparse, 0.5, 3);

        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].0, 5);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(linear_fusion(&[], &[(1, 1.0)], 0.5, 10).is_empty());
        assert!(linear_fusion(&[(1, 1.0)], &[], 0.5, 10).is_empty());
    }
}
